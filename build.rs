use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::{env, fs};

static CONFIGS: &[(&str, usize)] = &[
    // BEGIN AUTOGENERATED CONFIG FEATURES
    ("ATTRIBUTE_TABLE_SIZE", 8),
    ("ATTRIBUTE_VALUE_MAX", 512),
    ("EVENT_QUEUE_DEPTH", 1),
    ("EVENT_PACKET_MAX", 255),
    // END AUTOGENERATED CONFIG FEATURES
];

const PREFIX: &str = "TROUBLE_BRIDGE_";

fn main() {
    let mut configs = HashMap::new();
    for (name, default) in CONFIGS {
        configs.insert(name.to_string(), *default);
    }

    for (var, value) in env::vars() {
        if let Some(name) = var.strip_prefix(PREFIX) {
            let Some(cfg) = configs.get_mut(name) else {
                panic!("Unknown env var {}", var);
            };
            *cfg = match value.parse::<usize>() {
                Ok(v) => v,
                Err(_) => panic!("Invalid value for env var {}: {}", var, value),
            };
        }
    }

    if !configs["ATTRIBUTE_TABLE_SIZE"].is_power_of_two() {
        panic!("{}ATTRIBUTE_TABLE_SIZE must be a power of two", PREFIX);
    }
    if configs["EVENT_QUEUE_DEPTH"] == 0 {
        panic!("{}EVENT_QUEUE_DEPTH must be at least 1", PREFIX);
    }

    let mut data = String::new();
    for (name, _) in CONFIGS {
        let value = configs[*name];
        writeln!(&mut data, "pub const {}: usize = {};", name, value).unwrap();
    }

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    let out_file = out_dir.join("config.rs").to_string_lossy().to_string();
    fs::write(out_file, data).unwrap();

    for (name, _) in CONFIGS {
        println!("cargo:rerun-if-env-changed={}{}", PREFIX, name);
    }
    println!("cargo:rerun-if-changed=build.rs");
}
