//! Compile-time configuration.
//!
//! `trouble-bridge` sizes all of its tables and queues at compile time, so nothing is
//! allocated once the bridge is running.
//!
//! The values are set via environment variables at build time: set the variable named
//! `TROUBLE_BRIDGE_<value>`. For example `TROUBLE_BRIDGE_EVENT_QUEUE_DEPTH=2 cargo build`.
//! You can also set them in the `[env]` section of `.cargo/config.toml`.
//!
//! Runtime settings (heartbeat period, advertising parameters, scan marker and write policy)
//! live in [`BridgeConfig`](crate::BridgeConfig).

mod raw {
    #![allow(unused)]
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

/// Attribute table size
///
/// Number of attribute handles each direction of the data bridge can hold.
/// Must be a power of two.
///
/// Default: 8.
pub const ATTRIBUTE_TABLE_SIZE: usize = raw::ATTRIBUTE_TABLE_SIZE;

/// Maximum attribute value length
///
/// Values longer than one ATT MTU are served with blob reads.
///
/// Default: 512.
pub const ATTRIBUTE_VALUE_MAX: usize = raw::ATTRIBUTE_VALUE_MAX;

/// Event queue depth
///
/// Raw packets forwarded to the script layer. When the queue is full, new packets
/// are dropped.
///
/// Default: 1.
pub const EVENT_QUEUE_DEPTH: usize = raw::EVENT_QUEUE_DEPTH;

/// Largest event packet that can be forwarded through the event queue.
///
/// Default: 255.
pub const EVENT_PACKET_MAX: usize = raw::EVENT_PACKET_MAX;
