//! BLE roles and the capabilities each one brings.
use crate::Error;

/// The role the bridge runs the stack in.
///
/// Chosen once at initialization and fixed for the rest of the session.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Central,
    Peripheral,
    Observer,
    Broadcaster,
}

/// What a role is allowed to do.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCapabilities {
    /// May enable advertising.
    pub advertise: bool,
    /// Takes part in connections, so advertisements are connectable.
    pub connectable: bool,
    /// May scan, and receives scan filtering plus the event queue.
    pub scan: bool,
    /// Registers the GATT server with the attribute profile.
    pub gatt_server: bool,
}

impl Role {
    /// Parse a role from its symbolic name.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            "central" => Ok(Self::Central),
            "peripheral" => Ok(Self::Peripheral),
            "observer" => Ok(Self::Observer),
            "broadcaster" => Ok(Self::Broadcaster),
            _ => Err(Error::InvalidRole),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Central => "central",
            Self::Peripheral => "peripheral",
            Self::Observer => "observer",
            Self::Broadcaster => "broadcaster",
        }
    }

    pub const fn capabilities(&self) -> RoleCapabilities {
        match self {
            Self::Central => RoleCapabilities {
                advertise: false,
                connectable: true,
                scan: true,
                gatt_server: false,
            },
            Self::Peripheral => RoleCapabilities {
                advertise: true,
                connectable: true,
                scan: false,
                gatt_server: true,
            },
            Self::Observer => RoleCapabilities {
                advertise: false,
                connectable: false,
                scan: true,
                gatt_server: false,
            },
            Self::Broadcaster => RoleCapabilities {
                advertise: true,
                connectable: false,
                scan: false,
                gatt_server: false,
            },
        }
    }
}

impl core::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_name(s)
    }
}
