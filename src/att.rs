//! ATT status codes returned to the host stack from the write callback.
use core::fmt::Display;

/// Status returned to the host stack when a write is accepted.
pub const ATT_WRITE_ACCEPTED: u16 = 0x0000;

/// ATT transaction modes, as passed to the write callback.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Plain write request or command.
    None,
    /// Part of a prepared (queued) write.
    Active,
    /// Commit all prepared writes.
    Execute,
    /// Discard all prepared writes.
    Cancel,
}

impl TransactionMode {
    /// Decode the raw transaction mode, returning `None` for unknown values.
    pub fn from_raw(mode: u16) -> Option<Self> {
        match mode {
            0 => Some(Self::None),
            1 => Some(Self::Active),
            2 => Some(Self::Execute),
            3 => Some(Self::Cancel),
            _ => None,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct AttErrorCode {
    value: u8,
}

impl AttErrorCode {
    /// Attempted to use a handle that isn't valid on this server
    pub const INVALID_HANDLE: Self = Self { value: 0x01 };
    /// ATT Server does not support the request received from the client
    pub const REQUEST_NOT_SUPPORTED: Self = Self { value: 0x06 };
    /// Offset specified was past the end of the attribute
    pub const INVALID_OFFSET: Self = Self { value: 0x07 };
    /// Too many prepare writes have been queued
    pub const PREPARE_QUEUE_FULL: Self = Self { value: 0x09 };
    /// The attribute value length is invalid for the operation
    pub const INVALID_ATTRIBUTE_VALUE_LENGTH: Self = Self { value: 0x0d };
    /// Insufficient Resources to complete the request
    pub const INSUFFICIENT_RESOURCES: Self = Self { value: 0x11 };

    /// The raw error code.
    pub const fn value(&self) -> u8 {
        self.value
    }

    /// The status as the host stack expects it from a write callback.
    pub const fn to_status(&self) -> u16 {
        self.value as u16
    }
}

impl Display for AttErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            &Self::INVALID_HANDLE => {
                f.write_str("invalid handle: Attempted to use a handle that isn't valid on this server")
            }
            &Self::REQUEST_NOT_SUPPORTED => {
                f.write_str("request not supported: ATT server does not support the request received from the client")
            }
            &Self::INVALID_OFFSET => f.write_str("Offset specified was past the end of the attribute"),
            &Self::PREPARE_QUEUE_FULL => f.write_str("prepare queue full: too many prepare writes have been queued"),
            &Self::INVALID_ATTRIBUTE_VALUE_LENGTH => f.write_str("invalid attribute value length: the attribute value length is invalid for the operation"),
            &Self::INSUFFICIENT_RESOURCES => f.write_str("insufficient resources: insufficient resources to complete the request"),
            other => write!(f, "unknown error code {}", other.value),
        }
    }
}
