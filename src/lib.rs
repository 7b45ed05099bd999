//! Bridge between an interrupt-driven BLE host stack and a cooperative, single-threaded
//! script runtime.
//!
//! The host stack calls into [`BleBridge`] from its event loop (packet events, ATT reads and
//! writes, timer expiry). The script layer polls the same bridge for state and issues
//! commands through it. Shared state lives behind `embassy-sync` blocking mutexes, and all
//! capacities are fixed at compile time (see [`config`]).
#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod advertise;
pub mod att;
pub mod attribute;
mod bridge;
pub mod config;
pub mod controller;
pub mod event;
pub mod heartbeat;
pub mod irq;
pub mod role;
pub mod scan;

pub use bridge::{BleBridge, BridgeConfig, WritePolicy};
pub use controller::{HostController, PowerMode};
pub use event::{HciState, LatchedEvent};
pub use irq::{IrqGuard, IrqMutex};
pub use role::{Role, RoleCapabilities};

pub use bt_hci::param::ConnHandle;

/// Errors raised by the bridge itself.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Unknown role name.
    InvalidRole,
    /// The profile is not an attribute database.
    InvalidProfileType,
    /// A host stack setup step failed; the bridge stays uninitialized.
    InitFailure,
    AlreadyInitialized,
    NotInitialized,
    /// The active role cannot perform this operation.
    NotSupported,
    /// No value is stored for the attribute handle.
    HandleNotFound,
    /// The event queue is at capacity. Only reported through the log; the entry is dropped.
    QueueFull,
    InsufficientSpace,
    InvalidValue,
}

/// Errors returned by bridge operations that reach the host stack.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq)]
pub enum BridgeError<E> {
    /// Error from the host stack.
    Controller(E),
    /// Error from the bridge.
    Bridge(Error),
}

impl<E> From<Error> for BridgeError<E> {
    fn from(value: Error) -> Self {
        Self::Bridge(value)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidRole => f.write_str("invalid role"),
            Self::InvalidProfileType => f.write_str("profile must be an attribute database or absent"),
            Self::InitFailure => f.write_str("BLE init failed"),
            Self::AlreadyInitialized => f.write_str("already initialized"),
            Self::NotInitialized => f.write_str("not initialized"),
            Self::NotSupported => f.write_str("not supported by the active role"),
            Self::HandleNotFound => f.write_str("attribute handle not found"),
            Self::QueueFull => f.write_str("event queue full"),
            Self::InsufficientSpace => f.write_str("insufficient space"),
            Self::InvalidValue => f.write_str("invalid value"),
        }
    }
}
