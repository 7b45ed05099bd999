//! The interface to the underlying host stack.
use bt_hci::param::ConnHandle;
use embassy_time::Duration;

use crate::advertise::AdvertisementParameters;

/// Radio power modes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerMode {
    Off = 0,
    On = 1,
    Sleep = 2,
}

impl PowerMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::On),
            2 => Some(Self::Sleep),
            _ => None,
        }
    }
}

/// Commands the bridge issues to the host stack.
///
/// The stack delivers its callbacks by calling into the bridge
/// ([`BleBridge::on_packet`](crate::BleBridge::on_packet),
/// [`BleBridge::att_read`](crate::BleBridge::att_read),
/// [`BleBridge::att_write`](crate::BleBridge::att_write),
/// [`BleBridge::on_timer`](crate::BleBridge::on_timer)). Implementations must not call back
/// into the bridge synchronously from within one of these commands.
pub trait HostController<'d> {
    type Error: core::fmt::Debug;

    /// Initialize the L2CAP layer.
    fn init_l2cap(&mut self) -> Result<(), Self::Error>;

    /// Initialize the security manager.
    fn init_security_manager(&mut self) -> Result<(), Self::Error>;

    /// Register the GATT server with its attribute database.
    ///
    /// The profile stays borrowed for the whole session, so the stack may keep a view into it.
    fn init_att_server(&mut self, profile: Option<&'d [u8]>) -> Result<(), Self::Error>;

    /// Route HCI and ATT events to the bridge's packet handler.
    fn register_packet_handler(&mut self) -> Result<(), Self::Error>;

    /// Arm the one-shot heartbeat timer.
    fn arm_timer(&mut self, period: Duration) -> Result<(), Self::Error>;

    fn power_control(&mut self, mode: PowerMode) -> Result<(), Self::Error>;

    /// The controller's public device address.
    fn local_address(&mut self) -> [u8; 6];

    fn set_advertising_params(&mut self, params: &AdvertisementParameters) -> Result<(), Self::Error>;

    fn set_advertising_data(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    fn set_advertising_enable(&mut self, enable: bool) -> Result<(), Self::Error>;

    fn set_scan_enable(&mut self, enable: bool) -> Result<(), Self::Error>;

    /// Send a GATT notification.
    fn notify(&mut self, conn: ConnHandle, handle: u16, value: &[u8]) -> Result<(), Self::Error>;

    /// Ask the stack to emit a "can send now" event for the connection.
    fn request_can_send_now(&mut self, conn: ConnHandle) -> Result<(), Self::Error>;

    /// Activity indicator (typically an LED) toggled while scanning.
    fn set_indicator(&mut self, on: bool) {
        let _ = on;
    }
}
