//! BleBridge
//!
//! The bridge holds the session state shared between the host stack's event context and the
//! script context, and is the entry point for both.
use core::cell::{Cell, RefCell};

use bt_hci::param::ConnHandle;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_time::Duration;

use crate::advertise::{validate_payload, AdvertisementParameters};
use crate::att::{AttErrorCode, TransactionMode, ATT_WRITE_ACCEPTED};
use crate::attribute::{AttributeBridge, AttributeValue};
use crate::config::{EVENT_PACKET_MAX, EVENT_QUEUE_DEPTH};
use crate::controller::{HostController, PowerMode};
use crate::event::{is_noise, EventLatch, EventPacket, HciState, LatchedEvent, HCI_EVENT_PACKET};
use crate::heartbeat::{Heartbeat, DEFAULT_HEARTBEAT_PERIOD};
use crate::irq::{IrqGuard, IrqMutex};
use crate::role::Role;
use crate::scan::{classify, QueuedPacket, ScanAction, ScanConfig};
use crate::{BridgeError, Error};

/// Version byte at the start of an attribute database.
const ATT_DB_VERSION: u8 = 0x01;

/// Largest valid HCI connection handle.
const CONN_HANDLE_MAX: u16 = 0x0eff;

/// Notification bit of a client characteristic configuration value.
const CCCD_NOTIFY: u8 = 0x01;

/// What the write callback reports when a write cannot be stored.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Return the ATT error code to the host stack.
    #[default]
    Reject,
    /// Report the write as accepted anyway. The peer cannot tell it was dropped.
    AcceptSilently,
}

/// Runtime configuration of the bridge.
#[derive(Debug, Clone, Copy)]
pub struct BridgeConfig<'d> {
    pub heartbeat_period: Duration,
    pub advertisement: AdvertisementParameters,
    pub scan: ScanConfig<'d>,
    pub write_policy: WritePolicy,
    /// Client characteristic configuration handles. A peer write to one of these turns
    /// notifications on or off.
    pub cccd_handles: &'d [u16],
}

impl Default for BridgeConfig<'_> {
    fn default() -> Self {
        Self {
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
            advertisement: AdvertisementParameters::default(),
            scan: ScanConfig::default(),
            write_policy: WritePolicy::default(),
            cccd_handles: &[],
        }
    }
}

#[derive(Clone, Copy)]
struct Session<'d> {
    role: Role,
    profile: Option<&'d [u8]>,
}

#[derive(Default)]
struct LinkState {
    latch: EventLatch,
    hci_state: HciState,
    connection: Option<ConnHandle>,
    notifications: bool,
    advertising: bool,
    scanning: bool,
    indicator: bool,
    scan_matched: bool,
    dropped: u32,
}

/// A BLE bridge.
///
/// Methods fall into two groups. The host stack calls [`on_packet`](Self::on_packet),
/// [`att_read`](Self::att_read), [`att_write`](Self::att_write) and
/// [`on_timer`](Self::on_timer) from its event context; these never block and never fail.
/// Everything else is for the script layer.
pub struct BleBridge<'d, M: RawMutex, C> {
    controller: Mutex<M, RefCell<C>>,
    config: BridgeConfig<'d>,
    session: Mutex<M, Cell<Option<Session<'d>>>>,
    link: Mutex<M, RefCell<LinkState>>,
    attributes: Mutex<M, RefCell<AttributeBridge>>,
    queue: Channel<M, QueuedPacket, EVENT_QUEUE_DEPTH>,
    heartbeat: Heartbeat<M>,
    irq: IrqMutex,
}

fn conn_handle(raw: u16) -> Option<ConnHandle> {
    if raw <= CONN_HANDLE_MAX {
        Some(ConnHandle::new(raw))
    } else {
        None
    }
}

fn validate_profile(profile: &[u8]) -> Result<(), Error> {
    match profile.first() {
        Some(&ATT_DB_VERSION) => Ok(()),
        _ => Err(Error::InvalidProfileType),
    }
}

impl<'d, M, C> BleBridge<'d, M, C>
where
    M: RawMutex,
    C: HostController<'d>,
{
    /// Create a new, uninitialized bridge around a host stack.
    pub fn new(controller: C, config: BridgeConfig<'d>) -> Self {
        Self {
            controller: Mutex::new(RefCell::new(controller)),
            heartbeat: Heartbeat::new(config.heartbeat_period),
            config,
            session: Mutex::new(Cell::new(None)),
            link: Mutex::new(RefCell::new(LinkState::default())),
            attributes: Mutex::new(RefCell::new(AttributeBridge::new())),
            queue: Channel::new(),
            irq: IrqMutex::new(),
        }
    }

    fn with_controller<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        self.controller.lock(|c| f(&mut *c.borrow_mut()))
    }

    fn with_link<R>(&self, f: impl FnOnce(&mut LinkState) -> R) -> R {
        self.link.lock(|l| f(&mut *l.borrow_mut()))
    }

    fn session(&self) -> Result<Session<'d>, Error> {
        self.session.lock(|s| s.get()).ok_or(Error::NotInitialized)
    }

    /// Initialize the host stack for `role_name`.
    ///
    /// `profile` is the attribute database for the GATT server. It stays borrowed for as
    /// long as the bridge lives. If any setup step fails, the bridge stays uninitialized.
    pub fn initialize(&self, role_name: &str, profile: Option<&'d [u8]>) -> Result<Role, BridgeError<C::Error>> {
        let role = Role::from_name(role_name)?;
        if self.session().is_ok() {
            return Err(Error::AlreadyInitialized.into());
        }
        if let Some(profile) = profile {
            validate_profile(profile)?;
        }

        let caps = role.capabilities();
        let period = self.heartbeat.period();
        let result = self.with_controller(|c| -> Result<(), (&'static str, C::Error)> {
            c.init_l2cap().map_err(|e| ("l2cap", e))?;
            c.init_security_manager().map_err(|e| ("security manager", e))?;
            if caps.gatt_server {
                c.init_att_server(profile).map_err(|e| ("att server", e))?;
            }
            c.register_packet_handler().map_err(|e| ("packet handler", e))?;
            c.arm_timer(period).map_err(|e| ("heartbeat timer", e))?;
            Ok(())
        });
        if let Err((step, _)) = result {
            warn!("[bridge] BLE init failed: {} setup", step);
            return Err(Error::InitFailure.into());
        }

        self.session.lock(|s| s.set(Some(Session { role, profile })));
        info!("[bridge] initialized as {}", role.name());
        Ok(role)
    }

    /// The role chosen at initialization.
    pub fn role(&self) -> Option<Role> {
        self.session().ok().map(|s| s.role)
    }

    /// The attribute database retained for the session.
    pub fn profile(&self) -> Option<&'d [u8]> {
        self.session().ok().and_then(|s| s.profile)
    }

    /// Change the heartbeat period. Applies from the next re-arm.
    pub fn set_heartbeat_period(&self, period: Duration) {
        self.heartbeat.set_period(period);
    }

    pub fn power_control(&self, mode: PowerMode) -> Result<(), BridgeError<C::Error>> {
        self.session()?;
        self.with_controller(|c| c.power_control(mode))
            .map_err(BridgeError::Controller)
    }

    pub fn local_address(&self) -> [u8; 6] {
        self.with_controller(|c| c.local_address())
    }

    /// Start advertising `payload`, or stop advertising when `None`.
    ///
    /// Does nothing until the host stack reports the working state.
    pub fn advertise(&self, payload: Option<&[u8]>) -> Result<(), BridgeError<C::Error>> {
        let caps = self.session()?.role.capabilities();
        if !caps.advertise {
            return Err(Error::NotSupported.into());
        }
        let Some(payload) = payload else {
            return self.stop_advertise();
        };
        validate_payload(payload)?;

        if !self.with_link(|l| l.hci_state.is_working()) {
            debug!("[bridge] stack not working, advertise skipped");
            return Ok(());
        }

        let params = if caps.connectable {
            self.config.advertisement
        } else {
            self.config.advertisement.non_connectable()
        };
        self.with_controller(|c| -> Result<(), C::Error> {
            c.set_advertising_params(&params)?;
            c.set_advertising_data(payload)?;
            c.set_advertising_enable(true)
        })
        .map_err(BridgeError::Controller)?;
        self.with_link(|l| l.advertising = true);
        Ok(())
    }

    pub fn stop_advertise(&self) -> Result<(), BridgeError<C::Error>> {
        if !self.session()?.role.capabilities().advertise {
            return Err(Error::NotSupported.into());
        }
        self.with_controller(|c| c.set_advertising_enable(false))
            .map_err(BridgeError::Controller)?;
        self.with_link(|l| l.advertising = false);
        Ok(())
    }

    pub fn is_advertising(&self) -> bool {
        self.with_link(|l| l.advertising)
    }

    pub fn start_scan(&self) -> Result<(), BridgeError<C::Error>> {
        if !self.session()?.role.capabilities().scan {
            return Err(Error::NotSupported.into());
        }
        if self.with_link(|l| l.scanning) {
            return Ok(());
        }
        self.with_controller(|c| c.set_scan_enable(true))
            .map_err(BridgeError::Controller)?;
        self.with_link(|l| l.scanning = true);
        Ok(())
    }

    pub fn stop_scan(&self) -> Result<(), BridgeError<C::Error>> {
        if !self.session()?.role.capabilities().scan {
            return Err(Error::NotSupported.into());
        }
        self.with_controller(|c| c.set_scan_enable(false))
            .map_err(BridgeError::Controller)?;
        self.with_link(|l| l.scanning = false);
        Ok(())
    }

    pub fn is_scanning(&self) -> bool {
        self.with_link(|l| l.scanning)
    }

    /// Whether a scan response carried the marker since the last call. Clears the flag.
    pub fn take_scan_match(&self) -> bool {
        self.with_link(|l| core::mem::replace(&mut l.scan_matched, false))
    }

    /// Current state of the activity indicator.
    pub fn indicator(&self) -> bool {
        self.with_link(|l| l.indicator)
    }

    /// Allow notifications on the current link without waiting for the peer to subscribe.
    pub fn enable_le_notification(&self) -> Result<(), Error> {
        if !self.session()?.role.capabilities().gatt_server {
            return Err(Error::NotSupported);
        }
        self.with_link(|l| l.notifications = true);
        Ok(())
    }

    pub fn notifications_enabled(&self) -> bool {
        self.with_link(|l| l.notifications)
    }

    /// Notify the connected peer of the value published for `handle`.
    ///
    /// Dropped silently when nothing is published for the handle, no peer is connected, or
    /// notifications are not enabled.
    pub fn notify(&self, handle: u16) -> Result<(), BridgeError<C::Error>> {
        if !self.session()?.role.capabilities().gatt_server {
            return Err(Error::NotSupported.into());
        }
        let (conn, enabled) = self.with_link(|l| (l.connection, l.notifications));
        let Some(conn) = conn else {
            trace!("[bridge] notify {} without connection", handle);
            return Ok(());
        };
        if !enabled {
            trace!("[bridge] notify {} with notifications disabled", handle);
            return Ok(());
        }
        self.attributes.lock(|a| {
            let a = a.borrow();
            match a.read_table().get(handle) {
                Some(value) if !value.is_empty() => self
                    .with_controller(|c| c.notify(conn, handle, value))
                    .map_err(BridgeError::Controller),
                _ => {
                    trace!("[bridge] notify {} without value", handle);
                    Ok(())
                }
            }
        })
    }

    /// Ask the host stack for a "can send now" event on the current connection.
    pub fn request_can_send_now(&self) -> Result<(), BridgeError<C::Error>> {
        self.session()?;
        match self.connection() {
            Some(conn) => self
                .with_controller(|c| c.request_can_send_now(conn))
                .map_err(BridgeError::Controller),
            None => Ok(()),
        }
    }

    /// The connection notifications are sent to.
    pub fn connection(&self) -> Option<ConnHandle> {
        self.with_link(|l| l.connection)
    }

    /// Publish a value for the peer to read.
    pub fn set_value(&self, handle: u16, value: &[u8]) -> Result<(), Error> {
        self.attributes.lock(|a| a.borrow_mut().read_table_mut().set(handle, value))
    }

    /// Withdraw a published value. Returns whether one was present.
    pub fn clear_value(&self, handle: u16) -> bool {
        self.attributes
            .lock(|a| a.borrow_mut().read_table_mut().remove(handle).is_some())
    }

    /// Inspect the last value the peer wrote to `handle`.
    pub fn written_value<R>(&self, handle: u16, f: impl FnOnce(&[u8]) -> R) -> Result<R, Error> {
        self.attributes.lock(|a| {
            let a = a.borrow();
            a.written_table().get(handle).map(f).ok_or(Error::HandleNotFound)
        })
    }

    /// Remove and return the last value the peer wrote to `handle`.
    pub fn take_written(&self, handle: u16) -> Option<AttributeValue> {
        self.attributes.lock(|a| a.borrow_mut().written_table_mut().remove(handle))
    }

    /// The last interesting event, or `None` if consumed.
    pub fn packet_event(&self) -> Option<LatchedEvent> {
        self.with_link(|l| l.latch.poll())
    }

    /// Mark the last event as consumed.
    pub fn consume_packet_event(&self) {
        self.with_link(|l| l.latch.consume());
    }

    pub fn link_state(&self) -> HciState {
        self.with_link(|l| l.hci_state)
    }

    /// Read and clear the heartbeat flag.
    pub fn heartbeat(&self) -> bool {
        self.heartbeat.take()
    }

    /// Take the next queued packet, if any.
    pub fn try_next_packet(&self) -> Option<QueuedPacket> {
        self.queue.try_receive().ok()
    }

    /// Wait for the next queued packet.
    pub async fn next_packet(&self) -> QueuedPacket {
        self.queue.receive().await
    }

    /// Packets dropped because the event queue was full.
    pub fn dropped_packets(&self) -> u32 {
        self.with_link(|l| l.dropped)
    }

    /// Disable interrupts. Always succeeds; pair with [`unlock`](Self::unlock).
    pub fn try_lock(&self) -> bool {
        self.irq.try_lock()
    }

    pub fn unlock(&self) {
        self.irq.unlock()
    }

    /// Disable interrupts until the guard is dropped.
    pub fn lock(&self) -> IrqGuard<'_> {
        self.irq.lock()
    }

    /// Packet handler. Called by the host stack for every packet it receives.
    pub fn on_packet(&self, packet_type: u8, packet: &[u8]) {
        if packet_type != HCI_EVENT_PACKET {
            return;
        }
        let Some(event) = EventPacket::new(packet) else {
            return;
        };
        let event_type = event.event_type();
        if is_noise(event_type) {
            return;
        }

        self.with_link(|l| {
            l.latch.latch(event_type);
            if let Some(state) = event.state() {
                l.hci_state = state;
            }
            if let Some(handle) = event.disconnected_handle() {
                if l.connection.map(|c| c.raw()) == Some(handle) {
                    debug!("[bridge] connection {} closed", handle);
                    l.connection = None;
                    l.notifications = false;
                }
            }
        });

        match self.session() {
            Ok(session) if session.role.capabilities().scan => self.filter_scan(&event),
            _ => {}
        }
    }

    fn filter_scan(&self, event: &EventPacket<'_>) {
        match classify(&self.config.scan, event) {
            ScanAction::StartScan => {
                if self.start_scan().is_err() {
                    warn!("[bridge] failed to start scan");
                }
            }
            ScanAction::Matched => {
                debug!("[bridge] scan marker found");
                self.with_link(|l| l.scan_matched = true);
            }
            ScanAction::ToggleIndicator => {
                let on = self.with_link(|l| {
                    l.indicator = !l.indicator;
                    l.indicator
                });
                self.with_controller(|c| c.set_indicator(on));
            }
            ScanAction::Forward => {
                self.enqueue(event.bytes());
            }
        }
    }

    fn enqueue(&self, packet: &[u8]) {
        let len = packet.len().min(EVENT_PACKET_MAX);
        if len < packet.len() {
            warn!("[bridge] truncating {} byte packet", packet.len());
        }
        let Ok(item) = QueuedPacket::from_slice(&packet[..len]) else {
            return;
        };
        if let Err(TrySendError::Full(_)) = self.queue.try_send(item) {
            let dropped = self.with_link(|l| {
                l.dropped = l.dropped.wrapping_add(1);
                l.dropped
            });
            warn!(
                "[bridge] {}, dropping event {:02x} ({} dropped)",
                Error::QueueFull,
                packet[0],
                dropped
            );
        }
    }

    /// ATT read callback.
    ///
    /// Serves a blob read of the published value at `offset`. Without a buffer, returns the
    /// value's full length. Unknown handles read as empty.
    pub fn att_read(&self, conn: u16, handle: u16, offset: u16, buffer: Option<&mut [u8]>) -> u16 {
        let _ = conn;
        let len = self
            .attributes
            .lock(|a| a.borrow().read_blob(handle, offset as usize, buffer));
        len.min(u16::MAX as usize) as u16
    }

    /// ATT write callback.
    ///
    /// A stored write binds `conn` as the notification target. Prepared writes bind once they
    /// are executed. A write that cannot be stored leaves the binding alone and is reported according to the [`WritePolicy`].
    pub fn att_write(&self, conn: u16, handle: u16, mode: u16, offset: u16, data: &[u8]) -> u16 {
        let result = match TransactionMode::from_raw(mode) {
            Some(mode) => self
                .attributes
                .lock(|a| a.borrow_mut().write(handle, mode, offset as usize, data)),
            None => Err(AttErrorCode::REQUEST_NOT_SUPPORTED),
        };

        match result {
            Ok(Some(stored)) => {
                match conn_handle(conn) {
                    Some(conn) => self.with_link(|l| l.connection = Some(conn)),
                    None => warn!("[bridge] write from invalid connection handle {:04x}", conn),
                }
                if self.config.cccd_handles.contains(&stored) {
                    self.update_notifications(stored);
                }
                ATT_WRITE_ACCEPTED
            }
            // Staged, cancelled, or nothing to execute.
            Ok(None) => ATT_WRITE_ACCEPTED,
            Err(code) => match self.config.write_policy {
                WritePolicy::Reject => {
                    debug!("[bridge] write to {} rejected: {}", handle, code.value());
                    code.to_status()
                }
                WritePolicy::AcceptSilently => {
                    warn!("[bridge] write to {} dropped: {}", handle, code.value());
                    ATT_WRITE_ACCEPTED
                }
            },
        }
    }

    fn update_notifications(&self, cccd: u16) {
        let enabled = self
            .written_value(cccd, |v| v.first().map_or(false, |b| b & CCCD_NOTIFY != 0))
            .unwrap_or(false);
        debug!("[bridge] notifications {}", if enabled { "enabled" } else { "disabled" });
        self.with_link(|l| l.notifications = enabled);
    }

    /// Heartbeat timer callback: set the liveness flag and re-arm.
    pub fn on_timer(&self) {
        let period = self.heartbeat.fire();
        if self.with_controller(|c| c.arm_timer(period)).is_err() {
            warn!("[bridge] failed to re-arm heartbeat timer");
        }
    }
}
