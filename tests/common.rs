use std::sync::{Arc, Mutex};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Duration;
use trouble_bridge::advertise::{AdvKind, AdvertisementParameters};
use trouble_bridge::{BleBridge, BridgeConfig, ConnHandle, HostController, PowerMode};

pub const LOCAL_ADDRESS: [u8; 6] = [0xff, 0x9f, 0x1a, 0x05, 0xe4, 0xff];

/// Attribute database with a single primary service declaration.
pub const PROFILE: &[u8] = &[
    0x01, // database version
    0x0a, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x28, 0x00, 0x18, // service 0x1800
    0x00, 0x00,
];

#[allow(unused)]
pub type Bridge<'d> = BleBridge<'d, CriticalSectionRawMutex, MockController>;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    InitL2cap,
    InitSecurityManager,
    InitAttServer(Option<Vec<u8>>),
    RegisterPacketHandler,
    ArmTimer(Duration),
    Power(PowerMode),
    AdvParams {
        interval_min: u16,
        interval_max: u16,
        connectable: bool,
    },
    AdvData(Vec<u8>),
    AdvEnable(bool),
    ScanEnable(bool),
    Notify(u16, u16, Vec<u8>),
    CanSendNow(u16),
    Indicator(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockError(pub &'static str);

/// Shared view of what the mock controller was asked to do.
#[derive(Clone, Default)]
pub struct Recorder {
    commands: Arc<Mutex<Vec<Command>>>,
    fail: Arc<Mutex<Option<&'static str>>>,
}

#[allow(unused)]
impl Recorder {
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }

    pub fn count(&self, command: &Command) -> usize {
        self.commands.lock().unwrap().iter().filter(|c| *c == command).count()
    }

    /// Make the named step fail from now on.
    pub fn fail_at(&self, step: Option<&'static str>) {
        *self.fail.lock().unwrap() = step;
    }
}

pub struct MockController {
    recorder: Recorder,
}

impl MockController {
    pub fn new() -> (Self, Recorder) {
        let recorder = Recorder::default();
        (
            Self {
                recorder: recorder.clone(),
            },
            recorder,
        )
    }

    fn record(&mut self, step: &'static str, command: Command) -> Result<(), MockError> {
        if *self.recorder.fail.lock().unwrap() == Some(step) {
            return Err(MockError(step));
        }
        self.recorder.commands.lock().unwrap().push(command);
        Ok(())
    }
}

impl<'d> HostController<'d> for MockController {
    type Error = MockError;

    fn init_l2cap(&mut self) -> Result<(), Self::Error> {
        self.record("l2cap", Command::InitL2cap)
    }

    fn init_security_manager(&mut self) -> Result<(), Self::Error> {
        self.record("sm", Command::InitSecurityManager)
    }

    fn init_att_server(&mut self, profile: Option<&'d [u8]>) -> Result<(), Self::Error> {
        self.record("att", Command::InitAttServer(profile.map(|p| p.to_vec())))
    }

    fn register_packet_handler(&mut self) -> Result<(), Self::Error> {
        self.record("handler", Command::RegisterPacketHandler)
    }

    fn arm_timer(&mut self, period: Duration) -> Result<(), Self::Error> {
        self.record("timer", Command::ArmTimer(period))
    }

    fn power_control(&mut self, mode: PowerMode) -> Result<(), Self::Error> {
        self.record("power", Command::Power(mode))
    }

    fn local_address(&mut self) -> [u8; 6] {
        LOCAL_ADDRESS
    }

    fn set_advertising_params(&mut self, params: &AdvertisementParameters) -> Result<(), Self::Error> {
        self.record(
            "adv params",
            Command::AdvParams {
                interval_min: params.interval_min_units(),
                interval_max: params.interval_max_units(),
                connectable: matches!(params.kind, AdvKind::AdvInd),
            },
        )
    }

    fn set_advertising_data(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.record("adv data", Command::AdvData(data.to_vec()))
    }

    fn set_advertising_enable(&mut self, enable: bool) -> Result<(), Self::Error> {
        self.record("adv enable", Command::AdvEnable(enable))
    }

    fn set_scan_enable(&mut self, enable: bool) -> Result<(), Self::Error> {
        self.record("scan enable", Command::ScanEnable(enable))
    }

    fn notify(&mut self, conn: ConnHandle, handle: u16, value: &[u8]) -> Result<(), Self::Error> {
        self.record("notify", Command::Notify(conn.raw(), handle, value.to_vec()))
    }

    fn request_can_send_now(&mut self, conn: ConnHandle) -> Result<(), Self::Error> {
        self.record("can send now", Command::CanSendNow(conn.raw()))
    }

    fn set_indicator(&mut self, on: bool) {
        let _ = self.record("indicator", Command::Indicator(on));
    }
}

#[allow(unused)]
pub fn bridge<'d>(config: BridgeConfig<'d>) -> (Bridge<'d>, Recorder) {
    let _ = env_logger::try_init();
    let (controller, recorder) = MockController::new();
    (BleBridge::new(controller, config), recorder)
}

/// Stack state event reporting the working state.
#[allow(unused)]
pub const STATE_WORKING: [u8; 3] = [0x60, 0x01, 0x02];

/// HCI disconnection complete for `handle`.
#[allow(unused)]
pub fn disconnection(handle: u16) -> [u8; 6] {
    let [lo, hi] = handle.to_le_bytes();
    [0x05, 0x04, 0x00, lo, hi, 0x13]
}

/// Advertising report as delivered by the host stack.
#[allow(unused)]
pub fn advertising_report(event_type: u8, data: &[u8]) -> Vec<u8> {
    let mut report = vec![0xda, (10 + data.len()) as u8, event_type, 0x00];
    report.extend_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    report.push(0xc4);
    report.push(data.len() as u8);
    report.extend_from_slice(data);
    report
}
