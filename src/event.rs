//! Packet event routing.
//!
//! Every HCI event the host stack delivers passes through here first. The frequent
//! bookkeeping events are discarded outright so that the interesting ones (disconnection
//! in particular) are not drowned out in the single event slot read by the script layer.

/// Packet type of HCI event packets.
pub const HCI_EVENT_PACKET: u8 = 0x04;

pub const HCI_EVENT_DISCONNECTION_COMPLETE: u8 = 0x05;
pub const HCI_EVENT_COMMAND_COMPLETE: u8 = 0x0e;
pub const HCI_EVENT_NUMBER_OF_COMPLETED_PACKETS: u8 = 0x13;
pub const HCI_EVENT_LE_META: u8 = 0x3e;
/// Stack state change, carrying an [`HciState`] in byte 2.
pub const STACK_EVENT_STATE: u8 = 0x60;
pub const STACK_EVENT_NR_CONNECTIONS_CHANGED: u8 = 0x61;
pub const HCI_EVENT_TRANSPORT_PACKET_SENT: u8 = 0x6e;
pub const GAP_EVENT_ADVERTISING_REPORT: u8 = 0xda;

/// Event types that never reach script-visible state.
pub const NOISE_EVENTS: [u8; 4] = [
    HCI_EVENT_NUMBER_OF_COMPLETED_PACKETS,
    STACK_EVENT_NR_CONNECTIONS_CHANGED,
    HCI_EVENT_TRANSPORT_PACKET_SENT,
    HCI_EVENT_COMMAND_COMPLETE,
];

pub fn is_noise(event_type: u8) -> bool {
    NOISE_EVENTS.contains(&event_type)
}

/// Coarse operational state of the host stack.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HciState {
    #[default]
    Off,
    Initializing,
    Working,
    Halting,
    Sleeping,
    FallingAsleep,
}

impl HciState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::Initializing),
            2 => Some(Self::Working),
            3 => Some(Self::Halting),
            4 => Some(Self::Sleeping),
            5 => Some(Self::FallingAsleep),
            _ => None,
        }
    }

    pub fn is_working(&self) -> bool {
        *self == Self::Working
    }
}

/// A view into a raw HCI event packet: event type, parameter length, parameters.
#[derive(Debug, Clone, Copy)]
pub struct EventPacket<'a> {
    bytes: &'a [u8],
}

impl<'a> EventPacket<'a> {
    /// Wrap a raw event. Returns `None` if the packet is too short to carry an event type.
    pub fn new(bytes: &'a [u8]) -> Option<Self> {
        if bytes.is_empty() {
            None
        } else {
            Some(Self { bytes })
        }
    }

    pub fn event_type(&self) -> u8 {
        self.bytes[0]
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Byte `index` of the packet, if present.
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }

    /// Stack state carried by a state event.
    pub fn state(&self) -> Option<HciState> {
        if self.event_type() == STACK_EVENT_STATE {
            self.byte(2).and_then(HciState::from_u8)
        } else {
            None
        }
    }

    /// Connection handle carried by a disconnection complete event.
    pub fn disconnected_handle(&self) -> Option<u16> {
        if self.event_type() == HCI_EVENT_DISCONNECTION_COMPLETE {
            let lo = self.byte(3)?;
            let hi = self.byte(4)?;
            Some(u16::from_le_bytes([lo, hi]) & 0x0fff)
        } else {
            None
        }
    }
}

/// The latched event as seen by the script layer.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatchedEvent {
    pub event_type: u8,
    /// Number of events latched since the bridge started.
    pub generation: u32,
    /// Events overwritten before they were consumed.
    pub missed: u32,
}

/// Single-slot, last-write-wins store of the most recent interesting event.
///
/// The generation counter lets a poller tell two consecutive events of the same type apart,
/// and see how many it missed.
#[derive(Debug, Default)]
pub struct EventLatch {
    last: Option<u8>,
    generation: u32,
    consumed: u32,
}

impl EventLatch {
    pub const fn new() -> Self {
        Self {
            last: None,
            generation: 0,
            consumed: 0,
        }
    }

    pub fn latch(&mut self, event_type: u8) {
        self.last = Some(event_type);
        self.generation = self.generation.wrapping_add(1);
    }

    /// The latched event, or `None` if already consumed.
    pub fn poll(&self) -> Option<LatchedEvent> {
        self.last.map(|event_type| LatchedEvent {
            event_type,
            generation: self.generation,
            missed: self.generation.wrapping_sub(self.consumed).saturating_sub(1),
        })
    }

    pub fn consume(&mut self) {
        self.last = None;
        self.consumed = self.generation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_events_are_recognized() {
        for event in NOISE_EVENTS {
            assert!(is_noise(event));
        }
        assert!(!is_noise(HCI_EVENT_DISCONNECTION_COMPLETE));
        assert!(!is_noise(STACK_EVENT_STATE));
    }

    #[test]
    fn state_only_from_state_event() {
        let working = EventPacket::new(&[STACK_EVENT_STATE, 1, 2]).unwrap();
        assert_eq!(working.state(), Some(HciState::Working));

        let other = EventPacket::new(&[HCI_EVENT_LE_META, 1, 2]).unwrap();
        assert_eq!(other.state(), None);

        let truncated = EventPacket::new(&[STACK_EVENT_STATE, 0]).unwrap();
        assert_eq!(truncated.state(), None);

        assert!(EventPacket::new(&[]).is_none());
    }

    #[test]
    fn disconnection_handle() {
        let packet = EventPacket::new(&[HCI_EVENT_DISCONNECTION_COMPLETE, 4, 0x00, 0x40, 0x00, 0x13]).unwrap();
        assert_eq!(packet.disconnected_handle(), Some(0x0040));
    }

    #[test]
    fn latch_poll_and_consume() {
        let mut latch = EventLatch::new();
        assert_eq!(latch.poll(), None);

        latch.latch(0x05);
        let event = latch.poll().unwrap();
        assert_eq!(event.event_type, 0x05);
        assert_eq!(event.generation, 1);
        assert_eq!(event.missed, 0);

        // Polling does not consume.
        assert_eq!(latch.poll(), Some(event));

        latch.consume();
        assert_eq!(latch.poll(), None);
    }

    #[test]
    fn latch_counts_overwritten_events() {
        let mut latch = EventLatch::new();
        latch.latch(0x05);
        latch.latch(0x05);
        latch.latch(0x3e);

        let event = latch.poll().unwrap();
        assert_eq!(event.event_type, 0x3e);
        assert_eq!(event.generation, 3);
        assert_eq!(event.missed, 2);

        latch.consume();
        latch.latch(0x05);
        assert_eq!(latch.poll().unwrap().missed, 0);
    }
}
