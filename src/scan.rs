//! Scan report filtering and the event queue item type.
use heapless::Vec;

use crate::config::EVENT_PACKET_MAX;
use crate::event::{EventPacket, GAP_EVENT_ADVERTISING_REPORT};

/// Advertising event type of a scan response in an advertising report.
pub const ADV_EVENT_TYPE_SCAN_RSP: u8 = 0x04;

/// Offset of the advertising event type in an advertising report.
const REPORT_EVENT_TYPE: usize = 2;
/// Offset of the data length in an advertising report.
const REPORT_DATA_LEN: usize = 11;
const REPORT_DATA: usize = 12;

/// A raw event packet forwarded to the script layer.
pub type QueuedPacket = Vec<u8, EVENT_PACKET_MAX>;

/// Scan filter settings.
#[derive(Debug, Clone, Copy)]
pub struct ScanConfig<'d> {
    /// Byte string searched for in scan responses. An empty marker never matches.
    pub marker: &'d [u8],
}

impl Default for ScanConfig<'_> {
    fn default() -> Self {
        Self { marker: &[] }
    }
}

/// What the filter decided for one event packet.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAction {
    /// An advertising report was seen: scanning should be (re)started.
    StartScan,
    /// A scan response contained the marker.
    Matched,
    /// A scan response without the marker: show activity only.
    ToggleIndicator,
    /// Not a scan report: forward the raw packet to the event queue.
    Forward,
}

/// Classify an event packet for a scanning role.
pub fn classify(config: &ScanConfig<'_>, packet: &EventPacket<'_>) -> ScanAction {
    if packet.event_type() != GAP_EVENT_ADVERTISING_REPORT {
        return ScanAction::Forward;
    }
    match packet.byte(REPORT_EVENT_TYPE) {
        Some(ADV_EVENT_TYPE_SCAN_RSP) => {
            if contains(report_data(packet.bytes()), config.marker) {
                ScanAction::Matched
            } else {
                ScanAction::ToggleIndicator
            }
        }
        Some(_) => ScanAction::StartScan,
        None => ScanAction::Forward,
    }
}

/// Advertising data of a report, or the whole packet if it is too short to hold the header.
fn report_data(packet: &[u8]) -> &[u8] {
    match packet.get(REPORT_DATA_LEN) {
        Some(&len) => {
            let end = (REPORT_DATA + len as usize).min(packet.len());
            &packet[REPORT_DATA.min(end)..end]
        }
        None => packet,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
