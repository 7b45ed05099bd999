//! Advertisement config.
pub use bt_hci::param::{AdvChannelMap, AdvFilterPolicy, AdvKind};
use embassy_time::Duration;

use crate::Error;

/// Largest legacy advertising payload.
pub const MAX_ADV_DATA: usize = 31;

/// Advertising intervals are counted in 0.625 ms units.
const ADV_INTERVAL_UNIT_US: u64 = 625;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug)]
pub struct AdvertisementParameters {
    /// Advertising interval
    pub interval_min: Duration,
    pub interval_max: Duration,
    /// Advertising type used by connectable roles.
    pub kind: AdvKind,
    pub channel_map: AdvChannelMap,
    pub filter_policy: AdvFilterPolicy,
}

impl Default for AdvertisementParameters {
    fn default() -> Self {
        Self {
            interval_min: Duration::from_millis(500),
            interval_max: Duration::from_millis(500),
            kind: AdvKind::AdvInd,
            channel_map: AdvChannelMap::ALL,
            filter_policy: AdvFilterPolicy::default(),
        }
    }
}

impl AdvertisementParameters {
    /// The same parameters, switched to non-connectable advertising.
    pub fn non_connectable(self) -> Self {
        Self {
            kind: AdvKind::AdvNonconnInd,
            ..self
        }
    }

    /// Minimum interval in controller units.
    pub fn interval_min_units(&self) -> u16 {
        interval_units(self.interval_min)
    }

    /// Maximum interval in controller units.
    pub fn interval_max_units(&self) -> u16 {
        interval_units(self.interval_max)
    }
}

fn interval_units(interval: Duration) -> u16 {
    (interval.as_micros() / ADV_INTERVAL_UNIT_US).min(u16::MAX as u64) as u16
}

/// Check an advertising payload before handing it to the controller.
pub fn validate_payload(payload: &[u8]) -> Result<(), Error> {
    if payload.len() > MAX_ADV_DATA {
        Err(Error::InvalidValue)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval() {
        let params = AdvertisementParameters::default();
        assert_eq!(params.interval_min_units(), 800);
        assert_eq!(params.interval_max_units(), 800);
        assert!(matches!(params.kind, AdvKind::AdvInd));
        assert!(matches!(params.non_connectable().kind, AdvKind::AdvNonconnInd));
    }

    #[test]
    fn payload_length() {
        assert!(validate_payload(&[0; MAX_ADV_DATA]).is_ok());
        assert_eq!(validate_payload(&[0; MAX_ADV_DATA + 1]), Err(Error::InvalidValue));
    }

    #[test]
    fn interval_units_round_down_and_saturate() {
        let params = AdvertisementParameters {
            interval_min: Duration::from_micros(20_100),
            interval_max: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(params.interval_min_units(), 32);
        assert_eq!(params.interval_max_units(), u16::MAX);
    }
}
