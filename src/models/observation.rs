use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse distance bucket reported by the ranging driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Proximity {
    #[default]
    Unknown,
    Immediate,
    Near,
    Far,
}

impl Proximity {
    /// Raw value as the ranging driver numbers it, which is also what gets persisted.
    pub fn as_raw(&self) -> i64 {
        match self {
            Proximity::Unknown => 0,
            Proximity::Immediate => 1,
            Proximity::Near => 2,
            Proximity::Far => 3,
        }
    }

    pub fn from_raw(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Proximity::Unknown),
            1 => Ok(Proximity::Immediate),
            2 => Ok(Proximity::Near),
            3 => Ok(Proximity::Far),
            other => Err(anyhow!("unknown proximity value {other}")),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Proximity::Immediate => "Right Here",
            Proximity::Near => "Near",
            Proximity::Far => "Far",
            Proximity::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BeaconId {
    pub uuid: Uuid,
    pub major: u16,
    pub minor: u16,
}

/// One ranging reading for a beacon, as delivered by the platform.
///
/// `accuracy` is negative when the driver could not estimate a distance and
/// `rssi == 0` means there was no reading at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BeaconObservation {
    pub beacon: BeaconId,
    pub proximity: Proximity,
    pub accuracy: f64,
    pub rssi: i32,
    pub timestamp: DateTime<Utc>,
}

impl BeaconObservation {
    pub fn has_signal(&self) -> bool {
        self.rssi != 0
    }
}

/// Display bucket for a signal strength reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SignalBand {
    NoSignal,
    Strong,
    Fair,
    Weak,
    Poor,
}

impl SignalBand {
    pub fn from_rssi(rssi: i32) -> Self {
        if rssi == 0 {
            SignalBand::NoSignal
        } else if rssi > -40 {
            SignalBand::Strong
        } else if rssi > -60 {
            SignalBand::Fair
        } else if rssi > -80 {
            SignalBand::Weak
        } else {
            SignalBand::Poor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proximity_raw_values_round_trip() {
        for proximity in [
            Proximity::Unknown,
            Proximity::Immediate,
            Proximity::Near,
            Proximity::Far,
        ] {
            assert_eq!(Proximity::from_raw(proximity.as_raw()).unwrap(), proximity);
        }
        assert!(Proximity::from_raw(7).is_err());
    }

    #[test]
    fn proximity_labels() {
        assert_eq!(Proximity::Immediate.label(), "Right Here");
        assert_eq!(Proximity::Unknown.label(), "Unknown");
    }

    #[test]
    fn signal_bands() {
        assert_eq!(SignalBand::from_rssi(0), SignalBand::NoSignal);
        assert_eq!(SignalBand::from_rssi(-35), SignalBand::Strong);
        assert_eq!(SignalBand::from_rssi(-40), SignalBand::Fair);
        assert_eq!(SignalBand::from_rssi(-55), SignalBand::Fair);
        assert_eq!(SignalBand::from_rssi(-60), SignalBand::Weak);
        assert_eq!(SignalBand::from_rssi(-70), SignalBand::Weak);
        assert_eq!(SignalBand::from_rssi(-80), SignalBand::Poor);
        assert_eq!(SignalBand::from_rssi(-95), SignalBand::Poor);
    }
}
