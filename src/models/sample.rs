//! The persisted signal-level record.
//!
//! A `SignalSample` is what the store keeps: one beacon observation fused with
//! the location fix that was current when the observation arrived. Samples are
//! never updated after being written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BeaconObservation, LocationFix, Proximity};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub coordinate_accuracy: f64,
    pub proximity: Proximity,
    pub beacon_accuracy: f64,
    pub rssi: i32,
    pub speed: f64,
    pub course: f64,
}

impl SignalSample {
    /// Fuse an observation with a location fix. The observation provides the timestamp.
    pub fn fuse(observation: &BeaconObservation, fix: &LocationFix) -> Self {
        Self {
            timestamp: observation.timestamp,
            latitude: fix.latitude,
            longitude: fix.longitude,
            coordinate_accuracy: fix.horizontal_accuracy,
            proximity: observation.proximity,
            beacon_accuracy: observation.accuracy,
            rssi: observation.rssi,
            speed: fix.speed,
            course: fix.course,
        }
    }
}
