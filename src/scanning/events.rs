use serde::{Deserialize, Serialize};

use crate::models::{BeaconObservation, LocationFix};

use super::AuthorizationStatus;

/// A producer callback, as a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type", content = "payload")]
pub enum ScanEvent {
    AuthorizationChanged(AuthorizationStatus),
    BeaconsRanged(Vec<BeaconObservation>),
    LocationsUpdated(Vec<LocationFix>),
}
