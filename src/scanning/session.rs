use log::info;
use serde::{Deserialize, Serialize};

use crate::settings::BeaconRegion;

/// Authorization level reported by the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    AuthorizedWhenInUse,
    AuthorizedAlways,
}

impl AuthorizationStatus {
    pub fn is_granted(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::AuthorizedWhenInUse | AuthorizationStatus::AuthorizedAlways
        )
    }
}

/// `Idle` and `Scanning` are both authorized states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ScanState {
    #[default]
    Unauthorized,
    Idle,
    Scanning,
}

impl ScanState {
    pub fn is_authorized(&self) -> bool {
        !matches!(self, ScanState::Unauthorized)
    }
}

/// The platform side of ranging and positioning: capability checks and the
/// calls that start or stop the hardware session.
pub trait ScanPlatform: Send + Sync {
    fn is_monitoring_available(&self) -> bool;

    fn is_ranging_available(&self) -> bool;

    /// Start region monitoring, beacon ranging and location updates.
    fn start_scanning(&self, region: &BeaconRegion);

    fn stop_scanning(&self, _region: &BeaconRegion) {}
}

/// Authorization and scanning lifecycle.
///
/// Capability checks run once, on the transition into the authorized state.
/// If either capability is missing the session stays `Idle` for good. Wiping
/// data never touches this state.
#[derive(Debug)]
pub struct ScanSession {
    state: ScanState,
    region: BeaconRegion,
}

impl ScanSession {
    pub fn new(region: BeaconRegion) -> Self {
        Self {
            state: ScanState::Unauthorized,
            region,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn region(&self) -> &BeaconRegion {
        &self.region
    }

    pub fn on_authorization_changed(
        &mut self,
        status: AuthorizationStatus,
        platform: &dyn ScanPlatform,
    ) -> ScanState {
        match (self.state, status.is_granted()) {
            (ScanState::Unauthorized, true) => {
                self.state = ScanState::Idle;
                if platform.is_monitoring_available() && platform.is_ranging_available() {
                    platform.start_scanning(&self.region);
                    self.state = ScanState::Scanning;
                    info!("Scanning started for region {}", self.region.identifier);
                } else {
                    info!("Monitoring or ranging unavailable; staying idle");
                }
            }
            (ScanState::Scanning, false) => {
                platform.stop_scanning(&self.region);
                self.state = ScanState::Unauthorized;
                info!("Authorization revoked ({status:?}); scanning stopped");
            }
            (ScanState::Idle, false) => {
                self.state = ScanState::Unauthorized;
            }
            _ => {}
        }
        self.state
    }
}
