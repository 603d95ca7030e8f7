use std::sync::{Mutex, MutexGuard};

use crate::models::{BeaconObservation, LocationFix, SignalSample};

#[derive(Debug, Default)]
struct CorrelatorState {
    latest_fix: Option<LocationFix>,
    latest_observation: Option<BeaconObservation>,
}

/// Last-value-wins fusion of the beacon and location streams.
///
/// There is no staleness check and no buffering: an observation that arrives
/// before the first fix is not fused, and is not kept for later.
#[derive(Debug, Default)]
pub struct Correlator {
    state: Mutex<CorrelatorState>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CorrelatorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn on_location_fix(&self, fix: LocationFix) {
        self.lock().latest_fix = Some(fix);
    }

    /// Record the observation and fuse it with the current fix, if any.
    pub fn on_beacon_observation(&self, observation: BeaconObservation) -> Option<SignalSample> {
        let mut state = self.lock();
        let sample = state
            .latest_fix
            .as_ref()
            .map(|fix| SignalSample::fuse(&observation, fix));
        state.latest_observation = Some(observation);
        sample
    }

    pub fn latest_fix(&self) -> Option<LocationFix> {
        self.lock().latest_fix
    }

    pub fn latest_observation(&self) -> Option<BeaconObservation> {
        self.lock().latest_observation.clone()
    }
}
