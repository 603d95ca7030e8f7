use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::models::{BeaconObservation, LocationFix, SignalSample};

use super::ScanState;

/// Everything the presentation layer reads, as one immutable value.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub scan_state: ScanState,
    pub latest_observation: Option<BeaconObservation>,
    pub latest_fix: Option<LocationFix>,
    /// Newest first, capped at the configured recent limit.
    pub recent_samples: Vec<SignalSample>,
    /// Samples written since start or the last reset.
    pub accepted_count: u64,
    pub write_errors: u64,
    /// Bumped by every reset.
    pub reset_generation: u64,
}

/// Holds the current snapshot. Readers get a shared immutable copy; writers
/// build a new snapshot and swap it in.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Arc<ScanSnapshot>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Arc<ScanSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Apply `change` to a copy of the current snapshot and publish the result.
    pub fn update<R>(&self, change: impl FnOnce(&mut ScanSnapshot) -> R) -> R {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = ScanSnapshot::clone(&guard);
        let result = change(&mut next);
        *guard = Arc::new(next);
        result
    }
}
