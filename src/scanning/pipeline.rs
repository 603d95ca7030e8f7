use std::sync::Arc;

use crate::db::SampleStore;
use crate::models::{BeaconObservation, LocationFix};
use crate::query::SignalQuery;
use crate::settings::BeaconRegion;

use super::{Correlator, SnapshotCell};

// Per-event logging; switch off to quiet high-frequency ranging.
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

/// Turns producer callbacks into persisted samples.
///
/// Each callback runs a short critical section on the correlator and then, with
/// no lock held, writes to the store. Failures are counted and logged; nothing
/// here returns an error to the producer.
pub struct IngestionPipeline {
    store: Arc<dyn SampleStore>,
    correlator: Correlator,
    published: Arc<SnapshotCell>,
    query: SignalQuery,
    region: BeaconRegion,
    refresh_every: u64,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn SampleStore>,
        published: Arc<SnapshotCell>,
        query: SignalQuery,
        region: BeaconRegion,
        refresh_every: u64,
    ) -> Self {
        Self {
            store,
            correlator: Correlator::new(),
            published,
            query,
            region,
            refresh_every: refresh_every.max(1),
        }
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn on_location_update(&self, fix: LocationFix) {
        self.correlator.on_location_fix(fix);
        self.published.update(|snapshot| snapshot.latest_fix = Some(fix));
    }

    /// Location callbacks deliver a batch; the first fix becomes current.
    pub fn on_locations_updated(&self, fixes: &[LocationFix]) {
        if let Some(fix) = fixes.first() {
            self.on_location_update(*fix);
        }
    }

    /// Ranging callbacks deliver a batch; only the first beacon in the
    /// monitored region is used.
    pub fn on_beacons_ranged(&self, observations: &[BeaconObservation]) {
        match observations
            .iter()
            .find(|observation| self.region.matches(&observation.beacon))
        {
            Some(observation) => self.on_beacon_ranged(observation.clone()),
            None if !observations.is_empty() => {
                log_debug!("Ignoring {} beacons outside the monitored region", observations.len());
            }
            None => {}
        }
    }

    pub fn on_beacon_ranged(&self, observation: BeaconObservation) {
        let has_signal = observation.has_signal();
        let fused = self.correlator.on_beacon_observation(observation.clone());
        self.published
            .update(|snapshot| snapshot.latest_observation = Some(observation));

        // Zero RSSI is an out-of-range reading: shown as the last signal, never stored.
        if !has_signal {
            log_debug!("Dropping zero-rssi observation");
            return;
        }

        let Some(sample) = fused else {
            log_debug!("No location fix yet; observation not recorded");
            return;
        };

        if let Err(err) = self.store.append(&sample) {
            let errors = self.published.update(|snapshot| {
                snapshot.write_errors += 1;
                snapshot.write_errors
            });
            log_error!("Dropping sample at {}: {err} ({errors} write errors)", sample.timestamp);
            return;
        }

        let accepted = self.published.update(|snapshot| {
            snapshot.accepted_count += 1;
            snapshot.accepted_count
        });

        if accepted % self.refresh_every == 0 {
            if let Err(err) = self.query.refresh() {
                log_warn!("Recent sample refresh failed: {err}");
            }
        }
    }
}
