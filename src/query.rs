//! Read side: recent samples, CSV export and the irreversible reset.

use std::{fmt::Write as _, fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use log::{error, info, warn};

use crate::db::{SampleStore, StoreError};
use crate::models::SignalSample;
use crate::scanning::SnapshotCell;

pub const CSV_HEADER: &str =
    "timestamp,latitude,longitude,coordinate_accuracy,speed,course,proximity,beacon_accuracy,rssi";

#[derive(Clone)]
pub struct SignalQuery {
    store: Arc<dyn SampleStore>,
    published: Arc<SnapshotCell>,
    recent_limit: usize,
}

impl SignalQuery {
    pub fn new(store: Arc<dyn SampleStore>, published: Arc<SnapshotCell>, recent_limit: usize) -> Self {
        Self {
            store,
            published,
            recent_limit,
        }
    }

    pub fn recent_limit(&self) -> usize {
        self.recent_limit
    }

    /// Re-read the newest samples and publish them.
    ///
    /// On failure the previously published list stays in place. A result read
    /// before a concurrent `reset` is discarded rather than published.
    pub fn refresh(&self) -> Result<(), StoreError> {
        let generation = self.published.load().reset_generation;
        let samples = self.store.query_recent(Some(self.recent_limit))?;
        let count = samples.len();
        let published = self.published.update(|snapshot| {
            if snapshot.reset_generation != generation {
                return false;
            }
            snapshot.recent_samples = samples;
            true
        });
        if published {
            log::debug!("Published {count} recent samples");
        } else {
            log::debug!("Discarded {count} samples read before a reset");
        }
        Ok(())
    }

    /// Newest first, at most `max_count` samples.
    ///
    /// Falls back to the published list when the store cannot be read.
    pub fn recent(&self, max_count: usize) -> Vec<SignalSample> {
        match self.store.query_recent(Some(max_count)) {
            Ok(samples) => samples,
            Err(err) => {
                warn!("Serving cached samples, store read failed: {err}");
                let snapshot = self.published.load();
                snapshot.recent_samples.iter().take(max_count).cloned().collect()
            }
        }
    }

    /// Every stored sample as CSV, newest first. An empty store yields only the header.
    pub fn export_csv(&self) -> Result<String, StoreError> {
        let samples = self.store.query_recent(None)?;
        Ok(render_csv(&samples))
    }

    pub fn write_csv(&self, path: &Path) -> Result<usize> {
        let csv = self.export_csv()?;
        fs::write(path, &csv)
            .with_context(|| format!("failed to write export to {}", path.display()))?;
        let rows = csv.lines().count().saturating_sub(1);
        info!("Exported {rows} samples to {}", path.display());
        Ok(rows)
    }

    /// Destroy all samples and clear the read-side cache and accepted count.
    ///
    /// A failed wipe is still followed by reinitializing an empty store; the
    /// wipe error is returned once recovery has been attempted.
    pub fn reset(&self) -> Result<(), StoreError> {
        let wiped = self.store.wipe_all();
        if let Err(err) = &wiped {
            error!("Wipe failed, reinitializing empty store: {err}");
            if let Err(init_err) = self.store.reinitialize() {
                error!("Store reinitialization failed: {init_err}");
            }
        }

        self.published.update(|snapshot| {
            snapshot.recent_samples.clear();
            snapshot.accepted_count = 0;
            snapshot.reset_generation += 1;
        });
        info!("Recorded samples reset");
        wiped
    }
}

pub fn render_csv(samples: &[SignalSample]) -> String {
    let mut csv = String::with_capacity(CSV_HEADER.len() + 1 + samples.len() * 96);
    csv.push_str(CSV_HEADER);
    csv.push('\n');

    for sample in samples {
        // Writing into a String cannot fail.
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{}",
            sample.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            sample.latitude,
            sample.longitude,
            sample.coordinate_accuracy,
            sample.speed,
            sample.course,
            sample.proximity.as_raw(),
            sample.beacon_accuracy,
            sample.rssi,
        );
    }

    csv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::Proximity;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::thread;

    fn sample(secs: i64, rssi: i32) -> SignalSample {
        SignalSample {
            timestamp: Utc.timestamp_opt(1_648_200_000 + secs, 0).unwrap(),
            latitude: 50.8062,
            longitude: -0.0223,
            coordinate_accuracy: 5.0,
            proximity: Proximity::Near,
            beacon_accuracy: 2.1,
            rssi,
            speed: -1.0,
            course: -1.0,
        }
    }

    fn query_over(store: Arc<dyn SampleStore>, limit: usize) -> (SignalQuery, Arc<SnapshotCell>) {
        let published = Arc::new(SnapshotCell::new());
        (SignalQuery::new(store, Arc::clone(&published), limit), published)
    }

    #[test]
    fn empty_export_is_header_only() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let (query, _) = query_over(store, 50);
        let csv = query.export_csv().unwrap();
        assert_eq!(csv, format!("{CSV_HEADER}\n"));
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn export_has_one_row_per_sample() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        for i in 0..5 {
            store.append(&sample(i, -50 - i as i32)).unwrap();
        }
        let (query, _) = query_over(store, 50);

        let csv = query.export_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "2022-03-25T09:20:04.000Z,50.8062,-0.0223,5,-1,-1,2,2.1,-54"
        );
    }

    #[test]
    fn export_keeps_invalid_values_negative() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .append(&SignalSample {
                coordinate_accuracy: -1.0,
                beacon_accuracy: -1.0,
                proximity: Proximity::Unknown,
                ..sample(0, -91)
            })
            .unwrap();
        let (query, _) = query_over(store, 50);

        let csv = query.export_csv().unwrap();
        assert_eq!(
            csv.lines().nth(1).unwrap(),
            "2022-03-25T09:20:00.000Z,50.8062,-0.0223,-1,-1,-1,0,-1,-91"
        );
    }

    #[test]
    fn refresh_publishes_capped_list() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        for i in 0..10 {
            store.append(&sample(i, -60)).unwrap();
        }
        let (query, published) = query_over(store, 3);

        query.refresh().unwrap();
        let snapshot = published.load();
        assert_eq!(snapshot.recent_samples.len(), 3);
        assert_eq!(snapshot.recent_samples[0].timestamp, sample(9, -60).timestamp);

        assert_eq!(query.recent(7).len(), 7);
    }

    #[test]
    fn reset_clears_store_cache_and_count() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.append(&sample(0, -60)).unwrap();
        let (query, published) = query_over(store.clone(), 50);
        query.refresh().unwrap();
        published.update(|s| s.accepted_count = 1);

        query.reset().unwrap();
        assert!(store.query_recent(None).unwrap().is_empty());
        assert!(published.load().recent_samples.is_empty());
        assert_eq!(published.load().accepted_count, 0);

        query.reset().unwrap();
        assert_eq!(query.export_csv().unwrap().lines().count(), 1);
    }

    #[test]
    fn write_csv_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.append(&sample(0, -60)).unwrap();
        let (query, _) = query_over(store, 50);

        assert_eq!(query.write_csv(&path).unwrap(), 1);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(CSV_HEADER));
    }

    struct BrokenStore {
        reinitialized: AtomicUsize,
    }

    impl SampleStore for BrokenStore {
        fn append(&self, _sample: &SignalSample) -> Result<(), StoreError> {
            Err(StoreError::WriteFailed("disk full".into()))
        }

        fn query_recent(&self, _limit: Option<usize>) -> Result<Vec<SignalSample>, StoreError> {
            Err(StoreError::ReadFailed("corrupt".into()))
        }

        fn wipe_all(&self) -> Result<(), StoreError> {
            Err(StoreError::DestroyFailed("permission denied".into()))
        }

        fn reinitialize(&self) -> Result<(), StoreError> {
            self.reinitialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn len(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    #[test]
    fn failed_wipe_still_reinitializes_and_clears_cache() {
        let store = Arc::new(BrokenStore {
            reinitialized: AtomicUsize::new(0),
        });
        let (query, published) = query_over(store.clone(), 50);
        published.update(|s| {
            s.recent_samples.push(sample(0, -60));
            s.accepted_count = 4;
        });

        let err = query.reset().unwrap_err();
        assert!(matches!(err, StoreError::DestroyFailed(_)));
        assert_eq!(store.reinitialized.load(Ordering::SeqCst), 1);
        assert!(published.load().recent_samples.is_empty());
        assert_eq!(published.load().accepted_count, 0);
    }

    #[test]
    fn read_failures_keep_cached_list() {
        let store = Arc::new(BrokenStore {
            reinitialized: AtomicUsize::new(0),
        });
        let (query, published) = query_over(store, 50);
        published.update(|s| s.recent_samples = vec![sample(1, -61), sample(0, -60)]);

        assert!(query.refresh().is_err());
        assert_eq!(published.load().recent_samples.len(), 2);
        assert_eq!(query.recent(1), vec![sample(1, -61)]);
        assert!(query.export_csv().is_err());
    }

    /// Pauses the first `query_recent` call after it has read from the inner store.
    struct PausingStore {
        inner: SqliteStore,
        read_done: Mutex<Option<mpsc::Sender<()>>>,
        resume: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl SampleStore for PausingStore {
        fn append(&self, sample: &SignalSample) -> Result<(), StoreError> {
            self.inner.append(sample)
        }

        fn query_recent(&self, limit: Option<usize>) -> Result<Vec<SignalSample>, StoreError> {
            let samples = self.inner.query_recent(limit)?;
            let read_done = self.read_done.lock().unwrap().take();
            let resume = self.resume.lock().unwrap().take();
            if let (Some(read_done), Some(resume)) = (read_done, resume) {
                read_done.send(()).unwrap();
                resume.recv().unwrap();
            }
            Ok(samples)
        }

        fn wipe_all(&self) -> Result<(), StoreError> {
            self.inner.wipe_all()
        }

        fn reinitialize(&self) -> Result<(), StoreError> {
            self.inner.reinitialize()
        }

        fn len(&self) -> Result<usize, StoreError> {
            self.inner.len()
        }
    }

    #[test]
    fn refresh_read_before_reset_is_not_published() {
        let (read_done_tx, read_done_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        let store = Arc::new(PausingStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            read_done: Mutex::new(Some(read_done_tx)),
            resume: Mutex::new(Some(resume_rx)),
        });
        store.append(&sample(0, -60)).unwrap();
        let (query, published) = query_over(store.clone(), 50);

        let refreshing = {
            let query = query.clone();
            thread::spawn(move || query.refresh())
        };

        read_done_rx.recv().unwrap();
        query.reset().unwrap();
        resume_tx.send(()).unwrap();
        refreshing.join().unwrap().unwrap();

        assert_eq!(store.len().unwrap(), 0);
        let snapshot = published.load();
        assert!(snapshot.recent_samples.is_empty());
        assert_eq!(snapshot.accepted_count, 0);
        assert_eq!(snapshot.reset_generation, 1);

        store.append(&sample(1, -61)).unwrap();
        query.refresh().unwrap();
        assert_eq!(published.load().recent_samples, vec![sample(1, -61)]);
    }
}
