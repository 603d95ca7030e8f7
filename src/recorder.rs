use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use log::{error, info, warn};

use crate::db::{SampleStore, SqliteStore, StoreError};
use crate::query::SignalQuery;
use crate::scanning::{
    AuthorizationStatus, IngestionPipeline, ScanEvent, ScanPlatform, ScanSession, ScanSnapshot,
    ScanState, SnapshotCell,
};
use crate::settings::RecorderSettings;

/// Owns the store, the ingestion pipeline, the read facade and the scan
/// session, and routes producer events to them.
pub struct SignalRecorder {
    settings: RecorderSettings,
    session: Mutex<ScanSession>,
    platform: Arc<dyn ScanPlatform>,
    pipeline: IngestionPipeline,
    query: SignalQuery,
    published: Arc<SnapshotCell>,
}

impl SignalRecorder {
    /// Build a recorder over an already opened store and publish what it holds.
    pub fn new(
        settings: RecorderSettings,
        store: Arc<dyn SampleStore>,
        platform: Arc<dyn ScanPlatform>,
    ) -> Self {
        let published = Arc::new(SnapshotCell::new());
        let query = SignalQuery::new(
            Arc::clone(&store),
            Arc::clone(&published),
            settings.recent_limit,
        );
        let pipeline = IngestionPipeline::new(
            store,
            Arc::clone(&published),
            query.clone(),
            settings.region.clone(),
            settings.refresh_every(),
        );

        if let Err(err) = query.refresh() {
            warn!("Initial load of recorded samples failed: {err}");
        }

        Self {
            session: Mutex::new(ScanSession::new(settings.region.clone())),
            settings,
            platform,
            pipeline,
            query,
            published,
        }
    }

    /// Open the SQLite store under `data_dir`. If it cannot be opened the
    /// recorder runs on an in-memory store instead.
    pub fn open(
        settings: RecorderSettings,
        data_dir: &Path,
        platform: Arc<dyn ScanPlatform>,
    ) -> Result<Self, StoreError> {
        let db_path = data_dir.join(&settings.database_file);
        let store = match SqliteStore::open(&db_path) {
            Ok(store) => store,
            Err(err) => {
                error!("{err}; recording to memory only");
                SqliteStore::open_in_memory()?
            }
        };
        Ok(Self::new(settings, Arc::new(store), platform))
    }

    /// Entry point for every producer callback. Never fails.
    pub fn handle(&self, event: ScanEvent) {
        match event {
            ScanEvent::AuthorizationChanged(status) => self.on_authorization_changed(status),
            ScanEvent::BeaconsRanged(observations) => self.pipeline.on_beacons_ranged(&observations),
            ScanEvent::LocationsUpdated(fixes) => self.pipeline.on_locations_updated(&fixes),
        }
    }

    fn on_authorization_changed(&self, status: AuthorizationStatus) {
        let state = {
            let mut session = match self.session.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            session.on_authorization_changed(status, self.platform.as_ref())
        };
        self.published.update(|snapshot| snapshot.scan_state = state);
        info!("Authorization {status:?}, scan state {state:?}");
    }

    pub fn scan_state(&self) -> ScanState {
        self.published.load().scan_state
    }

    pub fn snapshot(&self) -> Arc<ScanSnapshot> {
        self.published.load()
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    pub fn query(&self) -> &SignalQuery {
        &self.query
    }

    /// Write the CSV export into `dir` under the configured file name.
    pub fn export_to(&self, dir: &Path) -> anyhow::Result<std::path::PathBuf> {
        let path = dir.join(&self.settings.export_file);
        self.query.write_csv(&path)?;
        Ok(path)
    }
}
