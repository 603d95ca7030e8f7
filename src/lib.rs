//! Beacon signal recorder.
//!
//! Fuses beacon ranging events with the latest location fix, persists the
//! result as an append-only time series in SQLite, and publishes a read-only
//! snapshot (latest observation, latest fix, recent samples) for a
//! presentation layer. CSV export and an irreversible reset round out the
//! read side.

pub mod adapter;
pub mod db;
pub mod models;
pub mod query;
pub mod recorder;
pub mod scanning;
pub mod settings;
mod utils;

pub use db::{SampleStore, SqliteStore, StoreError, StoreLocation};
pub use models::{BeaconId, BeaconObservation, LocationFix, Proximity, SignalBand, SignalSample};
pub use query::{SignalQuery, CSV_HEADER};
pub use recorder::SignalRecorder;
pub use scanning::{
    AuthorizationStatus, IngestionPipeline, ScanEvent, ScanPlatform, ScanSnapshot, ScanState,
};
pub use settings::{BeaconRegion, RecorderSettings, SettingsStore};

/// Initialize logging (reads RUST_LOG, defaults to info). Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
