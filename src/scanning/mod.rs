pub mod correlator;
pub mod events;
pub mod pipeline;
pub mod session;
pub mod snapshot;

pub use correlator::Correlator;
pub use events::ScanEvent;
pub use pipeline::IngestionPipeline;
pub use session::{AuthorizationStatus, ScanPlatform, ScanSession, ScanState};
pub use snapshot::{ScanSnapshot, SnapshotCell};
