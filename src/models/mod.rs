pub mod location;
pub mod observation;
pub mod sample;

pub use location::LocationFix;
pub use observation::{BeaconId, BeaconObservation, Proximity, SignalBand};
pub use sample::SignalSample;
