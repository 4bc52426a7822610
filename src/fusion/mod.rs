//! Track fusion: gated nearest-match association of radar and RF detections
//! into stable bucketed track identities.

pub mod associator;

pub use associator::{ang_diff_deg, make_track_id, wrap_deg, FusedTrack, FusionConfig, SensorKind, TrackAssociator};
