//! Domain model: the event envelope every producer/consumer shares, and the
//! server-side track/threat records.

pub mod envelope;
pub mod record;

pub use envelope::{
    Classification, EventEnvelope, EventKind, EventSource, Kinematics, RadarDetection,
    RadarScanPayload, RfDetection, RfScanPayload, ThreatAssessmentPayload, TrackUpdatePayload,
};
pub use record::{epoch_secs, SnapshotPayload, ThreatRecord, TrackRecord, TrackStatus};
