//! The versioned event envelope and its typed payload views.
//!
//! Every message in the pipeline travels inside the same self-describing
//! wrapper (schema 1.1). Payloads stay as raw JSON in the envelope and are
//! parsed into the typed structs here at the component boundary that consumes
//! them; producers are independent, so consumers must tolerate out-of-order
//! timestamps and unknown payload fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Wire schema version stamped on every emitted envelope.
pub const SCHEMA_VERSION: &str = "1.1";

/// Closed enumeration of the event types the core understands.
///
/// Serialized as the dotted wire strings (`sensor.detection.radar`, ...).
/// Unrecognized strings round-trip through [`EventKind::Other`] so unknown
/// events can pass to the tail and subscribers unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A batch of radar detections from one scan.
    RadarDetection,
    /// An RF bearing detection window.
    RfDetection,
    /// Fusion-engine track update.
    TrackUpdate,
    /// Threat assessment for a track.
    ThreatAssessment,
    /// COP track record mutation.
    CopTrack,
    /// COP threat record mutation.
    CopThreat,
    /// Full-state COP snapshot.
    CopSnapshot,
    /// COP control notification (pause/resume).
    CopControl,
    /// Marker wrapping an event that was buffered while paused.
    CopBuffered,
    /// Anything else; passed through unchanged.
    Other(String),
}

impl EventKind {
    /// The wire string for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::RadarDetection => "sensor.detection.radar",
            Self::RfDetection => "sensor.detection.rf",
            Self::TrackUpdate => "track.update",
            Self::ThreatAssessment => "threat.assessment",
            Self::CopTrack => "cop.track",
            Self::CopThreat => "cop.threat",
            Self::CopSnapshot => "cop.snapshot",
            Self::CopControl => "cop.control",
            Self::CopBuffered => "cop.buffered",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "sensor.detection.radar" => Self::RadarDetection,
            "sensor.detection.rf" => Self::RfDetection,
            "track.update" => Self::TrackUpdate,
            "threat.assessment" => Self::ThreatAssessment,
            "cop.track" => Self::CopTrack,
            "cop.threat" => Self::CopThreat,
            "cop.snapshot" => Self::CopSnapshot,
            "cop.control" => Self::CopControl,
            "cop.buffered" => Self::CopBuffered,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EventKind::from(s.as_str()))
    }
}

/// Identity of the process that emitted an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSource {
    /// Logical agent name (e.g. `fuser-agent`, `cop-server`).
    #[serde(default)]
    pub agent_id: String,
    /// Deployment instance of the agent.
    #[serde(default)]
    pub instance_id: String,
    /// Host the agent runs on.
    #[serde(default)]
    pub host: String,
}

impl EventSource {
    /// Construct a source identity.
    pub fn new(
        agent_id: impl Into<String>,
        instance_id: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            instance_id: instance_id.into(),
            host: host.into(),
        }
    }

    /// Identity used by the COP server for everything it emits itself.
    pub fn cop_server() -> Self {
        Self::new("cop-server", "cop-01", "local")
    }

    /// Default identity for the fusion engine.
    pub fn fuser() -> Self {
        Self::new("fuser-agent", "fuser-01", "local")
    }
}

impl Default for EventSource {
    fn default() -> Self {
        Self::new("unknown", "unknown", "unknown")
    }
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_event_id() -> Uuid {
    Uuid::new_v4()
}

fn default_timestamp() -> DateTime<Utc> {
    Utc::now()
}

fn default_correlation_id() -> String {
    "unknown".to_string()
}

/// The common wrapper around every event in the pipeline.
///
/// Ingest is lenient: only `event_type` and `payload` are required on the
/// wire; every other field receives a default so independent producers with
/// partial envelopes are still accepted. `event_id` is globally unique per
/// emission; timestamps are NOT monotonic across sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Envelope schema version.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Globally unique id of this emission.
    #[serde(default = "default_event_id")]
    pub event_id: Uuid,
    /// What kind of event this is.
    pub event_type: EventKind,
    /// Producer-side timestamp.
    #[serde(default = "default_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Who emitted it.
    #[serde(default)]
    pub source: EventSource,
    /// Correlates events through the pipeline (scenario/run id).
    #[serde(default = "default_correlation_id")]
    pub correlation_id: String,
    /// Raw event payload; parse with the typed structs below.
    pub payload: Value,
}

impl EventEnvelope {
    /// Build a fresh envelope with a new event id and the current time.
    pub fn new(
        event_type: EventKind,
        source: EventSource,
        correlation_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            event_id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            source,
            correlation_id: correlation_id.into(),
            payload,
        }
    }

    /// Replace the timestamp (producers forwarding upstream time).
    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = ts;
        self
    }
}

// ---------------------------------------------------------------------------
// Sensor payloads (consumed by the fusion engine)
// ---------------------------------------------------------------------------

/// Sensor identity block inside detection payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorMeta {
    /// Sensor id (e.g. `radar-01`).
    #[serde(default)]
    pub sensor_id: String,
    /// Sensor type tag (e.g. `RADAR`, `RF`).
    #[serde(default)]
    pub sensor_type: String,
}

/// Payload of a `sensor.detection.radar` envelope: one scan's detections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RadarScanPayload {
    /// Emitting sensor.
    #[serde(default)]
    pub sensor: SensorMeta,
    /// Scan identifier, if the producer assigns one.
    #[serde(default)]
    pub scan_id: Option<String>,
    /// Detections in this scan.
    #[serde(default)]
    pub detections: Vec<RadarDetection>,
}

/// A single radar detection. All measurement fields are optional on the wire;
/// detections without both range and azimuth are dropped by the consumer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RadarDetection {
    /// Producer-local track id (debug aid only).
    #[serde(default)]
    pub local_track_id: Option<String>,
    /// Measured range in meters.
    #[serde(default)]
    pub range_m: Option<f64>,
    /// Measured azimuth in degrees.
    #[serde(default)]
    pub az_deg: Option<f64>,
    /// Measured elevation in degrees.
    #[serde(default)]
    pub el_deg: Option<f64>,
    /// Measured radial velocity in m/s (negative = approaching).
    #[serde(default)]
    pub radial_velocity_mps: Option<f64>,
    /// Signal-to-noise ratio in dB.
    #[serde(default)]
    pub snr_db: Option<f64>,
    /// Detection confidence [0, 1].
    #[serde(default)]
    pub conf: Option<f64>,
}

/// Payload of a `sensor.detection.rf` envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RfScanPayload {
    /// Emitting sensor.
    #[serde(default)]
    pub sensor: SensorMeta,
    /// Integration window in milliseconds.
    #[serde(default)]
    pub window_ms: Option<u64>,
    /// Detections in this window.
    #[serde(default)]
    pub detections: Vec<RfDetection>,
}

/// A single RF detection (bearing only).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RfDetection {
    /// Classified signal type (e.g. `drone_control_suspected`).
    #[serde(default)]
    pub signal_type: Option<String>,
    /// Bearing to the emitter in degrees.
    #[serde(default)]
    pub bearing_deg: Option<f64>,
    /// Detection confidence [0, 1].
    #[serde(default)]
    pub conf: Option<f64>,
}

// ---------------------------------------------------------------------------
// Emitted payloads (produced by the fusion engine)
// ---------------------------------------------------------------------------

/// Kinematic state carried on a `track.update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kinematics {
    /// Range in meters.
    pub range_m: f64,
    /// Azimuth in degrees.
    pub az_deg: f64,
    /// Elevation in degrees.
    pub el_deg: f64,
    /// Radial velocity in m/s.
    pub radial_velocity_mps: f64,
}

/// Target classification on a `track.update` (fixed v0 heuristic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Class label.
    pub label: String,
    /// Classifier confidence [0, 1].
    pub conf: f64,
}

/// Payload of a `track.update` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackUpdatePayload {
    /// Stable fused track identity.
    pub global_track_id: String,
    /// `CONFIRMED` once >= 2 distinct sensor kinds contributed, else `TENTATIVE`.
    pub status: String,
    /// Last-writer-wins kinematics.
    pub kinematics: Kinematics,
    /// Target classification.
    pub classification: Classification,
    /// Sensor kinds that have contributed evidence.
    pub supporting_sensors: Vec<String>,
    /// Most recent evidence notes.
    pub evidence: Vec<String>,
    /// Sensor kinds that triggered this update.
    pub last_update_sources: Vec<String>,
}

/// Payload of a `threat.assessment` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatAssessmentPayload {
    /// Track the assessment applies to.
    pub global_track_id: String,
    /// LOW / MEDIUM / HIGH.
    pub threat_level: crate::threat::score::ThreatLevel,
    /// Bounded score [0, 100].
    pub score: u32,
    /// Time to intercept in seconds, when the target is closing.
    pub tti_s: Option<f64>,
    /// Rule tags that fired.
    pub rules_fired: Vec<String>,
    /// Human-readable reasons.
    pub reasons: Vec<String>,
    /// OBSERVE or ALERT.
    pub recommended_action: crate::threat::score::RecommendedAction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_wire_strings_round_trip() {
        for kind in [
            EventKind::RadarDetection,
            EventKind::RfDetection,
            EventKind::TrackUpdate,
            EventKind::ThreatAssessment,
            EventKind::CopTrack,
            EventKind::CopThreat,
            EventKind::CopSnapshot,
            EventKind::CopControl,
        ] {
            let s = serde_json::to_string(&kind).unwrap();
            let back: EventKind = serde_json::from_str(&s).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn test_unknown_kind_passes_through() {
        let kind: EventKind = serde_json::from_str("\"world.state\"").unwrap();
        assert_eq!(kind, EventKind::Other("world.state".to_string()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"world.state\"");
    }

    #[test]
    fn test_lenient_envelope_decode() {
        // Only event_type + payload on the wire, everything else defaulted.
        let env: EventEnvelope =
            serde_json::from_value(json!({"event_type": "cop.track", "payload": {"id": "T-1"}}))
                .unwrap();
        assert_eq!(env.event_type, EventKind::CopTrack);
        assert_eq!(env.schema_version, SCHEMA_VERSION);
        assert_eq!(env.correlation_id, "unknown");
        assert_eq!(env.source.agent_id, "unknown");
    }

    #[test]
    fn test_envelope_requires_type_and_payload() {
        assert!(serde_json::from_value::<EventEnvelope>(json!({"payload": {}})).is_err());
        assert!(serde_json::from_value::<EventEnvelope>(json!({"event_type": "cop.track"})).is_err());
    }

    #[test]
    fn test_radar_payload_tolerates_partial_detections() {
        let payload: RadarScanPayload = serde_json::from_value(json!({
            "detections": [
                {"range_m": 1200.0, "az_deg": 45.0},
                {"range_m": 900.0},
                {"bogus_field": true}
            ]
        }))
        .unwrap();
        assert_eq!(payload.detections.len(), 3);
        assert!(payload.detections[1].az_deg.is_none());
    }
}
