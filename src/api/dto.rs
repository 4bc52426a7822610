//! Request and response bodies for the REST endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ThreatRecord, TrackRecord};

/// Ack for `POST /api/ingest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Always true on a 2xx response.
    pub ok: bool,
    /// True when the event was queued behind the pause gate.
    pub buffered: bool,
}

/// Body of `POST /api/pause`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseRequest {
    /// Desired gate position.
    pub paused: bool,
}

/// Response of `POST /api/pause`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseResponse {
    /// Always true on a 2xx response.
    pub ok: bool,
    /// Gate position after the call.
    pub paused: bool,
    /// Events queued (pausing) or drained (resuming).
    pub buffer_depth: usize,
}

/// Response of `POST /api/reset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    /// Always true on a 2xx response.
    pub ok: bool,
}

/// Response of `GET /api/tracks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackListResponse {
    /// Number of tracks.
    pub count: usize,
    /// Tracks in id order.
    pub tracks: Vec<TrackRecord>,
}

/// Response of `GET /api/threats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatListResponse {
    /// Number of threat records.
    pub count: usize,
    /// Threat records in id order.
    pub threats: Vec<ThreatRecord>,
}

/// Response of `GET /api/agents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentListResponse {
    /// Number of known agents.
    pub count: usize,
    /// Agent metadata keyed by agent id.
    pub agents: serde_json::Map<String, Value>,
}

/// Response of `GET /api/events_tail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsTailResponse {
    /// Number of events in the tail.
    pub count: usize,
    /// Recent events, oldest first.
    pub events: Vec<Value>,
}

/// Response of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Fixed "ok" while the process is serving.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Whether the pause gate is closed.
    pub paused: bool,
    /// Current track count.
    pub tracks: usize,
    /// Live WebSocket subscribers.
    pub subscribers: usize,
}
