//! Authoritative COP state and the single-event apply path.
//!
//! All maps, the debug tail, the pause buffer, and the embedded fusion
//! engine live behind one mutex owned by [`super::service::CopService`].
//! Mutating methods return the envelopes to broadcast; the caller enqueues
//! them to subscribers before releasing the state guard, in commit order.

use std::collections::{BTreeMap, VecDeque};

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::domain::{
    epoch_secs, EventEnvelope, EventKind, EventSource, SnapshotPayload, ThreatRecord, TrackRecord,
};
use crate::fusion::{FusionConfig, TrackAssociator};
use crate::{CopConfig, CopError, Result};

/// Payload keys accepted as a record id, in priority order.
const ID_KEYS: [&str; 4] = ["id", "track_id", "global_track_id", "gid"];

/// Pull a record id out of a payload object using the fallback key list.
pub(crate) fn extract_id(payload: &Value) -> Option<String> {
    let obj = payload.as_object()?;
    for key in ID_KEYS {
        match obj.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Everything the COP server knows, guarded by one mutex.
#[derive(Debug)]
pub struct CopState {
    pub(crate) config: CopConfig,
    pub(crate) tracks: BTreeMap<String, TrackRecord>,
    pub(crate) threats: BTreeMap<String, ThreatRecord>,
    pub(crate) agents: Map<String, Value>,
    pub(crate) paused: bool,
    pub(crate) pause_buffer: VecDeque<EventEnvelope>,
    pub(crate) events_tail: VecDeque<Value>,
    pub(crate) fusion: TrackAssociator,
}

impl CopState {
    /// Fresh, empty state for the given configuration.
    pub fn new(config: CopConfig) -> Self {
        let fusion = TrackAssociator::new(FusionConfig {
            bearing_gate_deg: config.bearing_gate_deg,
            range_gate_m: config.range_gate_m,
            ..FusionConfig::default()
        });
        Self {
            config,
            tracks: BTreeMap::new(),
            threats: BTreeMap::new(),
            agents: Map::new(),
            paused: false,
            pause_buffer: VecDeque::new(),
            events_tail: VecDeque::new(),
            fusion,
        }
    }

    /// Reject envelopes the apply path could only half-handle.
    ///
    /// `cop.track` and `cop.threat` must carry an id under one of the
    /// accepted keys; everything else is accepted as-is (unknown types
    /// pass through).
    pub fn validate(envelope: &EventEnvelope) -> Result<()> {
        match envelope.event_type {
            EventKind::CopTrack | EventKind::CopThreat => {
                if !envelope.payload.is_object() {
                    return Err(CopError::InvalidPayload(format!(
                        "{} payload must be an object",
                        envelope.event_type
                    )));
                }
                if extract_id(&envelope.payload).is_none() {
                    return Err(CopError::MissingField("id"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Apply one validated envelope to the state at time `now` (epoch
    /// seconds) and return the envelopes to broadcast.
    ///
    /// Callers must not invoke this while paused; the service buffers
    /// instead.
    pub fn apply(&mut self, envelope: EventEnvelope, now: f64) -> Vec<EventEnvelope> {
        self.push_tail(&envelope);
        match envelope.event_type {
            EventKind::CopTrack | EventKind::TrackUpdate => self.apply_track(&envelope, now),
            EventKind::CopThreat | EventKind::ThreatAssessment => self.apply_threat(&envelope),
            EventKind::CopSnapshot => self.apply_snapshot(&envelope, now),
            EventKind::RadarDetection | EventKind::RfDetection => {
                self.apply_detection(envelope, now)
            }
            _ => {
                // Unknown and control-plane types pass through unchanged.
                vec![envelope]
            }
        }
    }

    fn apply_track(&mut self, envelope: &EventEnvelope, now: f64) -> Vec<EventEnvelope> {
        let id = match extract_id(&envelope.payload) {
            Some(id) => id,
            None => {
                // Validation catches cop.track; a fused track.update without
                // an id carries nothing to key on, so it only passes through.
                debug!(event = %envelope.event_type, "track event without id, passthrough only");
                return vec![envelope.clone()];
            }
        };
        let payload = match envelope.payload.as_object() {
            Some(obj) => obj,
            None => return vec![envelope.clone()],
        };
        let record = self
            .tracks
            .entry(id.clone())
            .or_insert_with(|| TrackRecord::new(id, now));
        record.absorb(payload, now);
        let record = record.clone();
        vec![self.server_event(EventKind::CopTrack, json!(record), &envelope.correlation_id)]
    }

    fn apply_threat(&mut self, envelope: &EventEnvelope) -> Vec<EventEnvelope> {
        let id = match extract_id(&envelope.payload) {
            Some(id) => id,
            None => {
                debug!(event = %envelope.event_type, "threat event without id, passthrough only");
                return vec![envelope.clone()];
            }
        };
        let payload = match envelope.payload.as_object() {
            Some(obj) => obj,
            None => return vec![envelope.clone()],
        };
        let record = self
            .threats
            .entry(id.clone())
            .or_insert_with(|| ThreatRecord::new(id));
        record.absorb(payload);
        let record = record.clone();
        vec![self.server_event(EventKind::CopThreat, json!(record), &envelope.correlation_id)]
    }

    fn apply_snapshot(&mut self, envelope: &EventEnvelope, now: f64) -> Vec<EventEnvelope> {
        let snapshot: SnapshotPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(snap) => snap,
            Err(err) => {
                warn!(error = %err, "dropping malformed snapshot");
                return Vec::new();
            }
        };
        self.agents = snapshot.agents;
        self.tracks = snapshot.tracks;
        self.threats = snapshot.threats;
        self.paused = snapshot.paused;
        // A caller restoring from an old dump must not see everything expire
        // on the next tick; tracks without a timestamp start their clock now.
        for track in self.tracks.values_mut() {
            if track.last_update_ts <= 0.0 {
                track.last_update_ts = now;
            }
        }
        vec![self.snapshot_envelope(&envelope.correlation_id)]
    }

    fn apply_detection(&mut self, envelope: EventEnvelope, now: f64) -> Vec<EventEnvelope> {
        let emitted = self.fusion.observe(&envelope);
        let mut out = Vec::new();
        for event in emitted {
            out.extend(self.apply(event, now));
        }
        out
    }

    /// Build a server-sourced envelope carrying a normalized record.
    pub(crate) fn server_event(
        &self,
        kind: EventKind,
        payload: Value,
        correlation_id: &str,
    ) -> EventEnvelope {
        EventEnvelope::new(kind, EventSource::cop_server(), correlation_id, payload)
    }

    /// Point-in-time copy of the authoritative maps.
    pub fn snapshot_payload(&self) -> SnapshotPayload {
        SnapshotPayload {
            agents: self.agents.clone(),
            tracks: self.tracks.clone(),
            threats: self.threats.clone(),
            paused: self.paused,
        }
    }

    /// Full snapshot as a broadcastable envelope.
    pub fn snapshot_envelope(&self, correlation_id: &str) -> EventEnvelope {
        self.server_event(
            EventKind::CopSnapshot,
            json!(self.snapshot_payload()),
            correlation_id,
        )
    }

    /// Pause-gate transition notification.
    pub fn control_envelope(&self, paused: bool) -> EventEnvelope {
        self.server_event(EventKind::CopControl, json!({ "paused": paused }), "unknown")
    }

    /// Append an envelope to the bounded debug tail.
    pub(crate) fn push_tail(&mut self, envelope: &EventEnvelope) {
        match serde_json::to_value(envelope) {
            Ok(value) => {
                self.events_tail.push_back(value);
                while self.events_tail.len() > self.config.events_tail_max {
                    self.events_tail.pop_front();
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize envelope for tail"),
        }
    }

    /// Queue an envelope while paused, dropping the oldest at capacity.
    pub(crate) fn buffer_push(&mut self, envelope: EventEnvelope) -> usize {
        if self.pause_buffer.len() >= self.config.pause_buffer_max {
            self.pause_buffer.pop_front();
            debug!("pause buffer full, dropped oldest event");
        }
        self.pause_buffer.push_back(envelope);
        self.pause_buffer.len()
    }

    /// Wipe everything back to a cold start. Unpauses.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.threats.clear();
        self.agents.clear();
        self.events_tail.clear();
        self.pause_buffer.clear();
        self.paused = false;
        self.fusion.clear();
    }
}

/// Current epoch time as f64 seconds.
pub(crate) fn now_epoch() -> f64 {
    epoch_secs(chrono::Utc::now())
}
