//! The service facade: one mutex around [`CopState`], fan-out through the
//! [`BroadcastHub`], and the operations the HTTP layer exposes.
//!
//! Every operation is a single critical section on the state lock, and
//! outbound envelopes are enqueued to subscribers before the guard drops.
//! Enqueueing is memory-only (socket I/O lives in the per-connection
//! forward tasks), so holding the lock across it is cheap and gives every
//! subscriber the exact commit order, even across concurrent operations.
//! Lock order is always state, then hub registry.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cop::aging::age_tracks;
use crate::cop::store::{now_epoch, CopState};
use crate::domain::{EventEnvelope, SnapshotPayload, ThreatRecord, TrackRecord};
use crate::hub::{BroadcastHub, Frame};
use crate::{CopConfig, Result};

/// What happened to an ingested envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Applied to the picture and broadcast.
    Applied,
    /// Queued behind the pause gate; value is the buffer depth after.
    Buffered(usize),
}

impl IngestOutcome {
    /// True when the event was buffered instead of applied.
    pub fn buffered(self) -> bool {
        matches!(self, Self::Buffered(_))
    }
}

/// Result of a pause-gate toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseStatus {
    /// Gate position after the call.
    pub paused: bool,
    /// Buffer depth: queued events when pausing, drained events when resuming.
    pub buffer_depth: usize,
}

/// Shared COP service handle.
pub struct CopService {
    state: Mutex<CopState>,
    hub: BroadcastHub,
    config: CopConfig,
}

impl CopService {
    /// Build a service with empty state.
    pub fn new(config: CopConfig) -> Self {
        Self {
            state: Mutex::new(CopState::new(config.clone())),
            hub: BroadcastHub::new(),
            config,
        }
    }

    /// The configuration this service was built with.
    pub fn config(&self) -> &CopConfig {
        &self.config
    }

    /// Ingest one envelope: validate, then apply-and-broadcast or buffer.
    ///
    /// Validation happens before the pause gate, so a malformed event is
    /// rejected rather than buffered and failed later.
    pub fn ingest(&self, envelope: EventEnvelope) -> Result<IngestOutcome> {
        CopState::validate(&envelope)?;
        let mut state = self.state.lock();
        if state.paused {
            let marker = state.server_event(
                crate::domain::EventKind::CopBuffered,
                serde_json::json!({
                    "event_type": envelope.event_type.as_str(),
                    "event": &envelope,
                }),
                &envelope.correlation_id,
            );
            state.push_tail(&marker);
            let depth = state.buffer_push(envelope);
            return Ok(IngestOutcome::Buffered(depth));
        }
        let out = state.apply(envelope, now_epoch());
        self.publish_all(out);
        Ok(IngestOutcome::Applied)
    }

    /// Toggle the pause gate. Idempotent: re-asserting the current position
    /// broadcasts nothing.
    ///
    /// Pausing broadcasts `cop.control {paused: true}` then a snapshot.
    /// Resuming broadcasts the control flip and a fresh snapshot first, then
    /// replays the whole buffer in arrival order inside the same critical
    /// section, so no live event interleaves with the drain.
    pub fn set_paused(&self, paused: bool) -> PauseStatus {
        let mut state = self.state.lock();
        if state.paused == paused {
            return PauseStatus {
                paused,
                buffer_depth: state.pause_buffer.len(),
            };
        }
        state.paused = paused;
        let mut out = vec![state.control_envelope(paused)];
        out.push(state.snapshot_envelope("unknown"));
        let depth;
        if paused {
            depth = state.pause_buffer.len();
            info!("pause gate closed");
        } else {
            let buffered: Vec<EventEnvelope> = state.pause_buffer.drain(..).collect();
            depth = buffered.len();
            let now = now_epoch();
            for envelope in buffered {
                out.extend(state.apply(envelope, now));
            }
            info!(drained = depth, "pause gate opened, buffer drained");
        }
        self.publish_all(out);
        PauseStatus {
            paused,
            buffer_depth: depth,
        }
    }

    /// Wipe all state, unpause, and broadcast the resulting empty snapshot.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.reset();
        let out = vec![state.snapshot_envelope("unknown")];
        info!("state reset");
        self.publish_all(out);
    }

    /// Run one aging pass at the current time.
    pub fn aging_tick(&self) {
        self.aging_tick_at(now_epoch());
    }

    /// Run one aging pass at an explicit time (epoch seconds).
    pub fn aging_tick_at(&self, now: f64) {
        let mut state = self.state.lock();
        let out = age_tracks(&mut state, now);
        self.publish_all(out);
    }

    /// Point-in-time snapshot of the picture.
    pub fn snapshot(&self) -> SnapshotPayload {
        self.state.lock().snapshot_payload()
    }

    /// Current tracks in id order.
    pub fn tracks(&self) -> Vec<TrackRecord> {
        self.state.lock().tracks.values().cloned().collect()
    }

    /// Current threat records in id order.
    pub fn threats(&self) -> Vec<ThreatRecord> {
        self.state.lock().threats.values().cloned().collect()
    }

    /// Known agents and their metadata.
    pub fn agents(&self) -> serde_json::Map<String, Value> {
        self.state.lock().agents.clone()
    }

    /// The bounded debug tail, oldest first.
    pub fn events_tail(&self) -> Vec<Value> {
        self.state.lock().events_tail.iter().cloned().collect()
    }

    /// Whether the pause gate is currently closed.
    pub fn paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Number of live WebSocket subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Register a subscriber and build its initial snapshot frame.
    ///
    /// Registration and the snapshot read happen in one state critical
    /// section, so every event committed after the snapshot also lands on
    /// the new queue: the subscriber never misses or double-sees an event.
    pub fn attach_subscriber(&self) -> (Uuid, mpsc::UnboundedReceiver<Frame>, Option<Frame>) {
        let state = self.state.lock();
        let (id, rx) = self.hub.register();
        let snapshot = state.snapshot_envelope("unknown");
        drop(state);
        (id, rx, serialize_frame(&snapshot))
    }

    /// Drop a subscriber's queue.
    pub fn detach_subscriber(&self, id: Uuid) {
        self.hub.remove(id);
    }

    fn publish_all(&self, envelopes: Vec<EventEnvelope>) {
        for envelope in envelopes {
            if let Some(frame) = serialize_frame(&envelope) {
                self.hub.publish(frame);
            }
        }
    }
}

fn serialize_frame(envelope: &EventEnvelope) -> Option<Frame> {
    match serde_json::to_string(envelope) {
        Ok(json) => Some(Arc::from(json.as_str())),
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound envelope");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventKind, EventSource};
    use serde_json::json;

    fn track_env(id: &str) -> EventEnvelope {
        EventEnvelope::new(
            EventKind::CopTrack,
            EventSource::default(),
            "corr",
            json!({ "id": id }),
        )
    }

    fn frame_type(frame: &Frame) -> String {
        let v: Value = serde_json::from_str(frame).unwrap();
        v["event_type"].as_str().unwrap().to_owned()
    }

    #[test]
    fn ingest_applies_and_broadcasts() {
        let service = CopService::new(CopConfig::default());
        let (_id, mut rx, _snap) = service.attach_subscriber();
        let outcome = service.ingest(track_env("T-1")).unwrap();
        assert_eq!(outcome, IngestOutcome::Applied);
        assert_eq!(frame_type(&rx.try_recv().unwrap()), "cop.track");
        assert_eq!(service.tracks().len(), 1);
    }

    #[test]
    fn malformed_ingest_is_rejected_not_buffered() {
        let service = CopService::new(CopConfig::default());
        service.set_paused(true);
        let env = EventEnvelope::new(
            EventKind::CopTrack,
            EventSource::default(),
            "corr",
            json!({ "no_id": true }),
        );
        assert!(service.ingest(env).is_err());
        let status = service.set_paused(true);
        assert_eq!(status.buffer_depth, 0);
    }

    #[test]
    fn pause_buffers_and_resume_replays_in_order() {
        let service = CopService::new(CopConfig::default());
        let status = service.set_paused(true);
        assert!(status.paused);
        assert_eq!(status.buffer_depth, 0);

        for i in 0..3 {
            let outcome = service.ingest(track_env(&format!("T-{i}"))).unwrap();
            assert_eq!(outcome, IngestOutcome::Buffered(i + 1));
        }
        assert!(service.tracks().is_empty());

        let (_id, mut rx, _snap) = service.attach_subscriber();
        let status = service.set_paused(false);
        assert!(!status.paused);
        assert_eq!(status.buffer_depth, 3);

        // Control flip and snapshot precede the replayed events.
        assert_eq!(frame_type(&rx.try_recv().unwrap()), "cop.control");
        assert_eq!(frame_type(&rx.try_recv().unwrap()), "cop.snapshot");
        for i in 0..3 {
            let frame = rx.try_recv().unwrap();
            let v: Value = serde_json::from_str(&frame).unwrap();
            assert_eq!(v["event_type"], "cop.track");
            assert_eq!(v["payload"]["id"], format!("T-{i}"));
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(service.tracks().len(), 3);
    }

    #[test]
    fn nothing_is_broadcast_while_paused() {
        let service = CopService::new(CopConfig::default());
        let (_id, mut rx, _snap) = service.attach_subscriber();
        service.set_paused(true);
        // Drain the pause transition frames.
        while rx.try_recv().is_ok() {}

        service.ingest(track_env("T-1")).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn buffered_marker_keeps_the_full_event_in_the_tail() {
        let service = CopService::new(CopConfig::default());
        service.set_paused(true);
        service.ingest(track_env("T-1")).unwrap();

        let tail = service.events_tail();
        let marker = tail.last().unwrap();
        assert_eq!(marker["event_type"], "cop.buffered");
        assert_eq!(marker["payload"]["event_type"], "cop.track");
        assert_eq!(marker["payload"]["event"]["event_type"], "cop.track");
        assert_eq!(marker["payload"]["event"]["payload"]["id"], "T-1");
    }

    #[test]
    fn repeated_pause_is_idempotent() {
        let service = CopService::new(CopConfig::default());
        let (_id, mut rx, _snap) = service.attach_subscriber();
        service.set_paused(true);
        while rx.try_recv().is_ok() {}
        let status = service.set_paused(true);
        assert!(status.paused);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn snapshot_on_attach_reflects_current_state() {
        let service = CopService::new(CopConfig::default());
        service.ingest(track_env("T-1")).unwrap();
        let (_id, _rx, snap) = service.attach_subscriber();
        let v: Value = serde_json::from_str(&snap.unwrap()).unwrap();
        assert_eq!(v["event_type"], "cop.snapshot");
        assert!(v["payload"]["tracks"]["T-1"].is_object());
    }

    #[test]
    fn reset_broadcasts_empty_snapshot() {
        let service = CopService::new(CopConfig::default());
        service.ingest(track_env("T-1")).unwrap();
        let (_id, mut rx, _snap) = service.attach_subscriber();
        service.reset();
        let frame = rx.try_recv().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event_type"], "cop.snapshot");
        assert_eq!(v["payload"]["tracks"], json!({}));
        assert!(service.tracks().is_empty());
        assert!(!service.paused());
    }

    #[test]
    fn aging_tick_broadcasts_transitions() {
        let service = CopService::new(CopConfig::default());
        service.ingest(track_env("T-1")).unwrap();
        let (_id, mut rx, _snap) = service.attach_subscriber();

        let base = service.tracks()[0].last_update_ts;
        service.aging_tick_at(base + 7.0);
        let v: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(v["event_type"], "cop.track");
        assert_eq!(v["payload"]["status"], "STALE");

        service.aging_tick_at(base + 20.0);
        let v: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(v["payload"]["status"], "DEAD");
        assert!(service.tracks().is_empty());
    }

    #[test]
    fn idempotent_track_replay() {
        let service = CopService::new(CopConfig::default());
        let env = track_env("T-1");
        service.ingest(env.clone()).unwrap();
        let first = service.tracks();
        service.ingest(env).unwrap();
        let second = service.tracks();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].extra, second[0].extra);
        assert_eq!(first[0].status, second[0].status);
    }
}
