//! Track lifecycle aging and the background tick supervisor.
//!
//! Every tick recomputes each track's age from its `last_update_ts` and
//! walks the LIVE -> STALE -> DEAD ladder. Transitions broadcast a
//! normalized `cop.track`; a track reaching DEAD is removed on the same
//! tick, after its final notification. When a geo-zone is configured the
//! tick also re-scores every track with the server-side variant and merges
//! changed scores as `cop.threat` records.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info};

use crate::cop::service::CopService;
use crate::cop::store::CopState;
use crate::domain::{EventEnvelope, EventKind, TrackStatus};
use crate::threat::{compute_zone_threat, ZoneScoringConfig};

/// Run one aging pass over the state at time `now` (epoch seconds).
///
/// Returns the envelopes to broadcast. No-op while paused.
pub fn age_tracks(state: &mut CopState, now: f64) -> Vec<EventEnvelope> {
    if state.paused {
        return Vec::new();
    }

    let mut transitions = Vec::new();
    let mut dead: Vec<String> = Vec::new();

    for (id, track) in state.tracks.iter_mut() {
        let age = (now - track.last_update_ts).max(0.0);
        track.age_sec = age;
        let next = TrackStatus::from_age(age, state.config.stale_ttl_s, state.config.dead_ttl_s);
        if next != track.status {
            track.status = next;
            debug!(track = %id, status = ?next, age_sec = age, "track status transition");
            transitions.push(EventEnvelope::new(
                EventKind::CopTrack,
                crate::domain::EventSource::cop_server(),
                "unknown",
                json!(track.clone()),
            ));
        }
        if next == TrackStatus::Dead {
            dead.push(id.clone());
        }
    }
    for envelope in &transitions {
        state.push_tail(envelope);
    }

    let mut out = transitions;
    if state.config.zone.is_some() {
        out.extend(rescore_zone_threats(state, now));
    }

    for id in dead {
        state.tracks.remove(&id);
        // The final cop.threat for a dead track is score 0; the record goes
        // with the track so the picture does not accumulate ghosts.
        state.threats.remove(&id);
        info!(track = %id, "dead track removed");
    }
    out
}

/// Re-run the geo-zone scoring variant over all tracks, merging records whose
/// score or reasons changed.
fn rescore_zone_threats(state: &mut CopState, now: f64) -> Vec<EventEnvelope> {
    let cfg = ZoneScoringConfig {
        zone: state.config.zone.clone(),
        stale_ttl_s: state.config.stale_ttl_s,
        speed_max_mps: state.config.speed_max_mps,
    };
    let mut updates: Vec<(String, u32, Vec<String>)> = Vec::new();
    for (id, track) in &state.tracks {
        let (score, reasons) = compute_zone_threat(track, now, &cfg);
        let changed = match state.threats.get(id) {
            Some(existing) => {
                existing.number_field("score") != Some(f64::from(score))
                    || existing.string_list_field("reasons") != reasons
            }
            None => true,
        };
        if changed {
            updates.push((id.clone(), score, reasons));
        }
    }

    let mut out = Vec::new();
    for (id, score, reasons) in updates {
        let payload = json!({
            "id": id,
            "score": score,
            "reasons": reasons,
            "scored_at": now,
        });
        let envelope = EventEnvelope::new(
            EventKind::CopThreat,
            crate::domain::EventSource::cop_server(),
            "unknown",
            payload,
        );
        // Merge through the normal threat path so the record shape matches
        // externally ingested cop.threat events.
        out.extend(state.apply(envelope, now));
    }
    out
}

/// Spawn the background aging loop for a service.
pub fn spawn_aging_supervisor(service: Arc<CopService>) {
    let tick = service.config().aging_tick.max(Duration::from_millis(100));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            service.aging_tick();
        }
    });
}
