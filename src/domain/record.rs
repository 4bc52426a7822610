//! Server-side COP records: tracks, threats, and the full-state snapshot.
//!
//! A COP track is a different entity from the fusion engine's track, even
//! though they share the conceptual key: the server shallow-merges whatever
//! fields arrive, owns the lifecycle status, and ages records out. Unknown
//! historical fields must survive every merge, so both record types keep a
//! flattened map of everything beyond the server-owned fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Convert a timestamp to fractional epoch seconds (the wire format for
/// `last_update_ts`, matching `time.time()`-style producers).
pub fn epoch_secs(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_millis() as f64 / 1000.0
}

/// Lifecycle status of a COP track.
///
/// Monotonic per aging pass (`LIVE → STALE → DEAD → removed`); only a fresh
/// ingest resets a track back to `LIVE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackStatus {
    /// Recently updated.
    Live,
    /// No update for at least the stale TTL.
    Stale,
    /// No update for at least the dead TTL; removed on the same tick.
    Dead,
}

impl Default for TrackStatus {
    fn default() -> Self {
        Self::Live
    }
}

impl TrackStatus {
    /// Status implied by a track's age under the given TTLs.
    pub fn from_age(age_sec: f64, stale_ttl_s: f64, dead_ttl_s: f64) -> Self {
        if age_sec >= dead_ttl_s {
            Self::Dead
        } else if age_sec >= stale_ttl_s {
            Self::Stale
        } else {
            Self::Live
        }
    }
}

/// Keys the server owns on a track record; never absorbed from payloads.
const TRACK_RESERVED: [&str; 4] = ["id", "last_update_ts", "age_sec", "status"];

/// Authoritative COP track record.
///
/// `extra` flattens onto the wire object, so a record serializes exactly as
/// the merged payload dict plus the four server-owned fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Track identity.
    #[serde(default)]
    pub id: String,
    /// Lifecycle status.
    #[serde(default)]
    pub status: TrackStatus,
    /// Epoch seconds of the last ingest for this id (not touched by aging).
    #[serde(default)]
    pub last_update_ts: f64,
    /// Seconds since `last_update_ts`, as of the last aging tick.
    #[serde(default)]
    pub age_sec: f64,
    /// Every other field ever received for this track.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrackRecord {
    /// Fresh record for an id that has never been seen.
    pub fn new(id: impl Into<String>, now: f64) -> Self {
        Self {
            id: id.into(),
            status: TrackStatus::Live,
            last_update_ts: now,
            age_sec: 0.0,
            extra: Map::new(),
        }
    }

    /// Shallow-merge an ingested payload into this record.
    ///
    /// Unknown historical fields are preserved; the server-owned fields are
    /// forced: `last_update_ts = now`, `age_sec = 0`, `status = LIVE`.
    pub fn absorb(&mut self, payload: &Map<String, Value>, now: f64) {
        for (k, v) in payload {
            if TRACK_RESERVED.contains(&k.as_str()) {
                continue;
            }
            self.extra.insert(k.clone(), v.clone());
        }
        self.last_update_ts = now;
        self.age_sec = 0.0;
        self.status = TrackStatus::Live;
    }

    /// Read a numeric field from the merged payload (used by zone scoring).
    pub fn number_field(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }
}

/// Authoritative COP threat record: an id plus whatever assessment fields
/// have been merged for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatRecord {
    /// Track identity the assessment applies to.
    #[serde(default)]
    pub id: String,
    /// Merged assessment fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThreatRecord {
    /// Fresh record for an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: Map::new(),
        }
    }

    /// Shallow-merge an ingested payload by id.
    pub fn absorb(&mut self, payload: &Map<String, Value>) {
        for (k, v) in payload {
            if k == "id" {
                continue;
            }
            self.extra.insert(k.clone(), v.clone());
        }
    }

    /// Read a numeric field from the merged payload.
    pub fn number_field(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }

    /// Read a string-array field from the merged payload; absent or
    /// non-array values read as empty.
    pub fn string_list_field(&self, key: &str) -> Vec<String> {
        self.extra
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Full point-in-time dump of COP state, used to synchronize a subscriber or
/// reestablish a consistent baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPayload {
    /// Known agents and their metadata.
    #[serde(default)]
    pub agents: Map<String, Value>,
    /// All current tracks, keyed by id.
    #[serde(default)]
    pub tracks: BTreeMap<String, TrackRecord>,
    /// All current threats, keyed by id.
    #[serde(default)]
    pub threats: BTreeMap<String, ThreatRecord>,
    /// Whether the pause gate is closed.
    #[serde(default)]
    pub paused: bool,
}
