//! # Skywatch
//!
//! A small real-time sensor-fusion and dissemination pipeline: radar and RF
//! detections are correlated into persistent target tracks, each track is
//! scored for threat, and the resulting common operational picture (COP) is
//! pushed to any number of live viewers with snapshot-on-connect consistency.
//!
//! ## Architecture
//!
//! ```text
//! detections ──► TrackAssociator ──► threat scoring ──► event envelopes
//!                                                             │
//!                                                     POST /api/ingest
//!                                                             │
//!                                     pause gate ── CopState ──► BroadcastHub ──► /ws
//!                                                      ▲
//!                                               aging supervisor
//! ```
//!
//! The two non-trivial subsystems are [`fusion`] (gated nearest-match
//! association under noisy measurements) and [`cop`] (the authoritative
//! live-track state with TTL aging, pause/buffer/resume, and ordered fan-out).
//! Everything else is boundary plumbing.

#![warn(missing_docs)]

pub mod api;
pub mod cop;
pub mod domain;
pub mod fusion;
pub mod hub;
pub mod threat;

pub use cop::service::{CopService, IngestOutcome, PauseStatus};
pub use domain::envelope::{EventEnvelope, EventKind, EventSource};
pub use domain::record::{SnapshotPayload, ThreatRecord, TrackRecord, TrackStatus};
pub use fusion::associator::{FusionConfig, TrackAssociator};
pub use hub::BroadcastHub;
pub use threat::zone::ZoneCircle;

use std::time::Duration;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for COP operations.
pub type Result<T> = std::result::Result<T, CopError>;

/// Unified error type for the fusion/COP core.
#[derive(Debug, thiserror::Error)]
pub enum CopError {
    /// An ingested envelope is missing a field the core requires.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// An ingested payload has the wrong shape for its event type.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// JSON encode/decode failure.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the COP server and the embedded fusion engine.
#[derive(Debug, Clone)]
pub struct CopConfig {
    /// Maximum angular distance (degrees) for RF-to-track association.
    pub bearing_gate_deg: f64,
    /// Maximum range discrepancy (meters) for association. Parsed and carried
    /// for parity with deployments that range-gate; the v0 bucket scheme does
    /// not consume it.
    pub range_gate_m: f64,
    /// Track age (seconds) at which status becomes STALE.
    pub stale_ttl_s: f64,
    /// Track age (seconds) at which status becomes DEAD and the track is removed.
    pub dead_ttl_s: f64,
    /// Interval between aging ticks.
    pub aging_tick: Duration,
    /// Maximum number of events kept in the debug tail.
    pub events_tail_max: usize,
    /// Maximum number of events buffered while paused.
    pub pause_buffer_max: usize,
    /// Optional circular geo-zone for server-side threat scoring.
    pub zone: Option<ZoneCircle>,
    /// Speed normalization ceiling (m/s) for zone scoring.
    pub speed_max_mps: f64,
}

impl Default for CopConfig {
    fn default() -> Self {
        Self {
            bearing_gate_deg: 12.0,
            range_gate_m: 250.0,
            stale_ttl_s: 5.0,
            dead_ttl_s: 15.0,
            aging_tick: Duration::from_secs(1),
            events_tail_max: 1000,
            pause_buffer_max: 1000,
            zone: None,
            speed_max_mps: 25.0,
        }
    }
}

impl CopConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CopConfigBuilder {
        CopConfigBuilder::default()
    }
}

/// Builder for [`CopConfig`].
#[derive(Debug, Default)]
pub struct CopConfigBuilder {
    config: CopConfig,
}

impl CopConfigBuilder {
    /// Set the RF bearing gate in degrees.
    pub fn bearing_gate_deg(mut self, deg: f64) -> Self {
        self.config.bearing_gate_deg = deg.max(0.0);
        self
    }

    /// Set the range gate in meters.
    pub fn range_gate_m(mut self, m: f64) -> Self {
        self.config.range_gate_m = m.max(0.0);
        self
    }

    /// Set the stale TTL in seconds.
    pub fn stale_ttl_s(mut self, s: f64) -> Self {
        self.config.stale_ttl_s = s.max(0.0);
        self
    }

    /// Set the dead TTL in seconds. Clamped to at least the stale TTL at build.
    pub fn dead_ttl_s(mut self, s: f64) -> Self {
        self.config.dead_ttl_s = s.max(0.0);
        self
    }

    /// Set the aging tick interval.
    pub fn aging_tick(mut self, interval: Duration) -> Self {
        self.config.aging_tick = interval.max(Duration::from_millis(10));
        self
    }

    /// Set the debug tail capacity.
    pub fn events_tail_max(mut self, cap: usize) -> Self {
        self.config.events_tail_max = cap.max(1);
        self
    }

    /// Set the pause buffer capacity.
    pub fn pause_buffer_max(mut self, cap: usize) -> Self {
        self.config.pause_buffer_max = cap.max(1);
        self
    }

    /// Configure a circular geo-zone for server-side threat scoring.
    pub fn zone(mut self, zone: ZoneCircle) -> Self {
        self.config.zone = Some(zone);
        self
    }

    /// Set the speed normalization ceiling for zone scoring.
    pub fn speed_max_mps(mut self, mps: f64) -> Self {
        self.config.speed_max_mps = mps.max(0.001);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> CopConfig {
        let mut config = self.config;
        config.dead_ttl_s = config.dead_ttl_s.max(config.stale_ttl_s);
        config
    }
}
