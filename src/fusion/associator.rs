//! Multi-sensor track association.
//!
//! Radar detections anchor tracks: the track identity is derived from a
//! coarse range/azimuth bucket, so repeated detections of the same target
//! land on the same id without a motion model. RF detections carry no
//! range, so they are associated to the nearest existing track by bearing,
//! within a configurable gate. A track is CONFIRMED once two distinct
//! sensor kinds have supported it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use crate::domain::{
    Classification, EventEnvelope, EventKind, EventSource, Kinematics, RadarScanPayload,
    RfScanPayload, ThreatAssessmentPayload, TrackUpdatePayload,
};
use crate::threat::{assess_boosted, RULE_MULTI_SENSOR};

/// Tuning knobs for the associator.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Maximum bearing error, in degrees, for an RF detection to match a track.
    pub bearing_gate_deg: f64,
    /// Range gate in metres. Parsed and logged, not used by bucketed
    /// association (there is no predicted range to gate against).
    pub range_gate_m: f64,
    /// Hard cap on stored evidence notes per track.
    pub evidence_cap: usize,
    /// Number of trailing evidence notes emitted in track updates.
    pub evidence_emit: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            bearing_gate_deg: 12.0,
            range_gate_m: 250.0,
            evidence_cap: 32,
            evidence_emit: 6,
        }
    }
}

/// Sensor modality that contributed to a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SensorKind {
    /// Active radar return with range and azimuth.
    Radar,
    /// Passive RF bearing line.
    Rf,
}

impl SensorKind {
    /// Wire label for this sensor kind.
    pub fn as_str(self) -> &'static str {
        match self {
            SensorKind::Radar => "RADAR",
            SensorKind::Rf => "RF",
        }
    }
}

/// Internal fused-track state.
#[derive(Debug, Clone)]
pub struct FusedTrack {
    /// Bucketed identity, stable across detections of the same target.
    pub track_id: String,
    /// Timestamp of the most recent supporting detection.
    pub last_timestamp: DateTime<Utc>,
    /// Latest radar range, metres.
    pub range_m: f64,
    /// Latest radar azimuth, degrees.
    pub az_deg: f64,
    /// Latest radar elevation, degrees.
    pub el_deg: f64,
    /// Latest radial velocity, m/s (negative = closing).
    pub radial_velocity_mps: f64,
    /// Hit count per contributing sensor kind.
    pub supporting_sensors: BTreeMap<SensorKind, u32>,
    /// Bounded log of human-readable association notes.
    pub evidence: Vec<String>,
}

impl FusedTrack {
    fn new(track_id: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            track_id,
            last_timestamp: timestamp,
            range_m: 0.0,
            az_deg: 0.0,
            el_deg: 0.0,
            radial_velocity_mps: 0.0,
            supporting_sensors: BTreeMap::new(),
            evidence: Vec::new(),
        }
    }

    /// True once at least two distinct sensor kinds have supported the track.
    pub fn is_confirmed(&self) -> bool {
        self.supporting_sensors.len() >= 2
    }

    fn touch(&mut self, kind: SensorKind, timestamp: DateTime<Utc>, note: String, cap: usize) {
        *self.supporting_sensors.entry(kind).or_insert(0) += 1;
        self.last_timestamp = timestamp;
        self.evidence.push(note);
        if self.evidence.len() > cap {
            let excess = self.evidence.len() - cap;
            self.evidence.drain(..excess);
        }
    }
}

/// Wrap an angle in degrees to `[-180, 180)`.
pub fn wrap_deg(deg: f64) -> f64 {
    let mut d = (deg + 180.0) % 360.0;
    if d < 0.0 {
        d += 360.0;
    }
    d - 180.0
}

/// Smallest absolute angular separation between two bearings, degrees.
pub fn ang_diff_deg(a: f64, b: f64) -> f64 {
    wrap_deg(a - b).abs()
}

/// Bucketed track identity: 100 m range bins, 10 degree azimuth bins.
pub fn make_track_id(range_m: f64, az_deg: f64) -> String {
    let r_bin = (range_m / 100.0).floor() as i64;
    let a_bin = ((wrap_deg(az_deg) + 180.0) / 10.0).floor() as i64;
    format!("T-R{:03}-A{:03}", r_bin, a_bin)
}

/// Stateful radar/RF associator.
///
/// Feed it sensor envelopes through [`TrackAssociator::observe`]; it returns
/// the `track.update` and `threat.assessment` envelopes the observation
/// produced, if any.
#[derive(Debug)]
pub struct TrackAssociator {
    tracks: BTreeMap<String, FusedTrack>,
    config: FusionConfig,
    source: EventSource,
}

impl Default for TrackAssociator {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

impl TrackAssociator {
    /// Create an associator with the given config and the default fuser source.
    pub fn new(config: FusionConfig) -> Self {
        Self::with_source(config, EventSource::fuser())
    }

    /// Create an associator that stamps emitted envelopes with `source`.
    pub fn with_source(config: FusionConfig, source: EventSource) -> Self {
        Self {
            tracks: BTreeMap::new(),
            config,
            source,
        }
    }

    /// Number of tracks currently held.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Read access to a fused track by id.
    pub fn track(&self, id: &str) -> Option<&FusedTrack> {
        self.tracks.get(id)
    }

    /// Iterate all fused tracks in id order.
    pub fn tracks(&self) -> impl Iterator<Item = &FusedTrack> {
        self.tracks.values()
    }

    /// Drop all track state.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Process one sensor envelope, returning any emitted envelopes.
    ///
    /// Radar scans update or create tracks and emit nothing. RF scans that
    /// associate within the bearing gate emit a `track.update`, plus a
    /// `threat.assessment` when the track is confirmed. Non-sensor events
    /// and malformed payloads are ignored.
    pub fn observe(&mut self, envelope: &EventEnvelope) -> Vec<EventEnvelope> {
        match envelope.event_type {
            EventKind::RadarDetection => {
                self.observe_radar(envelope);
                Vec::new()
            }
            EventKind::RfDetection => self.observe_rf(envelope),
            _ => Vec::new(),
        }
    }

    fn observe_radar(&mut self, envelope: &EventEnvelope) {
        let scan: RadarScanPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(scan) => scan,
            Err(err) => {
                debug!(error = %err, "dropping malformed radar scan");
                return;
            }
        };
        for det in &scan.detections {
            let (range_m, az_deg) = match (det.range_m, det.az_deg) {
                (Some(r), Some(a)) => (r, a),
                _ => continue,
            };
            let el_deg = det.el_deg.unwrap_or(0.0);
            let radial_velocity_mps = det.radial_velocity_mps.unwrap_or(0.0);
            let id = make_track_id(range_m, az_deg);
            let track = self
                .tracks
                .entry(id.clone())
                .or_insert_with(|| FusedTrack::new(id, envelope.timestamp));
            track.range_m = range_m;
            track.az_deg = az_deg;
            track.el_deg = el_deg;
            track.radial_velocity_mps = radial_velocity_mps;
            track.touch(
                SensorKind::Radar,
                envelope.timestamp,
                format!(
                    "RADAR update: r={:.1}m az={:.1}deg vr={:.1}m/s",
                    range_m, az_deg, radial_velocity_mps
                ),
                self.config.evidence_cap,
            );
        }
    }

    fn observe_rf(&mut self, envelope: &EventEnvelope) -> Vec<EventEnvelope> {
        let scan: RfScanPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(scan) => scan,
            Err(err) => {
                debug!(error = %err, "dropping malformed rf scan");
                return Vec::new();
            }
        };
        // Strongest detection wins; missing confidence sorts last.
        let best = scan
            .detections
            .iter()
            .filter(|d| d.bearing_deg.is_some())
            .max_by(|a, b| {
                let ca = a.conf.unwrap_or(0.0);
                let cb = b.conf.unwrap_or(0.0);
                ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
            });
        let det = match best {
            Some(det) => det,
            None => return Vec::new(),
        };
        let bearing = match det.bearing_deg {
            Some(b) => b,
            None => return Vec::new(),
        };
        let confidence = det.conf.unwrap_or(0.0);

        // Nearest track by bearing; strictly-less keeps ties on the lowest
        // track id since iteration is id-ordered.
        let mut best_id: Option<String> = None;
        let mut best_diff = f64::INFINITY;
        for track in self.tracks.values() {
            let diff = ang_diff_deg(bearing, track.az_deg);
            if diff < best_diff {
                best_diff = diff;
                best_id = Some(track.track_id.clone());
            }
        }
        let id = match best_id {
            Some(id) if best_diff <= self.config.bearing_gate_deg => id,
            _ => return Vec::new(),
        };

        let cap = self.config.evidence_cap;
        let emit = self.config.evidence_emit;
        let track = match self.tracks.get_mut(&id) {
            Some(track) => track,
            None => return Vec::new(),
        };
        track.touch(
            SensorKind::Rf,
            envelope.timestamp,
            format!("RF confirm: bearing={:.1}deg conf={:.2}", bearing, confidence),
            cap,
        );

        let confirmed = track.is_confirmed();
        let status = if confirmed { "CONFIRMED" } else { "TENTATIVE" };
        let evidence_tail: Vec<String> = track
            .evidence
            .iter()
            .rev()
            .take(emit)
            .rev()
            .cloned()
            .collect();
        let supporting: Vec<String> = track
            .supporting_sensors
            .keys()
            .map(|k| k.as_str().to_owned())
            .collect();

        let update = TrackUpdatePayload {
            global_track_id: track.track_id.clone(),
            status: status.to_owned(),
            kinematics: Kinematics {
                range_m: track.range_m,
                az_deg: track.az_deg,
                el_deg: track.el_deg,
                radial_velocity_mps: track.radial_velocity_mps,
            },
            classification: Classification {
                label: "drone".to_owned(),
                conf: 0.7,
            },
            supporting_sensors: supporting,
            evidence: evidence_tail,
            last_update_sources: vec![SensorKind::Rf.as_str().to_owned()],
        };

        let mut out = Vec::new();
        out.push(
            EventEnvelope::new(
                EventKind::TrackUpdate,
                self.source.clone(),
                envelope.correlation_id.clone(),
                json!(update),
            )
            .with_timestamp(envelope.timestamp),
        );

        if confirmed {
            let assessment = assess_boosted(track.range_m, track.radial_velocity_mps);
            let payload = ThreatAssessmentPayload {
                global_track_id: track.track_id.clone(),
                threat_level: assessment.level,
                score: assessment.score,
                tti_s: assessment.tti_s,
                rules_fired: vec![RULE_MULTI_SENSOR.to_owned()],
                reasons: assessment.reasons.clone(),
                recommended_action: assessment.recommended_action(),
            };
            out.push(
                EventEnvelope::new(
                    EventKind::ThreatAssessment,
                    self.source.clone(),
                    envelope.correlation_id.clone(),
                    json!(payload),
                )
                .with_timestamp(envelope.timestamp),
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn radar_env(detections: serde_json::Value) -> EventEnvelope {
        EventEnvelope::new(
            EventKind::RadarDetection,
            EventSource::default(),
            "corr-1",
            json!({
                "sensor": {"sensor_id": "radar-1", "sensor_type": "RADAR"},
                "detections": detections,
            }),
        )
    }

    fn rf_env(bearing: f64, conf: f64) -> EventEnvelope {
        EventEnvelope::new(
            EventKind::RfDetection,
            EventSource::default(),
            "corr-2",
            json!({
                "sensor": {"sensor_id": "rf-1", "sensor_type": "RF"},
                "detections": [{"bearing_deg": bearing, "conf": conf}],
            }),
        )
    }

    #[test]
    fn bucketed_ids_are_stable() {
        assert_eq!(make_track_id(450.0, 45.0), make_track_id(499.9, 49.9));
        assert_ne!(make_track_id(450.0, 45.0), make_track_id(550.0, 45.0));
        assert_ne!(make_track_id(450.0, 45.0), make_track_id(450.0, 55.0));
    }

    #[test]
    fn azimuth_wraps_before_bucketing() {
        assert_eq!(make_track_id(300.0, 185.0), make_track_id(300.0, -175.0));
        assert_eq!(wrap_deg(180.0), -180.0);
        assert_eq!(wrap_deg(-190.0), 170.0);
    }

    #[test]
    fn radar_creates_and_updates_one_track() {
        let mut assoc = TrackAssociator::default();
        let out = assoc.observe(&radar_env(json!([
            {"range_m": 450.0, "az_deg": 45.0, "radial_velocity_mps": -10.0}
        ])));
        assert!(out.is_empty());
        assert_eq!(assoc.track_count(), 1);

        assoc.observe(&radar_env(json!([
            {"range_m": 460.0, "az_deg": 46.0, "radial_velocity_mps": -12.0}
        ])));
        assert_eq!(assoc.track_count(), 1);
        let track = assoc.tracks().next().unwrap();
        assert_eq!(track.range_m, 460.0);
        assert_eq!(track.supporting_sensors[&SensorKind::Radar], 2);
        assert!(!track.is_confirmed());
    }

    #[test]
    fn rf_within_gate_confirms_and_emits() {
        let mut assoc = TrackAssociator::default();
        assoc.observe(&radar_env(json!([
            {"range_m": 450.0, "az_deg": 45.0, "radial_velocity_mps": -10.0}
        ])));
        let out = assoc.observe(&rf_env(50.0, 0.9));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].event_type, EventKind::TrackUpdate);
        assert_eq!(out[1].event_type, EventKind::ThreatAssessment);

        let update: TrackUpdatePayload = serde_json::from_value(out[0].payload.clone()).unwrap();
        assert_eq!(update.status, "CONFIRMED");
        assert_eq!(update.supporting_sensors, vec!["RADAR", "RF"]);
        assert_eq!(update.last_update_sources, vec!["RF"]);

        let threat: ThreatAssessmentPayload =
            serde_json::from_value(out[1].payload.clone()).unwrap();
        assert_eq!(threat.rules_fired, vec![RULE_MULTI_SENSOR]);
        assert!(threat.score >= 20);
    }

    #[test]
    fn rf_outside_gate_is_dropped() {
        let mut assoc = TrackAssociator::new(FusionConfig {
            bearing_gate_deg: 8.0,
            ..FusionConfig::default()
        });
        assoc.observe(&radar_env(json!([
            {"range_m": 450.0, "az_deg": 45.0}
        ])));
        let out = assoc.observe(&rf_env(55.0, 0.9));
        assert!(out.is_empty());
        assert!(!assoc.tracks().next().unwrap().is_confirmed());
    }

    #[test]
    fn repeated_single_kind_never_confirms() {
        let mut assoc = TrackAssociator::default();
        for _ in 0..5 {
            assoc.observe(&radar_env(json!([
                {"range_m": 450.0, "az_deg": 45.0}
            ])));
        }
        assert!(!assoc.tracks().next().unwrap().is_confirmed());
    }

    #[test]
    fn strongest_rf_detection_wins() {
        let mut assoc = TrackAssociator::default();
        assoc.observe(&radar_env(json!([
            {"range_m": 450.0, "az_deg": 0.0},
            {"range_m": 450.0, "az_deg": 90.0}
        ])));
        let env = EventEnvelope::new(
            EventKind::RfDetection,
            EventSource::default(),
            "corr",
            json!({
                "sensor": {"sensor_id": "rf-1", "sensor_type": "RF"},
                "detections": [
                    {"bearing_deg": 2.0, "conf": 0.3},
                    {"bearing_deg": 88.0, "conf": 0.9}
                ],
            }),
        );
        let out = assoc.observe(&env);
        let update: TrackUpdatePayload = serde_json::from_value(out[0].payload.clone()).unwrap();
        assert_eq!(update.global_track_id, make_track_id(450.0, 90.0));
    }

    #[test]
    fn detections_without_range_or_azimuth_are_skipped() {
        let mut assoc = TrackAssociator::default();
        assoc.observe(&radar_env(json!([
            {"az_deg": 45.0},
            {"range_m": 450.0},
            {"range_m": 450.0, "az_deg": 45.0}
        ])));
        assert_eq!(assoc.track_count(), 1);
    }

    #[test]
    fn evidence_is_capped() {
        let mut assoc = TrackAssociator::new(FusionConfig {
            evidence_cap: 4,
            ..FusionConfig::default()
        });
        for _ in 0..10 {
            assoc.observe(&radar_env(json!([
                {"range_m": 450.0, "az_deg": 45.0}
            ])));
        }
        let track = assoc.tracks().next().unwrap();
        assert_eq!(track.evidence.len(), 4);
        assert_eq!(track.supporting_sensors[&SensorKind::Radar], 10);
    }

    #[test]
    fn confirmed_update_emits_evidence_tail_only() {
        let mut assoc = TrackAssociator::default();
        for _ in 0..10 {
            assoc.observe(&radar_env(json!([
                {"range_m": 450.0, "az_deg": 45.0}
            ])));
        }
        let out = assoc.observe(&rf_env(45.0, 0.8));
        let update: TrackUpdatePayload = serde_json::from_value(out[0].payload.clone()).unwrap();
        assert_eq!(update.evidence.len(), 6);
        assert!(update.evidence.last().unwrap().starts_with("RF confirm"));
    }
}
