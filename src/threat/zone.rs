//! Server-side geo-zone threat scoring.
//!
//! A distinct formula from [`super::score`]: it weighs freshness, speed, and
//! violation of a configured circular zone, and modulates by lifecycle status.
//! Applied by the COP server during aging ticks; never by the fusion engine.

use serde::{Deserialize, Serialize};

use crate::domain::record::{TrackRecord, TrackStatus};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A circular geo-zone (great-circle radius).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneCircle {
    /// Zone center latitude in degrees.
    pub lat: f64,
    /// Zone center longitude in degrees.
    pub lon: f64,
    /// Zone radius in meters.
    pub radius_m: f64,
}

impl ZoneCircle {
    /// Whether a position lies within the zone.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        haversine_m(lat, lon, self.lat, self.lon) <= self.radius_m
    }
}

/// Inputs to the zone-scoring pass.
#[derive(Debug, Clone)]
pub struct ZoneScoringConfig {
    /// The watched zone, if any.
    pub zone: Option<ZoneCircle>,
    /// Freshness horizon: age at which the recency contribution reaches zero.
    pub stale_ttl_s: f64,
    /// Speed normalization ceiling in m/s.
    pub speed_max_mps: f64,
}

/// Great-circle distance between two lat/lon points, in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Rule-based zone threat score for one track, [0, 100], plus reason tags.
///
/// Contributions:
/// - recency: up to +10, linear from age 0 to the stale TTL (+2 flat when the
///   track carries no usable update timestamp)
/// - speed: up to +20, normalized by `speed_max_mps`; "fast" at >= 8 m/s
/// - zone violation: +60 when inside the configured circle
/// - STALE status scales the total by 0.6; DEAD forces 0 with reason "dead"
pub fn compute_zone_threat(
    track: &TrackRecord,
    now_ts: f64,
    cfg: &ZoneScoringConfig,
) -> (u32, Vec<String>) {
    let mut reasons: Vec<String> = Vec::new();
    let mut score: f64 = 0.0;

    if track.last_update_ts > 0.0 {
        let age = (now_ts - track.last_update_ts).max(0.0);
        let freshness = (1.0 - age / cfg.stale_ttl_s.max(0.001)).clamp(0.0, 1.0);
        score += 10.0 * freshness;
    } else {
        score += 2.0;
    }

    if let Some(speed) = track.number_field("speed_mps") {
        let sp = speed.max(0.0);
        let s_norm = (sp / cfg.speed_max_mps.max(0.001)).clamp(0.0, 1.0);
        score += 20.0 * s_norm;
        if sp >= 8.0 {
            reasons.push("fast".to_string());
        }
    }

    if let Some(zone) = &cfg.zone {
        if let (Some(lat), Some(lon)) = (track.number_field("lat"), track.number_field("lon")) {
            if zone.contains(lat, lon) {
                score += 60.0;
                reasons.push("zone_violation".to_string());
            }
        }
    }

    match track.status {
        TrackStatus::Stale => {
            score *= 0.6;
            reasons.push("stale".to_string());
        }
        TrackStatus::Dead => {
            score = 0.0;
            reasons = vec!["dead".to_string()];
        }
        TrackStatus::Live => {}
    }

    (score.clamp(0.0, 100.0).round() as u32, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn track_at(lat: f64, lon: f64, speed: f64, now: f64) -> TrackRecord {
        let mut rec = TrackRecord::new("T-1", now);
        rec.absorb(
            json!({"lat": lat, "lon": lon, "speed_mps": speed})
                .as_object()
                .unwrap(),
            now,
        );
        rec
    }

    fn cfg() -> ZoneScoringConfig {
        ZoneScoringConfig {
            zone: Some(ZoneCircle {
                lat: 41.0,
                lon: 29.0,
                radius_m: 1000.0,
            }),
            stale_ttl_s: 10.0,
            speed_max_mps: 25.0,
        }
    }

    #[test]
    fn test_haversine_sanity() {
        assert!(haversine_m(41.0, 29.0, 41.0, 29.0) < 1.0);
        // One degree of latitude is roughly 111 km.
        let d = haversine_m(41.0, 29.0, 42.0, 29.0);
        assert!((d - 111_000.0).abs() < 2_000.0, "got {d}");
    }

    #[test]
    fn test_zone_violation_dominates() {
        let now = 1000.0;
        let inside = track_at(41.001, 29.0, 0.0, now);
        let outside = track_at(41.5, 29.0, 0.0, now);

        let (s_in, r_in) = compute_zone_threat(&inside, now, &cfg());
        let (s_out, r_out) = compute_zone_threat(&outside, now, &cfg());

        assert!(r_in.contains(&"zone_violation".to_string()));
        assert!(!r_out.contains(&"zone_violation".to_string()));
        assert!(s_in >= s_out + 60);
    }

    #[test]
    fn test_fresh_fast_track_in_zone() {
        let now = 1000.0;
        let track = track_at(41.0, 29.0, 25.0, now);
        let (score, reasons) = compute_zone_threat(&track, now, &cfg());
        // 10 freshness + 20 speed + 60 zone.
        assert_eq!(score, 90);
        assert!(reasons.contains(&"fast".to_string()));
        assert!(reasons.contains(&"zone_violation".to_string()));
    }

    #[test]
    fn test_stale_scales_down() {
        let now = 1000.0;
        let mut track = track_at(41.0, 29.0, 25.0, now - 20.0);
        track.status = TrackStatus::Stale;
        let (score, reasons) = compute_zone_threat(&track, now, &cfg());
        // Freshness 0 at age 20; (0 + 20 + 60) * 0.6 = 48.
        assert_eq!(score, 48);
        assert!(reasons.contains(&"stale".to_string()));
    }

    #[test]
    fn test_dead_forces_zero() {
        let now = 1000.0;
        let mut track = track_at(41.0, 29.0, 25.0, now);
        track.status = TrackStatus::Dead;
        let (score, reasons) = compute_zone_threat(&track, now, &cfg());
        assert_eq!(score, 0);
        assert_eq!(reasons, vec!["dead".to_string()]);
    }

    #[test]
    fn test_no_zone_configured() {
        let now = 1000.0;
        let track = track_at(41.0, 29.0, 0.0, now);
        let cfg = ZoneScoringConfig {
            zone: None,
            ..cfg()
        };
        let (score, reasons) = compute_zone_threat(&track, now, &cfg);
        assert_eq!(score, 10); // freshness only
        assert!(reasons.is_empty());
    }
}
