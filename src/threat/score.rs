//! Radar-kinematics rule scoring.
//!
//! Pure functions mapping range and radial velocity to a bounded score, a
//! level, and human-readable reasons. The rules are intentionally simple and
//! fixed; they are reproduced exactly, not tuned.

use serde::{Deserialize, Serialize};

/// Flat score added once a track is confirmed by >= 2 sensor kinds.
pub const MULTI_SENSOR_BOOST: u32 = 20;

/// Rule tag attached to boosted assessments.
pub const RULE_MULTI_SENSOR: &str = "MULTI_SENSOR_CONFIRMED_2PLUS";

/// Threat level derived from the bounded score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    /// Score < 50.
    Low,
    /// 50 <= score < 80.
    Medium,
    /// Score >= 80.
    High,
}

impl ThreatLevel {
    /// Level thresholds: >= 80 HIGH, >= 50 MEDIUM, else LOW.
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            Self::High
        } else if score >= 50 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

/// Operator guidance derived from the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecommendedAction {
    /// Keep watching.
    Observe,
    /// Raise an alert.
    Alert,
}

impl RecommendedAction {
    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Observe => "OBSERVE",
            Self::Alert => "ALERT",
        }
    }
}

/// Result of one scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// LOW / MEDIUM / HIGH.
    pub level: ThreatLevel,
    /// Clamped to [0, 100].
    pub score: u32,
    /// Time to intercept in seconds (rounded to 0.1), when closing.
    pub tti_s: Option<f64>,
    /// Why the rules fired.
    pub reasons: Vec<String>,
}

impl Assessment {
    /// ALERT for HIGH/MEDIUM, OBSERVE for LOW.
    pub fn recommended_action(&self) -> RecommendedAction {
        match self.level {
            ThreatLevel::High | ThreatLevel::Medium => RecommendedAction::Alert,
            ThreatLevel::Low => RecommendedAction::Observe,
        }
    }
}

/// Score a track from range and radial velocity.
///
/// Rules, applied in order:
/// - closing speed > 5 m/s: +20
/// - time-to-intercept < 60 s: +40
/// - range < 500 m: +30
pub fn assess(range_m: f64, radial_velocity_mps: f64) -> Assessment {
    let mut score: u32 = 0;
    let mut reasons = Vec::new();

    let closing = (-radial_velocity_mps).max(0.0);
    if closing > 5.0 {
        score += 20;
        reasons.push(format!("approaching (closing_speed={closing:.1} m/s)"));
    }

    let tti_s = if closing > 0.0 {
        let tti = range_m / closing;
        if tti < 60.0 {
            score += 40;
            reasons.push(format!("TTI < 60s (tti={tti:.1}s)"));
        }
        Some((tti * 10.0).round() / 10.0)
    } else {
        None
    };

    if range_m < 500.0 {
        score += 30;
        reasons.push(format!("close range ({range_m:.1}m)"));
    }

    let score = score.min(100);
    Assessment {
        level: ThreatLevel::from_score(score),
        score,
        tti_s,
        reasons,
    }
}

/// The multi-sensor-boost variant: base assessment plus a flat +20, still
/// clamped to 100.
pub fn assess_boosted(range_m: f64, radial_velocity_mps: f64) -> Assessment {
    let mut assessment = assess(range_m, radial_velocity_mps);
    assessment.score = (assessment.score + MULTI_SENSOR_BOOST).min(100);
    assessment.level = ThreatLevel::from_score(assessment.score);
    assessment
        .reasons
        .push("multi-sensor confirmed (RADAR+RF)".to_string());
    assessment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receding_target_scores_zero() {
        let a = assess(2000.0, 10.0);
        assert_eq!(a.score, 0);
        assert_eq!(a.level, ThreatLevel::Low);
        assert_eq!(a.tti_s, None);
        assert!(a.reasons.is_empty());
        assert_eq!(a.recommended_action(), RecommendedAction::Observe);
    }

    #[test]
    fn test_all_rules_fire() {
        // 400 m closing at 20 m/s: approaching (+20), tti=20s (+40), close (+30).
        let a = assess(400.0, -20.0);
        assert_eq!(a.score, 90);
        assert_eq!(a.level, ThreatLevel::High);
        assert_eq!(a.tti_s, Some(20.0));
        assert_eq!(a.reasons.len(), 3);
        assert_eq!(a.recommended_action(), RecommendedAction::Alert);
    }

    #[test]
    fn test_slow_closing_has_tti_but_no_approach_bonus() {
        // 3 m/s closing is under the approach threshold but still yields a TTI.
        let a = assess(100.0, -3.0);
        assert_eq!(a.tti_s, Some(33.3));
        // TTI < 60 (+40) and range < 500 (+30).
        assert_eq!(a.score, 70);
        assert_eq!(a.level, ThreatLevel::Medium);
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(ThreatLevel::from_score(49), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_score(50), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::from_score(79), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::from_score(80), ThreatLevel::High);
        assert_eq!(ThreatLevel::from_score(100), ThreatLevel::High);
    }

    #[test]
    fn test_boost_adds_flat_twenty_and_clamps() {
        let base = assess(400.0, -20.0);
        let boosted = assess_boosted(400.0, -20.0);
        assert_eq!(base.score, 90);
        assert_eq!(boosted.score, 100); // clamped, not 110
        assert_eq!(boosted.level, ThreatLevel::High);
        assert_eq!(boosted.reasons.len(), base.reasons.len() + 1);
    }

    #[test]
    fn test_boost_promotes_level() {
        // Distant slow approach: base 20 (approaching only), boosted 40 still LOW;
        // pick a case that crosses a threshold: base 30 (close range), boost -> 50.
        let a = assess(400.0, 0.0);
        assert_eq!(a.score, 30);
        let b = assess_boosted(400.0, 0.0);
        assert_eq!(b.score, 50);
        assert_eq!(b.level, ThreatLevel::Medium);
    }

    #[test]
    fn test_monotonic_in_closing_speed() {
        // Holding range fixed, faster closing never lowers the score.
        let mut prev = 0;
        for v in [0.0, -2.0, -6.0, -10.0, -40.0] {
            let s = assess(2000.0, v).score;
            assert!(s >= prev, "score dropped at v={v}");
            prev = s;
        }
    }

    #[test]
    fn test_monotonic_in_range() {
        // Holding closing speed fixed, shorter range never lowers the score.
        let mut prev = 0;
        for r in [5000.0, 1000.0, 499.0, 100.0] {
            let s = assess(r, -10.0).score;
            assert!(s >= prev, "score dropped at r={r}");
            prev = s;
        }
    }
}
