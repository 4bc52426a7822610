//! Threat scoring.
//!
//! Two independent formulas live here: the radar-kinematics rule scoring
//! used by the fusion engine ([`score`]) and the geo-zone variant the COP
//! server applies during aging ([`zone`]). They use different inputs and
//! different scales; do not unify them.

pub mod score;
pub mod zone;

pub use score::{
    assess, assess_boosted, Assessment, RecommendedAction, ThreatLevel, RULE_MULTI_SENSOR,
};
pub use zone::{compute_zone_threat, haversine_m, ZoneCircle, ZoneScoringConfig};
