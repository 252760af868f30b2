//! Economic and strategic consequences of a propagated cascade.

use crate::config::CascadeTypeProfile;
use crate::network::NetworkNode;

const SOURCE_ECONOMIC_WEIGHT: f64 = 0.3;
const AFFECTED_ECONOMIC_WEIGHT: f64 = 0.1;
const DELTA_SCALE: f64 = 0.2;
const MAX_STRATEGIC_DELTA: f64 = 2.0;
const MIN_DURATION_HOURS: f64 = 0.25;

/// `base + source×0.3 + Σ affected×0.1×type multiplier`.
pub fn economic_impact_multiplier<'a>(
    base: f64,
    profile: &CascadeTypeProfile,
    source: &NetworkNode,
    affected: impl IntoIterator<Item = &'a NetworkNode>,
) -> f64 {
    let affected_total: f64 = affected
        .into_iter()
        .map(|node| node.economic_importance)
        .sum();
    base + source.economic_importance * SOURCE_ECONOMIC_WEIGHT
        + affected_total * AFFECTED_ECONOMIC_WEIGHT * profile.impact_multiplier
}

pub fn strategic_delta(magnitude: f64, vulnerability: f64, profile: &CascadeTypeProfile) -> f64 {
    let delta = magnitude * vulnerability * DELTA_SCALE * profile.strategic_factor;
    if delta.is_finite() {
        delta.clamp(-MAX_STRATEGIC_DELTA, MAX_STRATEGIC_DELTA)
    } else {
        0.0
    }
}

/// Hours until the cascade plays out. Grows with magnitude and
/// logarithmically with the number of affected territories.
pub fn estimated_duration_hours(
    profile: &CascadeTypeProfile,
    magnitude: f64,
    affected_count: usize,
) -> f64 {
    let spread = (1.0 + affected_count as f64).log2();
    let hours = profile.base_duration_hours * (0.5 + 0.5 * magnitude) * spread;
    hours.max(MIN_DURATION_HOURS)
}
