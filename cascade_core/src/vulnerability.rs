use std::collections::BTreeMap;

use cascade_schema::FactionId;

const STRATEGIC_WEIGHT: f64 = 0.3;
const CONNECTIVITY_WEIGHT: f64 = 0.25;
const DISCIPLINE_WEIGHT: f64 = 0.25;
const DISPERSION_WEIGHT: f64 = 0.2;

/// Dispersion used when a controlled territory has no influence records.
const UNRECORDED_CONTROLLED_DISPERSION: f64 = 0.5;

/// How far a territory is from being commanded by a single faction, in [0, 1].
///
/// The leading faction's share is taken against the larger of the recorded
/// total and 100, so a lone faction at 10% still reads as a weak hold.
pub fn influence_dispersion(
    influence: &BTreeMap<FactionId, f64>,
    controller: Option<FactionId>,
) -> f64 {
    let total: f64 = influence.values().sum();
    if total <= 0.0 {
        return if controller.is_some() {
            UNRECORDED_CONTROLLED_DISPERSION
        } else {
            1.0
        };
    }
    let leading = influence.values().copied().fold(0.0_f64, f64::max);
    (1.0 - leading / total.max(100.0)).clamp(0.0, 1.0)
}

pub fn vulnerability_score(
    strategic_value: u8,
    connectivity: f64,
    controller_discipline: f64,
    dispersion: f64,
) -> f64 {
    let value_term = 1.0 - f64::from(strategic_value) / 10.0;
    let score = STRATEGIC_WEIGHT * value_term
        + CONNECTIVITY_WEIGHT * (1.0 - connectivity)
        + DISCIPLINE_WEIGHT * (1.0 - controller_discipline)
        + DISPERSION_WEIGHT * dispersion;
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
