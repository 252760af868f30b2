use bitflags::bitflags;
use cascade_schema::{CascadeTrigger, CascadeType};

use crate::network::NetworkNode;

const HIGH_VALUE_THRESHOLD: u8 = 8;
const HUB_CONNECTIVITY_THRESHOLD: f64 = 0.6;
const RETREAT_DISCIPLINE_THRESHOLD: f64 = 0.6;

bitflags! {
    /// Set of cascade archetypes plausible for one request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CascadeTypeSet: u8 {
        const INFLUENCE_PROPAGATION = 1 << 0;
        const DEFENSIVE_COLLAPSE = 1 << 1;
        const ECONOMIC_DISRUPTION = 1 << 2;
        const STRATEGIC_REALIGNMENT = 1 << 3;
        const FACTION_RETREAT = 1 << 4;
        const SUPPLY_LINE_BREAKDOWN = 1 << 5;
    }
}

impl CascadeTypeSet {
    pub fn of(kind: CascadeType) -> Self {
        match kind {
            CascadeType::InfluencePropagation => Self::INFLUENCE_PROPAGATION,
            CascadeType::DefensiveCollapse => Self::DEFENSIVE_COLLAPSE,
            CascadeType::EconomicDisruption => Self::ECONOMIC_DISRUPTION,
            CascadeType::StrategicRealignment => Self::STRATEGIC_REALIGNMENT,
            CascadeType::FactionRetreat => Self::FACTION_RETREAT,
            CascadeType::SupplyLineBreakdown => Self::SUPPLY_LINE_BREAKDOWN,
        }
    }

    /// Members in declaration order.
    pub fn kinds(self) -> impl Iterator<Item = CascadeType> {
        CascadeType::ALL
            .into_iter()
            .filter(move |kind| self.contains(Self::of(*kind)))
    }
}

/// Cascade archetypes a loss at `source` can start under `trigger`.
pub fn classify(source: &NetworkNode, trigger: CascadeTrigger) -> CascadeTypeSet {
    let mut kinds = CascadeTypeSet::empty();
    if source.strategic_value >= HIGH_VALUE_THRESHOLD {
        kinds |= CascadeTypeSet::INFLUENCE_PROPAGATION
            | CascadeTypeSet::ECONOMIC_DISRUPTION
            | CascadeTypeSet::STRATEGIC_REALIGNMENT;
    }
    if source.connectivity > HUB_CONNECTIVITY_THRESHOLD {
        kinds |= CascadeTypeSet::DEFENSIVE_COLLAPSE;
    }
    if trigger == CascadeTrigger::TerritoryLoss
        && source.controller_discipline < RETREAT_DISCIPLINE_THRESHOLD
    {
        kinds |= CascadeTypeSet::FACTION_RETREAT;
    }
    if trigger == CascadeTrigger::StrategicNodeLoss {
        kinds |= CascadeTypeSet::SUPPLY_LINE_BREAKDOWN;
    }
    kinds
}

/// Caller magnitude with non-finite and negative input treated as zero.
pub fn sanitize_magnitude(magnitude: f64) -> f64 {
    if magnitude.is_finite() {
        magnitude.max(0.0)
    } else {
        0.0
    }
}

/// Magnitude as used by probability math: sanitized, then capped.
pub fn effective_magnitude(magnitude: f64, cap: f64) -> f64 {
    sanitize_magnitude(magnitude).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centrality::CentralityMetrics;
    use cascade_schema::TerritoryId;
    use std::collections::BTreeMap;

    fn node(strategic_value: u8, connectivity: f64, discipline: f64) -> NetworkNode {
        NetworkNode {
            id: TerritoryId(1),
            name: "Source".to_string(),
            strategic_value,
            controller: None,
            influence: BTreeMap::new(),
            position: (0.0, 0.0),
            contested: false,
            category: None,
            controller_discipline: discipline,
            influence_dispersion: 0.5,
            connectivity,
            centrality: CentralityMetrics::default(),
            vulnerability: 0.5,
            economic_importance: 0.5,
        }
    }

    #[test]
    fn high_value_source_opens_three_archetypes() {
        let kinds = classify(&node(9, 0.2, 0.9), CascadeTrigger::InfluenceThreshold);
        assert_eq!(
            kinds.kinds().collect::<Vec<_>>(),
            vec![
                CascadeType::InfluencePropagation,
                CascadeType::EconomicDisruption,
                CascadeType::StrategicRealignment,
            ]
        );
    }

    #[test]
    fn hub_and_trigger_rules() {
        let kinds = classify(&node(3, 0.7, 0.4), CascadeTrigger::TerritoryLoss);
        assert_eq!(
            kinds,
            CascadeTypeSet::DEFENSIVE_COLLAPSE | CascadeTypeSet::FACTION_RETREAT
        );

        let kinds = classify(&node(3, 0.2, 0.9), CascadeTrigger::StrategicNodeLoss);
        assert_eq!(kinds, CascadeTypeSet::SUPPLY_LINE_BREAKDOWN);
    }

    #[test]
    fn disciplined_low_value_source_classifies_nothing() {
        let kinds = classify(&node(4, 0.6, 0.6), CascadeTrigger::TerritoryLoss);
        assert!(kinds.is_empty());
        assert_eq!(kinds.kinds().count(), 0);
    }

    #[test]
    fn magnitude_is_sanitized_and_capped() {
        assert_eq!(effective_magnitude(3.5, 2.0), 2.0);
        assert_eq!(effective_magnitude(-1.0, 2.0), 0.0);
        assert_eq!(effective_magnitude(f64::NAN, 2.0), 0.0);
        assert_eq!(sanitize_magnitude(3.5), 3.5);
    }
}
