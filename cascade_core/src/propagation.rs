//! Bounded breadth-first cascade propagation.
//!
//! Each classified cascade type runs its own traversal from the source node.
//! A traversal carries a decaying magnitude and stops expanding a path once
//! that magnitude falls below the expansion floor or the next hop would pass
//! the type's hop cap. Reached nodes are admitted when their propagation
//! probability clears the inclusion threshold; a type that admits nobody
//! yields no event.

use std::collections::{BTreeSet, VecDeque};
use std::hash::Hasher;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use cascade_schema::{AffectedTerritory, CascadeEvent, CascadeTrigger, CascadeType, TerritoryId};
use tracing::{debug, warn};

use crate::classifier::{classify, effective_magnitude, sanitize_magnitude};
use crate::config::CascadeConfig;
use crate::error::CascadeError;
use crate::hashing::FnvHasher;
use crate::impact::{economic_impact_multiplier, estimated_duration_hours, strategic_delta};
use crate::network::{faction_relationship, NetworkNode, NodeIndex, TerritoryNetwork};

/// One single-source analysis request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeRequest {
    pub source: TerritoryId,
    pub trigger: CascadeTrigger,
    pub magnitude: f64,
    /// Request sequence number, folded into event ids.
    pub sequence: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CascadeAnalysis {
    pub events: Vec<CascadeEvent>,
    pub elapsed: Duration,
    pub budget_exceeded: bool,
}

/// A node admitted by one traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reached {
    pub node: NodeIndex,
    pub distance: u32,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    node: NodeIndex,
    distance: u32,
    magnitude: f64,
}

/// Propagation probability multiplier for a cascade type, read from the
/// target's own attributes.
pub fn type_modifier(kind: CascadeType, target: &NetworkNode) -> f64 {
    match kind {
        CascadeType::InfluencePropagation => 1.0 + 0.5 * target.influence_dispersion,
        CascadeType::DefensiveCollapse => 0.5 + f64::from(target.strategic_value) / 10.0,
        CascadeType::EconomicDisruption => 0.5 + target.economic_importance,
        CascadeType::StrategicRealignment => 0.6 + 0.8 * target.centrality.betweenness,
        CascadeType::FactionRetreat => 1.5 - target.controller_discipline,
        CascadeType::SupplyLineBreakdown => 0.5 + target.connectivity,
    }
}

pub fn propagation_probability(
    config: &CascadeConfig,
    kind: CascadeType,
    source: &NetworkNode,
    target: &NetworkNode,
    distance: u32,
    magnitude: f64,
) -> f64 {
    let decay = config.decay_rate.powi(distance as i32);
    let average_connectivity = (source.connectivity + target.connectivity) / 2.0;
    let probability = decay
        * target.vulnerability
        * average_connectivity
        * faction_relationship(source.controller, target.controller)
        * type_modifier(kind, target)
        * magnitude;
    if probability.is_finite() {
        probability.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Walk outward from `source` and return every admitted node in visit order.
pub fn propagate(
    network: &TerritoryNetwork,
    config: &CascadeConfig,
    source: NodeIndex,
    kind: CascadeType,
    magnitude: f64,
) -> Vec<Reached> {
    let max_hops = config.max_hops(kind);
    let effective = effective_magnitude(magnitude, config.magnitude_cap);
    let origin = network.node(source);

    let mut visited = vec![false; network.node_count()];
    visited[source] = true;
    let mut queue = VecDeque::from([Frontier {
        node: source,
        distance: 0,
        magnitude: sanitize_magnitude(magnitude),
    }]);
    let mut reached = Vec::new();

    while let Some(current) = queue.pop_front() {
        if current.node != source {
            let probability = propagation_probability(
                config,
                kind,
                origin,
                network.node(current.node),
                current.distance,
                effective,
            );
            if probability > config.inclusion_threshold {
                reached.push(Reached {
                    node: current.node,
                    distance: current.distance,
                    probability,
                });
            }
        }

        if current.magnitude < config.min_expansion_magnitude || current.distance + 1 > max_hops {
            continue;
        }
        let next_magnitude = current.magnitude * config.decay_rate;
        for (neighbor, _) in network.neighbors(current.node) {
            if !visited[neighbor] {
                visited[neighbor] = true;
                queue.push_back(Frontier {
                    node: neighbor,
                    distance: current.distance + 1,
                    magnitude: next_magnitude,
                });
            }
        }
    }
    reached
}

/// Probability that the cascade starts at all, from the source's own standing.
pub fn event_probability(config: &CascadeConfig, source: &NetworkNode, magnitude: f64) -> f64 {
    let base = (config.cascade_probability_base
        + 0.3 * f64::from(source.strategic_value) / 10.0
        + 0.2 * source.connectivity
        + 0.2 * source.vulnerability)
        .clamp(0.0, 1.0);
    let network_modifier =
        1.0 + source.centrality.betweenness * 0.3 + source.centrality.degree * 0.2;
    let probability = (base * magnitude * network_modifier).min(config.event_probability_cap);
    if probability.is_finite() {
        probability.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn event_id(source: TerritoryId, kind: CascadeType, trigger: CascadeTrigger, sequence: u64) -> String {
    let mut hasher = FnvHasher::new();
    hasher.write_u32(source.0);
    hasher.write(kind.as_str().as_bytes());
    hasher.write(trigger.as_str().as_bytes());
    hasher.write_u64(sequence);
    format!("cascade-{:016x}", hasher.finish())
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

fn assemble_event(
    network: &TerritoryNetwork,
    config: &CascadeConfig,
    request: &CascadeRequest,
    source: NodeIndex,
    kind: CascadeType,
    reached: &[Reached],
    started: Instant,
) -> CascadeEvent {
    let origin = network.node(source);
    let profile = config.profile(kind);
    let raw = sanitize_magnitude(request.magnitude);
    let effective = effective_magnitude(request.magnitude, config.magnitude_cap);

    let affected: Vec<AffectedTerritory> = reached
        .iter()
        .map(|entry| {
            let node = network.node(entry.node);
            AffectedTerritory {
                territory: node.id,
                distance: entry.distance,
                probability: entry.probability,
                strategic_value_delta: strategic_delta(raw, node.vulnerability, profile),
            }
        })
        .collect();
    let affected_factions: BTreeSet<_> = reached
        .iter()
        .filter_map(|entry| network.node(entry.node).controller)
        .collect();

    CascadeEvent {
        id: event_id(origin.id, kind, request.trigger, request.sequence),
        cascade_type: kind,
        trigger: request.trigger,
        source: origin.id,
        initiating_faction: origin.controller,
        affected_factions: affected_factions.into_iter().collect(),
        probability: event_probability(config, origin, effective),
        magnitude: raw,
        propagation_distance: reached.iter().map(|entry| entry.distance).max().unwrap_or(0),
        estimated_duration_hours: estimated_duration_hours(profile, effective, affected.len()),
        economic_impact_multiplier: economic_impact_multiplier(
            config.economic_multiplier_base,
            profile,
            origin,
            reached.iter().map(|entry| network.node(entry.node)),
        ),
        affected,
        created_at_ms: unix_millis(),
        processing_time_us: started.elapsed().as_micros() as u64,
    }
}

/// Classify the request's source, propagate every plausible type and build
/// one event per type that reached anyone.
pub fn analyze(
    network: &TerritoryNetwork,
    config: &CascadeConfig,
    request: &CascadeRequest,
) -> CascadeAnalysis {
    let started = Instant::now();
    let Some(source) = network.index_of(request.source) else {
        debug!(
            target: "cascade::propagation",
            error = %CascadeError::UnknownSourceTerritory(request.source),
            "propagation.unknown_source"
        );
        return CascadeAnalysis::default();
    };

    let kinds = classify(network.node(source), request.trigger);
    let mut events = Vec::new();
    for kind in kinds.kinds() {
        let type_started = Instant::now();
        let reached = propagate(network, config, source, kind, request.magnitude);
        if reached.is_empty() {
            continue;
        }
        events.push(assemble_event(
            network,
            config,
            request,
            source,
            kind,
            &reached,
            type_started,
        ));
    }

    let elapsed = started.elapsed();
    let budget = config.performance_budget();
    let budget_exceeded = elapsed > budget;
    if budget_exceeded {
        warn!(
            target: "cascade::propagation",
            error = %CascadeError::PerformanceBudgetExceeded {
                elapsed_ms: elapsed.as_secs_f64() * 1000.0,
                budget_ms: config.performance_budget_ms,
            },
            source = %request.source,
            types = ?kinds,
            "propagation.budget_exceeded"
        );
    }

    CascadeAnalysis {
        events,
        elapsed,
        budget_exceeded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkBuilder;
    use cascade_schema::{FactionBehaviorRecord, FactionId, TerritoryRecord, TerritorySnapshot};
    use std::sync::Arc;

    fn territory(id: u32, value: u8, controller: Option<u32>, x: f64, y: f64) -> TerritoryRecord {
        TerritoryRecord {
            id: TerritoryId(id),
            name: format!("T{id}"),
            strategic_value: value,
            controller_faction_id: controller.map(FactionId),
            position: (x, y),
            contested: false,
            category: None,
        }
    }

    /// Hub 1 (value 9) with four leaves 2500 units out.
    fn star() -> TerritoryNetwork {
        let snapshot = TerritorySnapshot::new(
            vec![
                territory(1, 9, Some(1), 0.0, 0.0),
                territory(2, 4, Some(2), 2500.0, 0.0),
                territory(3, 4, Some(2), -2500.0, 0.0),
                territory(4, 4, None, 0.0, 2500.0),
                territory(5, 4, Some(1), 0.0, -2500.0),
            ],
            Vec::new(),
            vec![
                FactionBehaviorRecord {
                    faction_id: FactionId(1),
                    discipline: 0.4,
                    aggression: 0.5,
                    tech_level: 0.5,
                },
                FactionBehaviorRecord {
                    faction_id: FactionId(2),
                    discipline: 0.3,
                    aggression: 0.5,
                    tech_level: 0.5,
                },
            ],
        );
        NetworkBuilder::new(Arc::new(CascadeConfig::default()))
            .build(&snapshot)
            .expect("star builds")
    }

    fn request(source: u32, trigger: CascadeTrigger, magnitude: f64) -> CascadeRequest {
        CascadeRequest {
            source: TerritoryId(source),
            trigger,
            magnitude,
            sequence: 1,
        }
    }

    #[test]
    fn hub_loss_reaches_leaves() {
        let network = star();
        let config = CascadeConfig::default();
        let analysis = analyze(
            &network,
            &config,
            &request(1, CascadeTrigger::TerritoryLoss, 1.5),
        );
        assert!(!analysis.events.is_empty());
        for event in &analysis.events {
            assert_eq!(event.source, TerritoryId(1));
            assert!(!event.affected.is_empty());
            assert!(event.affected.iter().all(|entry| entry.territory != TerritoryId(1)));
            assert!(event.probability > 0.0 && event.probability <= 0.95);
            assert_eq!(event.initiating_faction, Some(FactionId(1)));
            assert!(event.propagation_distance <= config.max_hops(event.cascade_type));
        }
    }

    #[test]
    fn over_budget_keeps_the_full_result() {
        let network = star();
        let relaxed = CascadeConfig::default();
        let strict = CascadeConfig {
            performance_budget_ms: 0,
            ..CascadeConfig::default()
        };
        let hub_loss = request(1, CascadeTrigger::TerritoryLoss, 1.5);

        let within = analyze(&network, &relaxed, &hub_loss);
        let over = analyze(&network, &strict, &hub_loss);
        assert!(over.budget_exceeded);
        assert!(!over.events.is_empty());
        let ids = |analysis: &CascadeAnalysis| -> Vec<String> {
            analysis.events.iter().map(|event| event.id.clone()).collect()
        };
        assert_eq!(ids(&over), ids(&within));
    }

    #[test]
    fn unknown_source_is_empty() {
        let network = star();
        let analysis = analyze(
            &network,
            &CascadeConfig::default(),
            &request(42, CascadeTrigger::TerritoryLoss, 1.0),
        );
        assert!(analysis.events.is_empty());
        assert!(!analysis.budget_exceeded);
    }

    #[test]
    fn zero_magnitude_admits_nobody() {
        let network = star();
        let config = CascadeConfig::default();
        let reached = propagate(&network, &config, 0, CascadeType::InfluencePropagation, 0.0);
        assert!(reached.is_empty());
    }

    #[test]
    fn faction_relationship_scales_probability() {
        let network = star();
        let config = CascadeConfig::default();
        let source = network.node(0);
        let ally = network.node_by_id(TerritoryId(5)).unwrap();
        let rival = network.node_by_id(TerritoryId(2)).unwrap();
        let p_ally = propagation_probability(
            &config,
            CascadeType::DefensiveCollapse,
            source,
            ally,
            1,
            0.5,
        );
        let p_rival = propagation_probability(
            &config,
            CascadeType::DefensiveCollapse,
            source,
            rival,
            1,
            0.5,
        );
        assert!(p_ally > 0.0);
        assert!(p_rival > 0.0);
        // Same geometry and value; only the relationship factor and discipline differ.
        let ratio = (p_ally / ally.vulnerability) / (p_rival / rival.vulnerability);
        assert!((ratio - 1.3 / 0.7).abs() < 1e-9);
    }

    #[test]
    fn hop_cap_limits_distance() {
        let mut territories = Vec::new();
        for id in 0..8u32 {
            territories.push(territory(id + 1, 9, None, f64::from(id) * 1000.0, 0.0));
        }
        // Chain at 1000 unit spacing but only neighbours connect once the
        // threshold is narrowed.
        let config = CascadeConfig {
            base_interaction_distance: 1000.0,
            interaction_distance_per_value: 100.0,
            inclusion_threshold: 0.0,
            ..CascadeConfig::default()
        };
        let network = NetworkBuilder::new(Arc::new(config.clone()))
            .build(&TerritorySnapshot::new(territories, Vec::new(), Vec::new()))
            .expect("chain builds");
        assert_eq!(network.edge_count(), 7);

        let reached = propagate(&network, &config, 0, CascadeType::DefensiveCollapse, 2.0);
        assert!(reached.iter().all(|entry| entry.distance <= 2));
        assert!(reached.iter().any(|entry| entry.distance == 2));
    }

    #[test]
    fn event_ids_are_stable() {
        let first = event_id(
            TerritoryId(3),
            CascadeType::FactionRetreat,
            CascadeTrigger::TerritoryLoss,
            9,
        );
        let again = event_id(
            TerritoryId(3),
            CascadeType::FactionRetreat,
            CascadeTrigger::TerritoryLoss,
            9,
        );
        let next = event_id(
            TerritoryId(3),
            CascadeType::FactionRetreat,
            CascadeTrigger::TerritoryLoss,
            10,
        );
        assert_eq!(first, again);
        assert_ne!(first, next);
        assert!(first.starts_with("cascade-"));
        assert_eq!(first.len(), "cascade-".len() + 16);
    }
}
