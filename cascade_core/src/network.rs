//! Territory network construction.
//!
//! A build runs as a staged pipeline over a snapshot: validate records, seed
//! nodes in ascending territory order, connect every pair within interaction
//! distance, compute centrality through the builder's cache, then score
//! connectivity and vulnerability. Nodes are assembled once, fully populated,
//! and the resulting [`TerritoryNetwork`] is never mutated afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hasher;
use std::sync::Arc;
use std::time::Instant;

use cascade_schema::{hash_snapshot, FactionId, TerritoryId, TerritoryRecord, TerritorySnapshot};
use tracing::info;

use crate::centrality::{
    full_fidelity_strategy, report_fallback, CentralityCache, CentralityInput, CentralityMetrics,
    CentralityStrategy, DegreeApproximation,
};
use crate::config::{CascadeConfig, CentralityMode};
use crate::error::CascadeError;
use crate::hashing::FnvHasher;
use crate::vulnerability::{influence_dispersion, vulnerability_score};

/// Dense index of a node inside one built network.
pub type NodeIndex = usize;

pub const SAME_CONTROLLER_FACTOR: f64 = 1.3;
pub const RIVAL_CONTROLLER_FACTOR: f64 = 0.7;

const INFLUENCE_DISTANCE_SCALE: f64 = 1000.0;
const MAX_STRATEGIC_VALUE: u8 = 10;
const MAX_INFLUENCE_LEVEL: f64 = 100.0;

/// Relationship factor between two territories' controllers.
pub fn faction_relationship(a: Option<FactionId>, b: Option<FactionId>) -> f64 {
    match (a, b) {
        (Some(left), Some(right)) if left == right => SAME_CONTROLLER_FACTOR,
        (Some(_), Some(_)) => RIVAL_CONTROLLER_FACTOR,
        _ => 1.0,
    }
}

/// One territory with every derived score populated.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkNode {
    pub id: TerritoryId,
    pub name: String,
    pub strategic_value: u8,
    pub controller: Option<FactionId>,
    pub influence: BTreeMap<FactionId, f64>,
    pub position: (f64, f64),
    pub contested: bool,
    pub category: Option<String>,
    pub controller_discipline: f64,
    pub influence_dispersion: f64,
    pub connectivity: f64,
    pub centrality: CentralityMetrics,
    pub vulnerability: f64,
    pub economic_importance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkEdge {
    pub a: NodeIndex,
    pub b: NodeIndex,
    pub source: TerritoryId,
    pub target: TerritoryId,
    pub distance: f64,
    pub influence_weight: f64,
    pub economic_weight: f64,
    pub strategic_weight: f64,
    /// Influence weight adjusted per controlling faction: stronger along
    /// same-faction edges, weaker across a frontier.
    pub faction_weights: BTreeMap<FactionId, f64>,
}

impl NetworkEdge {
    fn between(a: NodeIndex, left: &NodeSeed, b: NodeIndex, right: &NodeSeed, distance: f64) -> Self {
        let value_a = f64::from(left.record.strategic_value);
        let value_b = f64::from(right.record.strategic_value);
        let influence_weight = 1.0 / (1.0 + distance / INFLUENCE_DISTANCE_SCALE);

        let mut faction_weights = BTreeMap::new();
        let relationship = faction_relationship(
            left.record.controller_faction_id,
            right.record.controller_faction_id,
        );
        for faction in [
            left.record.controller_faction_id,
            right.record.controller_faction_id,
        ]
        .into_iter()
        .flatten()
        {
            faction_weights.insert(faction, influence_weight * relationship);
        }

        Self {
            a,
            b,
            source: left.record.id,
            target: right.record.id,
            distance,
            influence_weight,
            economic_weight: ((value_a + value_b) / 20.0).clamp(0.0, 1.0),
            strategic_weight: (value_a * value_b / 100.0).min(1.0),
            faction_weights,
        }
    }

    /// The endpoint opposite `node`.
    pub fn other(&self, node: NodeIndex) -> NodeIndex {
        if self.a == node {
            self.b
        } else {
            self.a
        }
    }
}

/// Immutable territory graph produced by one build.
#[derive(Debug, Clone)]
pub struct TerritoryNetwork {
    nodes: Vec<NetworkNode>,
    edges: Vec<NetworkEdge>,
    adjacency: Vec<Vec<(NodeIndex, usize)>>,
    index: BTreeMap<TerritoryId, NodeIndex>,
    structural_version: u64,
    snapshot_hash: u64,
    centrality_strategy: &'static str,
}

impl TerritoryNetwork {
    pub fn nodes(&self) -> &[NetworkNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[NetworkEdge] {
        &self.edges
    }

    pub fn node(&self, index: NodeIndex) -> &NetworkNode {
        &self.nodes[index]
    }

    pub fn index_of(&self, id: TerritoryId) -> Option<NodeIndex> {
        self.index.get(&id).copied()
    }

    pub fn node_by_id(&self, id: TerritoryId) -> Option<&NetworkNode> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn contains(&self, id: TerritoryId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn neighbors(&self, node: NodeIndex) -> impl Iterator<Item = (NodeIndex, &NetworkEdge)> + '_ {
        self.adjacency[node]
            .iter()
            .map(|&(neighbor, edge)| (neighbor, &self.edges[edge]))
    }

    pub fn degree(&self, node: NodeIndex) -> usize {
        self.adjacency[node].len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_between(&self, a: TerritoryId, b: TerritoryId) -> Option<&NetworkEdge> {
        let left = self.index_of(a)?;
        let right = self.index_of(b)?;
        self.adjacency[left]
            .iter()
            .find(|(neighbor, _)| *neighbor == right)
            .map(|&(_, edge)| &self.edges[edge])
    }

    /// Hash of the edge set; changes whenever any edge or weight changes.
    pub fn structural_version(&self) -> u64 {
        self.structural_version
    }

    pub fn snapshot_hash(&self) -> u64 {
        self.snapshot_hash
    }

    pub fn centrality_strategy(&self) -> &'static str {
        self.centrality_strategy
    }

    pub fn average_connectivity(&self) -> f64 {
        self.average(|node| node.connectivity)
    }

    pub fn average_vulnerability(&self) -> f64 {
        self.average(|node| node.vulnerability)
    }

    pub fn average_economic_importance(&self) -> f64 {
        self.average(|node| node.economic_importance)
    }

    fn average(&self, score: impl Fn(&NetworkNode) -> f64) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        self.nodes.iter().map(score).sum::<f64>() / self.nodes.len() as f64
    }
}

/// Builds networks from snapshots and owns the centrality cache they share.
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    config: Arc<CascadeConfig>,
    cache: Arc<CentralityCache>,
    full: Option<Arc<dyn CentralityStrategy>>,
    approximate: Arc<dyn CentralityStrategy>,
}

impl NetworkBuilder {
    pub fn new(config: Arc<CascadeConfig>) -> Self {
        let cache = Arc::new(CentralityCache::new(config.cache_ttl()));
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: Arc<CascadeConfig>, cache: Arc<CentralityCache>) -> Self {
        let full = match config.centrality_mode {
            CentralityMode::Approximate => None,
            CentralityMode::Auto | CentralityMode::Full => {
                let strategy = full_fidelity_strategy();
                if strategy.is_none() {
                    report_fallback();
                }
                strategy
            }
        };
        Self {
            config,
            cache,
            full,
            approximate: Arc::new(DegreeApproximation),
        }
    }

    /// Replace the centrality strategies chosen at construction.
    pub fn with_strategies(
        mut self,
        full: Option<Arc<dyn CentralityStrategy>>,
        approximate: Arc<dyn CentralityStrategy>,
    ) -> Self {
        self.full = full;
        self.approximate = approximate;
        self
    }

    pub fn config(&self) -> &Arc<CascadeConfig> {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CentralityCache> {
        &self.cache
    }

    fn strategy_for(&self, node_count: usize) -> &Arc<dyn CentralityStrategy> {
        match (&self.full, self.config.centrality_mode) {
            (Some(full), CentralityMode::Full) => full,
            (Some(full), CentralityMode::Auto)
                if node_count <= self.config.full_fidelity_node_limit =>
            {
                full
            }
            _ => &self.approximate,
        }
    }

    pub fn build(&self, snapshot: &TerritorySnapshot) -> Result<TerritoryNetwork, CascadeError> {
        let started = Instant::now();
        let discipline = validate_snapshot(snapshot)?;

        let seeds = seed_nodes(snapshot, &discipline, &self.config);
        let edges = connect_edges(&seeds, &self.config);
        let adjacency = build_adjacency(seeds.len(), &edges);
        let structural_version = structural_version(&seeds, &edges);

        let strategy = self.strategy_for(seeds.len());
        let input = CentralityInput {
            node_count: seeds.len(),
            edges: &edges,
            adjacency: &adjacency,
        };
        let centrality = self
            .cache
            .get_or_compute(structural_version, strategy, &input);

        let mut index = BTreeMap::new();
        let nodes: Vec<NetworkNode> = seeds
            .into_iter()
            .zip(centrality.iter())
            .enumerate()
            .map(|(position, (seed, metrics))| {
                index.insert(seed.record.id, position);
                seed.finish(*metrics)
            })
            .collect();

        let network = TerritoryNetwork {
            nodes,
            edges,
            adjacency,
            index,
            structural_version,
            snapshot_hash: hash_snapshot(snapshot),
            centrality_strategy: strategy.name(),
        };

        info!(
            target: "cascade::network",
            nodes = network.node_count(),
            edges = network.edge_count(),
            structural_version,
            strategy = network.centrality_strategy,
            elapsed_us = started.elapsed().as_micros() as u64,
            "network.built"
        );
        Ok(network)
    }
}

/// Node data known before centrality is available.
#[derive(Debug)]
struct NodeSeed {
    record: TerritoryRecord,
    influence: BTreeMap<FactionId, f64>,
    controller_discipline: f64,
    influence_dispersion: f64,
    economic_importance: f64,
}

impl NodeSeed {
    fn finish(self, centrality: CentralityMetrics) -> NetworkNode {
        let connectivity = centrality.connectivity();
        let vulnerability = vulnerability_score(
            self.record.strategic_value,
            connectivity,
            self.controller_discipline,
            self.influence_dispersion,
        );
        NetworkNode {
            id: self.record.id,
            name: self.record.name,
            strategic_value: self.record.strategic_value,
            controller: self.record.controller_faction_id,
            influence: self.influence,
            position: self.record.position,
            contested: self.record.contested,
            category: self.record.category,
            controller_discipline: self.controller_discipline,
            influence_dispersion: self.influence_dispersion,
            connectivity,
            centrality,
            vulnerability,
            economic_importance: self.economic_importance,
        }
    }
}

/// Check every record and return faction discipline by id.
fn validate_snapshot(
    snapshot: &TerritorySnapshot,
) -> Result<BTreeMap<FactionId, f64>, CascadeError> {
    let mut territories = BTreeSet::new();
    for territory in &snapshot.territories {
        if !territories.insert(territory.id) {
            return Err(CascadeError::invalid(format!(
                "duplicate territory id {}",
                territory.id
            )));
        }
        if territory.strategic_value > MAX_STRATEGIC_VALUE {
            return Err(CascadeError::invalid(format!(
                "territory {} has strategic value {} above {MAX_STRATEGIC_VALUE}",
                territory.id, territory.strategic_value
            )));
        }
        if !territory.position.0.is_finite() || !territory.position.1.is_finite() {
            return Err(CascadeError::invalid(format!(
                "territory {} has a non-finite position",
                territory.id
            )));
        }
    }

    for record in &snapshot.influence {
        if !territories.contains(&record.territory_id) {
            return Err(CascadeError::invalid(format!(
                "influence record references unknown territory {}",
                record.territory_id
            )));
        }
        if !(0.0..=MAX_INFLUENCE_LEVEL).contains(&record.influence_level) {
            return Err(CascadeError::invalid(format!(
                "influence of faction {} in territory {} is {} (expected 0..=100)",
                record.faction_id, record.territory_id, record.influence_level
            )));
        }
    }

    let mut discipline = BTreeMap::new();
    for faction in &snapshot.factions {
        let in_range = |value: f64| (0.0..=1.0).contains(&value);
        if !in_range(faction.discipline)
            || !in_range(faction.aggression)
            || !in_range(faction.tech_level)
        {
            return Err(CascadeError::invalid(format!(
                "faction {} behaviour values must lie in [0, 1]",
                faction.faction_id
            )));
        }
        if discipline
            .insert(faction.faction_id, faction.discipline)
            .is_some()
        {
            return Err(CascadeError::invalid(format!(
                "duplicate behaviour record for faction {}",
                faction.faction_id
            )));
        }
    }

    if snapshot.territories.len() < 2 {
        return Err(CascadeError::EmptyNetwork {
            territories: snapshot.territories.len(),
        });
    }
    Ok(discipline)
}

fn seed_nodes(
    snapshot: &TerritorySnapshot,
    discipline: &BTreeMap<FactionId, f64>,
    config: &CascadeConfig,
) -> Vec<NodeSeed> {
    let mut influence: BTreeMap<TerritoryId, BTreeMap<FactionId, f64>> = BTreeMap::new();
    for record in &snapshot.influence {
        let level = influence
            .entry(record.territory_id)
            .or_default()
            .entry(record.faction_id)
            .or_insert(0.0);
        *level = (*level + record.influence_level).min(MAX_INFLUENCE_LEVEL);
    }

    let mut records: Vec<&TerritoryRecord> = snapshot.territories.iter().collect();
    records.sort_by_key(|record| record.id);

    records
        .into_iter()
        .map(|record| {
            let influence = influence.remove(&record.id).unwrap_or_default();
            let controller_discipline = record
                .controller_faction_id
                .and_then(|faction| discipline.get(&faction).copied())
                .unwrap_or(config.default_discipline);
            let dispersion = influence_dispersion(&influence, record.controller_faction_id);
            let multiplier = config.economic_multiplier(record.category.as_deref());
            let economic_importance =
                (f64::from(record.strategic_value) / 10.0 * multiplier).clamp(0.0, 1.0);
            NodeSeed {
                record: record.clone(),
                influence,
                controller_discipline,
                influence_dispersion: dispersion,
                economic_importance,
            }
        })
        .collect()
}

fn connect_edges(seeds: &[NodeSeed], config: &CascadeConfig) -> Vec<NetworkEdge> {
    let mut edges = Vec::new();
    for (a, left) in seeds.iter().enumerate() {
        for (offset, right) in seeds[a + 1..].iter().enumerate() {
            let b = a + 1 + offset;
            let dx = left.record.position.0 - right.record.position.0;
            let dy = left.record.position.1 - right.record.position.1;
            let distance = dx.hypot(dy);
            let threshold = config
                .interaction_distance(left.record.strategic_value, right.record.strategic_value);
            if distance <= threshold {
                edges.push(NetworkEdge::between(a, left, b, right, distance));
            }
        }
    }
    edges
}

fn build_adjacency(node_count: usize, edges: &[NetworkEdge]) -> Vec<Vec<(NodeIndex, usize)>> {
    let mut adjacency = vec![Vec::new(); node_count];
    for (position, edge) in edges.iter().enumerate() {
        adjacency[edge.a].push((edge.b, position));
        adjacency[edge.b].push((edge.a, position));
    }
    adjacency
}

/// Covers the arena order of node ids as well as the edges, since cached
/// centrality is positional.
fn structural_version(seeds: &[NodeSeed], edges: &[NetworkEdge]) -> u64 {
    let mut hasher = FnvHasher::new();
    hasher.write_usize(seeds.len());
    for seed in seeds {
        hasher.write_u32(seed.record.id.0);
    }
    for edge in edges {
        hasher.write_u32(edge.source.0);
        hasher.write_u32(edge.target.0);
        hasher.write_f64(edge.distance);
        hasher.write_f64(edge.influence_weight);
    }
    hasher.finish()
}
