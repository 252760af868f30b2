use ahash::RandomState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::str::FromStr;

/// Identifier of a territory in a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerritoryId(pub u32);

impl fmt::Display for TerritoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a faction controlling or influencing territories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(pub u32);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerritoryRecord {
    pub id: TerritoryId,
    pub name: String,
    pub strategic_value: u8,
    pub controller_faction_id: Option<FactionId>,
    pub position: (f64, f64),
    #[serde(default)]
    pub contested: bool,
    /// Economic category used to look up the economic importance multiplier.
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfluenceRecord {
    pub territory_id: TerritoryId,
    pub faction_id: FactionId,
    /// Percentage in 0..=100.
    pub influence_level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactionBehaviorRecord {
    pub faction_id: FactionId,
    pub discipline: f64,
    #[serde(default)]
    pub aggression: f64,
    #[serde(default)]
    pub tech_level: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnapshotHeader {
    pub territory_count: u32,
    pub influence_count: u32,
    pub faction_count: u32,
    pub hash: u64,
}

impl SnapshotHeader {
    pub fn new(territory_count: usize, influence_count: usize, faction_count: usize) -> Self {
        Self {
            territory_count: territory_count as u32,
            influence_count: influence_count as u32,
            faction_count: faction_count as u32,
            hash: 0,
        }
    }
}

/// Raw territory state handed over by the snapshot loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TerritorySnapshot {
    #[serde(default)]
    pub header: SnapshotHeader,
    pub territories: Vec<TerritoryRecord>,
    #[serde(default)]
    pub influence: Vec<InfluenceRecord>,
    #[serde(default)]
    pub factions: Vec<FactionBehaviorRecord>,
}

impl TerritorySnapshot {
    pub fn new(
        territories: Vec<TerritoryRecord>,
        influence: Vec<InfluenceRecord>,
        factions: Vec<FactionBehaviorRecord>,
    ) -> Self {
        Self {
            header: SnapshotHeader::new(territories.len(), influence.len(), factions.len()),
            territories,
            influence,
            factions,
        }
        .finalize()
    }

    /// Refresh the header counts and stamp the content hash.
    pub fn finalize(mut self) -> Self {
        let mut header = SnapshotHeader::new(
            self.territories.len(),
            self.influence.len(),
            self.factions.len(),
        );
        self.header = header.clone();
        header.hash = hash_snapshot(&self);
        self.header = header;
        self
    }
}

pub fn hash_snapshot(snapshot: &TerritorySnapshot) -> u64 {
    let mut clone = snapshot.clone();
    clone.header.hash = 0;
    let encoded = bincode::serialize(&clone).expect("snapshot serialization for hashing");
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&encoded);
    hasher.finish()
}

pub fn encode_snapshot(snapshot: &TerritorySnapshot) -> bincode::Result<Vec<u8>> {
    bincode::serialize(snapshot)
}

pub fn decode_snapshot(data: &[u8]) -> bincode::Result<TerritorySnapshot> {
    bincode::deserialize(data)
}

pub fn encode_snapshot_json(snapshot: &TerritorySnapshot) -> serde_json::Result<String> {
    serde_json::to_string_pretty(snapshot)
}

pub fn decode_snapshot_json(data: &str) -> serde_json::Result<TerritorySnapshot> {
    serde_json::from_str(data)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseLabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseLabelError {}

/// Archetype of secondary effect following a control change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeType {
    InfluencePropagation,
    DefensiveCollapse,
    EconomicDisruption,
    StrategicRealignment,
    FactionRetreat,
    SupplyLineBreakdown,
}

impl CascadeType {
    pub const ALL: [CascadeType; 6] = [
        CascadeType::InfluencePropagation,
        CascadeType::DefensiveCollapse,
        CascadeType::EconomicDisruption,
        CascadeType::StrategicRealignment,
        CascadeType::FactionRetreat,
        CascadeType::SupplyLineBreakdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CascadeType::InfluencePropagation => "influence_propagation",
            CascadeType::DefensiveCollapse => "defensive_collapse",
            CascadeType::EconomicDisruption => "economic_disruption",
            CascadeType::StrategicRealignment => "strategic_realignment",
            CascadeType::FactionRetreat => "faction_retreat",
            CascadeType::SupplyLineBreakdown => "supply_line_breakdown",
        }
    }
}

impl fmt::Display for CascadeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CascadeType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        CascadeType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or(ParseLabelError {
                kind: "cascade type",
                value: s.to_string(),
            })
    }
}

/// Class of initiating event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeTrigger {
    TerritoryLoss,
    InfluenceThreshold,
    FactionWeakness,
    StrategicNodeLoss,
    ResourceDepletion,
    AllianceBreakdown,
}

impl CascadeTrigger {
    pub const ALL: [CascadeTrigger; 6] = [
        CascadeTrigger::TerritoryLoss,
        CascadeTrigger::InfluenceThreshold,
        CascadeTrigger::FactionWeakness,
        CascadeTrigger::StrategicNodeLoss,
        CascadeTrigger::ResourceDepletion,
        CascadeTrigger::AllianceBreakdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CascadeTrigger::TerritoryLoss => "territory_loss",
            CascadeTrigger::InfluenceThreshold => "influence_threshold",
            CascadeTrigger::FactionWeakness => "faction_weakness",
            CascadeTrigger::StrategicNodeLoss => "strategic_node_loss",
            CascadeTrigger::ResourceDepletion => "resource_depletion",
            CascadeTrigger::AllianceBreakdown => "alliance_breakdown",
        }
    }
}

impl fmt::Display for CascadeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CascadeTrigger {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        CascadeTrigger::ALL
            .into_iter()
            .find(|trigger| trigger.as_str() == normalized)
            .ok_or(ParseLabelError {
                kind: "cascade trigger",
                value: s.to_string(),
            })
    }
}

/// A territory reached by a cascade, with its per-node outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffectedTerritory {
    pub territory: TerritoryId,
    /// Hop count from the source.
    pub distance: u32,
    pub probability: f64,
    pub strategic_value_delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CascadeEvent {
    pub id: String,
    pub cascade_type: CascadeType,
    pub trigger: CascadeTrigger,
    pub source: TerritoryId,
    pub affected: Vec<AffectedTerritory>,
    pub initiating_faction: Option<FactionId>,
    pub affected_factions: Vec<FactionId>,
    pub probability: f64,
    pub magnitude: f64,
    pub propagation_distance: u32,
    pub estimated_duration_hours: f64,
    pub economic_impact_multiplier: f64,
    pub created_at_ms: u64,
    pub processing_time_us: u64,
}

impl CascadeEvent {
    pub fn affected_ids(&self) -> impl Iterator<Item = TerritoryId> + '_ {
        self.affected.iter().map(|entry| entry.territory)
    }

    pub fn strategic_delta(&self, territory: TerritoryId) -> Option<f64> {
        self.affected
            .iter()
            .find(|entry| entry.territory == territory)
            .map(|entry| entry.strategic_value_delta)
    }
}

/// One iteration of a chain-reaction simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CascadeWave {
    pub index: u32,
    pub magnitude: f64,
    pub events: Vec<CascadeEvent>,
}

pub fn encode_events_json(events: &[CascadeEvent]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(events)
}

pub fn encode_waves_json(waves: &[CascadeWave]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(waves)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeStatsRecord {
    pub id: TerritoryId,
    pub name: String,
    pub strategic_value: u8,
    pub controller: Option<FactionId>,
    pub contested: bool,
    pub degree: usize,
    pub degree_centrality: f64,
    pub closeness: f64,
    pub betweenness: f64,
    pub eigenvector: f64,
    pub connectivity: f64,
    pub vulnerability: f64,
    pub economic_importance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSummaryRecord {
    pub node_count: usize,
    pub edge_count: usize,
    pub contested_count: usize,
    pub average_connectivity: f64,
    pub average_vulnerability: f64,
    pub average_economic_importance: f64,
    pub centrality_strategy: String,
    pub structural_version: u64,
    pub snapshot_hash: u64,
}

/// One line of the network statistics export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum NetworkStatsRecord {
    Node(NodeStatsRecord),
    Summary(NetworkSummaryRecord),
}
