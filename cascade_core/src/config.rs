//! Tunable constants for network construction, propagation and chain simulation.
//!
//! Loaded from `cascade_config.json` with support for an environment variable override.

use std::{
    collections::BTreeMap,
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use bevy_ecs::prelude::Resource;
use cascade_schema::CascadeType;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const BUILTIN_CASCADE_CONFIG: &str = include_str!("data/cascade_config.json");

pub const CASCADE_CONFIG_ENV: &str = "CASCADE_CONFIG_PATH";

/// How centrality metrics are computed for a built network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CentralityMode {
    /// Full fidelity up to `full_fidelity_node_limit` nodes, degree approximation beyond.
    #[default]
    Auto,
    Full,
    Approximate,
}

/// Per-archetype propagation and impact constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeTypeProfile {
    pub max_hops: u32,
    pub impact_multiplier: f64,
    pub strategic_factor: f64,
    pub base_duration_hours: f64,
}

impl CascadeTypeProfile {
    const fn new(
        max_hops: u32,
        impact_multiplier: f64,
        strategic_factor: f64,
        base_duration_hours: f64,
    ) -> Self {
        Self {
            max_hops,
            impact_multiplier,
            strategic_factor,
            base_duration_hours,
        }
    }
}

/// Field-level override of one profile; absent fields keep the archetype value.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CascadeTypeProfileOverride {
    max_hops: Option<u32>,
    impact_multiplier: Option<f64>,
    strategic_factor: Option<f64>,
    base_duration_hours: Option<f64>,
}

impl CascadeTypeProfileOverride {
    fn apply(self, profile: &mut CascadeTypeProfile) {
        if let Some(value) = self.max_hops {
            profile.max_hops = value;
        }
        if let Some(value) = self.impact_multiplier {
            profile.impact_multiplier = value;
        }
        if let Some(value) = self.strategic_factor {
            profile.strategic_factor = value;
        }
        if let Some(value) = self.base_duration_hours {
            profile.base_duration_hours = value;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CascadeTypeTableOverride {
    influence_propagation: CascadeTypeProfileOverride,
    defensive_collapse: CascadeTypeProfileOverride,
    economic_disruption: CascadeTypeProfileOverride,
    strategic_realignment: CascadeTypeProfileOverride,
    faction_retreat: CascadeTypeProfileOverride,
    supply_line_breakdown: CascadeTypeProfileOverride,
}

/// Profile table keyed by cascade archetype. A config file is merged over
/// [`CascadeTypeTable::default`] field by field, so anything it omits keeps
/// the value of its own archetype.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeTypeTable {
    pub influence_propagation: CascadeTypeProfile,
    pub defensive_collapse: CascadeTypeProfile,
    pub economic_disruption: CascadeTypeProfile,
    pub strategic_realignment: CascadeTypeProfile,
    pub faction_retreat: CascadeTypeProfile,
    pub supply_line_breakdown: CascadeTypeProfile,
}

impl Default for CascadeTypeTable {
    fn default() -> Self {
        Self {
            influence_propagation: CascadeTypeProfile::new(3, 1.1, 1.0, 4.0),
            defensive_collapse: CascadeTypeProfile::new(2, 1.3, 2.5, 2.0),
            economic_disruption: CascadeTypeProfile::new(4, 1.8, 1.5, 8.0),
            strategic_realignment: CascadeTypeProfile::new(3, 1.4, 3.0, 6.0),
            faction_retreat: CascadeTypeProfile::new(2, 1.2, 2.0, 1.0),
            supply_line_breakdown: CascadeTypeProfile::new(5, 2.0, 2.0, 3.0),
        }
    }
}

impl<'de> Deserialize<'de> for CascadeTypeTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let overrides = CascadeTypeTableOverride::deserialize(deserializer)?;
        let mut table = Self::default();
        overrides
            .influence_propagation
            .apply(&mut table.influence_propagation);
        overrides
            .defensive_collapse
            .apply(&mut table.defensive_collapse);
        overrides
            .economic_disruption
            .apply(&mut table.economic_disruption);
        overrides
            .strategic_realignment
            .apply(&mut table.strategic_realignment);
        overrides.faction_retreat.apply(&mut table.faction_retreat);
        overrides
            .supply_line_breakdown
            .apply(&mut table.supply_line_breakdown);
        Ok(table)
    }
}

impl CascadeTypeTable {
    pub fn profile(&self, kind: CascadeType) -> &CascadeTypeProfile {
        match kind {
            CascadeType::InfluencePropagation => &self.influence_propagation,
            CascadeType::DefensiveCollapse => &self.defensive_collapse,
            CascadeType::EconomicDisruption => &self.economic_disruption,
            CascadeType::StrategicRealignment => &self.strategic_realignment,
            CascadeType::FactionRetreat => &self.faction_retreat,
            CascadeType::SupplyLineBreakdown => &self.supply_line_breakdown,
        }
    }

    pub fn profile_mut(&mut self, kind: CascadeType) -> &mut CascadeTypeProfile {
        match kind {
            CascadeType::InfluencePropagation => &mut self.influence_propagation,
            CascadeType::DefensiveCollapse => &mut self.defensive_collapse,
            CascadeType::EconomicDisruption => &mut self.economic_disruption,
            CascadeType::StrategicRealignment => &mut self.strategic_realignment,
            CascadeType::FactionRetreat => &mut self.faction_retreat,
            CascadeType::SupplyLineBreakdown => &mut self.supply_line_breakdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    pub decay_rate: f64,
    pub inclusion_threshold: f64,
    pub cascade_probability_base: f64,
    pub economic_multiplier_base: f64,
    pub cache_ttl_seconds: u64,
    pub max_chain_waves: usize,
    pub performance_budget_ms: u64,
    pub cascade_types: CascadeTypeTable,
    pub economic_categories: BTreeMap<String, f64>,
    pub default_economic_multiplier: f64,
    pub centrality_mode: CentralityMode,
    pub full_fidelity_node_limit: usize,
    pub min_expansion_magnitude: f64,
    pub magnitude_cap: f64,
    pub event_probability_cap: f64,
    pub chain_probability_threshold: f64,
    pub chain_delta_threshold: f64,
    pub chain_seed_decay: f64,
    pub chain_wave_decay: f64,
    pub default_discipline: f64,
    pub base_interaction_distance: f64,
    pub interaction_distance_per_value: f64,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.7,
            inclusion_threshold: 0.2,
            cascade_probability_base: 0.15,
            economic_multiplier_base: 1.2,
            cache_ttl_seconds: 300,
            max_chain_waves: 5,
            performance_budget_ms: 50,
            cascade_types: CascadeTypeTable::default(),
            economic_categories: default_economic_categories(),
            default_economic_multiplier: 1.0,
            centrality_mode: CentralityMode::Auto,
            full_fidelity_node_limit: 1500,
            min_expansion_magnitude: 0.1,
            magnitude_cap: 2.0,
            event_probability_cap: 0.95,
            chain_probability_threshold: 0.3,
            chain_delta_threshold: 0.5,
            chain_seed_decay: 0.7,
            chain_wave_decay: 0.8,
            default_discipline: 0.5,
            base_interaction_distance: 3000.0,
            interaction_distance_per_value: 500.0,
        }
    }
}

fn default_economic_categories() -> BTreeMap<String, f64> {
    let mut categories = BTreeMap::new();
    categories.insert("industrial".to_string(), 1.3);
    categories.insert("corporate".to_string(), 1.2);
    categories.insert("logistics".to_string(), 1.15);
    categories
}

impl CascadeConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_CASCADE_CONFIG)
                .expect("builtin cascade config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, CascadeConfigError> {
        let mut config: CascadeConfig = serde_json::from_str(json)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, CascadeConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| CascadeConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    fn normalize(&mut self) {
        self.economic_categories = std::mem::take(&mut self.economic_categories)
            .into_iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();
    }

    pub fn validate(&self) -> Result<(), CascadeConfigError> {
        let unit = |field: &'static str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(CascadeConfigError::Invalid {
                    field,
                    reason: format!("{value} is outside [0, 1]"),
                })
            }
        };
        let positive = |field: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(CascadeConfigError::Invalid {
                    field,
                    reason: format!("{value} must be positive"),
                })
            }
        };

        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            return Err(CascadeConfigError::Invalid {
                field: "decay_rate",
                reason: format!("{} is outside (0, 1]", self.decay_rate),
            });
        }
        unit("inclusion_threshold", self.inclusion_threshold)?;
        unit("cascade_probability_base", self.cascade_probability_base)?;
        unit("event_probability_cap", self.event_probability_cap)?;
        unit("chain_probability_threshold", self.chain_probability_threshold)?;
        unit("chain_seed_decay", self.chain_seed_decay)?;
        unit("chain_wave_decay", self.chain_wave_decay)?;
        unit("default_discipline", self.default_discipline)?;
        positive("magnitude_cap", self.magnitude_cap)?;
        positive("min_expansion_magnitude", self.min_expansion_magnitude)?;
        positive("base_interaction_distance", self.base_interaction_distance)?;
        if self.max_chain_waves == 0 {
            return Err(CascadeConfigError::Invalid {
                field: "max_chain_waves",
                reason: "at least one wave is required".to_string(),
            });
        }
        if self.performance_budget_ms == 0 {
            return Err(CascadeConfigError::Invalid {
                field: "performance_budget_ms",
                reason: "budget must be positive".to_string(),
            });
        }
        for kind in CascadeType::ALL {
            let profile = self.cascade_types.profile(kind);
            if profile.max_hops == 0 {
                return Err(CascadeConfigError::Invalid {
                    field: "cascade_types.max_hops",
                    reason: format!("{kind} must allow at least one hop"),
                });
            }
            positive("cascade_types.base_duration_hours", profile.base_duration_hours)?;
        }
        Ok(())
    }

    pub fn profile(&self, kind: CascadeType) -> &CascadeTypeProfile {
        self.cascade_types.profile(kind)
    }

    pub fn max_hops(&self, kind: CascadeType) -> u32 {
        self.profile(kind).max_hops
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn performance_budget(&self) -> Duration {
        Duration::from_millis(self.performance_budget_ms)
    }

    /// Economic importance multiplier for a territory category.
    pub fn economic_multiplier(&self, category: Option<&str>) -> f64 {
        category
            .and_then(|name| self.economic_categories.get(&name.to_ascii_lowercase()))
            .copied()
            .unwrap_or(self.default_economic_multiplier)
    }

    /// Maximum edge length between two territories of the given strategic values.
    pub fn interaction_distance(&self, value_a: u8, value_b: u8) -> f64 {
        let scaled = f64::from(value_a.max(value_b)) * self.interaction_distance_per_value;
        self.base_interaction_distance.max(scaled)
    }
}

#[derive(Debug, Error)]
pub enum CascadeConfigError {
    #[error("failed to parse cascade config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read cascade config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid cascade config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Resource, Debug, Clone)]
pub struct CascadeConfigHandle(pub Arc<CascadeConfig>);

impl CascadeConfigHandle {
    pub fn new(config: Arc<CascadeConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<CascadeConfig> {
        Arc::clone(&self.0)
    }

    pub fn replace(&mut self, config: Arc<CascadeConfig>) {
        self.0 = config;
    }
}

impl Default for CascadeConfigHandle {
    fn default() -> Self {
        Self::new(CascadeConfig::builtin())
    }
}

#[derive(Resource, Debug, Clone)]
pub struct CascadeConfigMetadata {
    path: Option<PathBuf>,
}

impl CascadeConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

pub fn load_cascade_config_from_env() -> (Arc<CascadeConfig>, CascadeConfigMetadata) {
    let override_path = env::var(CASCADE_CONFIG_ENV).ok().map(PathBuf::from);
    let default_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/cascade_config.json");
    let path = override_path.unwrap_or(default_path);

    match CascadeConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "cascade::config",
                path = %path.display(),
                "cascade_config.loaded=file"
            );
            return (Arc::new(config), CascadeConfigMetadata::new(Some(path)));
        }
        Err(err) => {
            tracing::warn!(
                target: "cascade::config",
                path = %path.display(),
                error = %err,
                "cascade_config.load_failed"
            );
        }
    }

    tracing::info!(target: "cascade::config", "cascade_config.loaded=builtin");
    (CascadeConfig::builtin(), CascadeConfigMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_default() {
        let builtin = CascadeConfig::builtin();
        assert_eq!(*builtin, CascadeConfig::default());
        assert!(builtin.validate().is_ok());
    }

    #[test]
    fn per_type_hop_caps() {
        let config = CascadeConfig::default();
        assert_eq!(config.max_hops(CascadeType::InfluencePropagation), 3);
        assert_eq!(config.max_hops(CascadeType::DefensiveCollapse), 2);
        assert_eq!(config.max_hops(CascadeType::EconomicDisruption), 4);
        assert_eq!(config.max_hops(CascadeType::StrategicRealignment), 3);
        assert_eq!(config.max_hops(CascadeType::FactionRetreat), 2);
        assert_eq!(config.max_hops(CascadeType::SupplyLineBreakdown), 5);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = CascadeConfig::from_json_str(
            r#"{"decay_rate": 0.5, "cascade_types": {"faction_retreat": {"max_hops": 4}}}"#,
        )
        .expect("partial config parses");
        assert_eq!(config.decay_rate, 0.5);
        assert_eq!(config.inclusion_threshold, 0.2);
        assert_eq!(config.max_hops(CascadeType::FactionRetreat), 4);
        assert_eq!(config.max_hops(CascadeType::SupplyLineBreakdown), 5);

        let retreat = config.profile(CascadeType::FactionRetreat);
        assert_eq!(retreat.impact_multiplier, 1.2);
        assert_eq!(retreat.strategic_factor, 2.0);
        assert_eq!(retreat.base_duration_hours, 1.0);
    }

    #[test]
    fn profile_override_merges_per_archetype() {
        let config = CascadeConfig::from_json_str(
            r#"{"cascade_types": {
                "economic_disruption": {"base_duration_hours": 12.0},
                "defensive_collapse": {"impact_multiplier": 1.5, "max_hops": 3}
            }}"#,
        )
        .expect("profile overrides parse");
        let defaults = CascadeTypeTable::default();

        let economic = config.profile(CascadeType::EconomicDisruption);
        assert_eq!(economic.base_duration_hours, 12.0);
        assert_eq!(economic.max_hops, 4);
        assert_eq!(economic.impact_multiplier, 1.8);

        let defensive = config.profile(CascadeType::DefensiveCollapse);
        assert_eq!((defensive.max_hops, defensive.impact_multiplier), (3, 1.5));
        assert_eq!(defensive.strategic_factor, 2.5);
        assert_eq!(defensive.base_duration_hours, 2.0);

        for kind in [
            CascadeType::InfluencePropagation,
            CascadeType::StrategicRealignment,
            CascadeType::FactionRetreat,
            CascadeType::SupplyLineBreakdown,
        ] {
            assert_eq!(config.profile(kind), defaults.profile(kind));
        }

        assert!(CascadeConfig::from_json_str(
            r#"{"cascade_types": {"faction_retreat": {"max_hop": 4}}}"#
        )
        .is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = CascadeConfig::from_json_str(r#"{"decay_rate": 1.5}"#).unwrap_err();
        assert!(matches!(
            err,
            CascadeConfigError::Invalid {
                field: "decay_rate",
                ..
            }
        ));
        let err = CascadeConfig::from_json_str(r#"{"max_chain_waves": 0}"#).unwrap_err();
        assert!(matches!(err, CascadeConfigError::Invalid { .. }));
    }

    #[test]
    fn category_lookup_is_case_insensitive() {
        let config = CascadeConfig::default();
        assert_eq!(config.economic_multiplier(Some("Industrial")), 1.3);
        assert_eq!(config.economic_multiplier(Some("farmland")), 1.0);
        assert_eq!(config.economic_multiplier(None), 1.0);
    }

    #[test]
    fn interaction_distance_scales_with_larger_value() {
        let config = CascadeConfig::default();
        assert_eq!(config.interaction_distance(2, 3), 3000.0);
        assert_eq!(config.interaction_distance(9, 1), 4500.0);
        assert_eq!(config.interaction_distance(1, 10), 5000.0);
    }

    #[test]
    fn handle_replace_swaps_config() {
        let mut handle = CascadeConfigHandle::default();
        let before = handle.get();
        handle.replace(Arc::new(CascadeConfig {
            max_chain_waves: 2,
            ..CascadeConfig::default()
        }));
        assert_eq!(before.max_chain_waves, 5);
        assert_eq!(handle.get().max_chain_waves, 2);
        assert!(CascadeConfigMetadata::new(None).path().is_none());
    }
}
