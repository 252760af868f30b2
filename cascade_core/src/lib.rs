//! Territorial cascade propagation engine.
//!
//! Builds an immutable weighted network from a [`TerritorySnapshot`], scores
//! every territory's centrality and vulnerability, and forecasts which other
//! territories a control change drags along, either as a single analysis via
//! [`CascadeEngine::analyze`] or as successive waves via
//! [`CascadeEngine::simulate_chain`].

pub mod centrality;
pub mod chain;
pub mod classifier;
pub mod config;
pub mod engine;
mod error;
pub mod export;
mod hashing;
pub mod impact;
pub mod metrics;
pub mod network;
pub mod propagation;
pub mod synthetic;
pub mod vulnerability;

pub use cascade_schema::{
    AffectedTerritory, CascadeEvent, CascadeTrigger, CascadeType, CascadeWave, FactionId,
    TerritoryId, TerritorySnapshot,
};

#[cfg(feature = "graph-analysis")]
pub use centrality::GraphCentrality;
pub use centrality::{
    CentralityCache, CentralityInput, CentralityMetrics, CentralityStrategy, DegreeApproximation,
};
pub use chain::{ChainSimulator, ChainTrigger};
pub use classifier::{classify, CascadeTypeSet};
pub use config::{
    load_cascade_config_from_env, CascadeConfig, CascadeConfigError, CascadeConfigHandle,
    CascadeConfigMetadata, CascadeTypeProfile, CentralityMode, CASCADE_CONFIG_ENV,
};
pub use engine::CascadeEngine;
pub use error::CascadeError;
pub use export::{export_network_stats, render_network_stats, write_network_stats, ExportError};
pub use hashing::FnvHasher;
pub use metrics::{CascadeMetrics, CascadeMetricsSnapshot};
pub use network::{NetworkBuilder, NetworkEdge, NetworkNode, NodeIndex, TerritoryNetwork};
pub use propagation::{analyze, CascadeAnalysis, CascadeRequest};
pub use synthetic::synthetic_snapshot;
