//! Shared entry point for cascade analysis.
//!
//! The engine publishes one immutable [`TerritoryNetwork`] at a time. A
//! rebuild constructs the replacement off to the side and swaps the pointer
//! only on success, so readers holding the previous `Arc` keep a consistent
//! view and a failed rebuild leaves the published network untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bevy_ecs::prelude::Resource;
use cascade_schema::{CascadeEvent, CascadeTrigger, CascadeWave, TerritoryId, TerritorySnapshot};
use tracing::{debug, warn};

use crate::centrality::CentralityCache;
use crate::chain::{ChainSimulator, ChainTrigger};
use crate::config::{load_cascade_config_from_env, CascadeConfig, CascadeConfigHandle};
use crate::error::CascadeError;
use crate::metrics::{CascadeMetrics, CascadeMetricsSnapshot};
use crate::network::{NetworkBuilder, TerritoryNetwork};
use crate::propagation::{self, CascadeRequest};

#[derive(Resource, Debug)]
pub struct CascadeEngine {
    builder: NetworkBuilder,
    network: RwLock<Option<Arc<TerritoryNetwork>>>,
    sequence: AtomicU64,
    metrics: CascadeMetrics,
}

impl CascadeEngine {
    pub fn new(config: Arc<CascadeConfig>) -> Self {
        Self::with_builder(NetworkBuilder::new(config))
    }

    pub fn with_builder(builder: NetworkBuilder) -> Self {
        Self {
            builder,
            network: RwLock::new(None),
            sequence: AtomicU64::new(0),
            metrics: CascadeMetrics::default(),
        }
    }

    /// Engine configured from `CASCADE_CONFIG_PATH`, the bundled file, or the builtin copy.
    pub fn from_env() -> Self {
        let (config, _) = load_cascade_config_from_env();
        Self::new(config)
    }

    /// Engine using whatever config the handle currently holds.
    pub fn from_handle(handle: &CascadeConfigHandle) -> Self {
        Self::new(handle.get())
    }

    pub fn config(&self) -> Arc<CascadeConfig> {
        Arc::clone(self.builder.config())
    }

    pub fn cache(&self) -> &Arc<CentralityCache> {
        self.builder.cache()
    }

    /// Build a network from `snapshot` and publish it.
    pub fn rebuild(
        &self,
        snapshot: &TerritorySnapshot,
    ) -> Result<Arc<TerritoryNetwork>, CascadeError> {
        match self.builder.build(snapshot) {
            Ok(network) => {
                let network = Arc::new(network);
                let mut slot = self.network.write().unwrap_or_else(PoisonError::into_inner);
                *slot = Some(Arc::clone(&network));
                self.metrics.record_rebuild(true);
                Ok(network)
            }
            Err(err) => {
                warn!(
                    target: "cascade::network",
                    error = %err,
                    kept_previous = self.network().is_some(),
                    "network.rebuild_failed"
                );
                self.metrics.record_rebuild(false);
                Err(err)
            }
        }
    }

    pub fn network(&self) -> Option<Arc<TerritoryNetwork>> {
        self.network
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn published(&self) -> Option<Arc<TerritoryNetwork>> {
        let network = self.network();
        if network.is_none() {
            debug!(target: "cascade::propagation", "propagation.no_network");
        }
        network
    }

    /// Single-source forecast against the published network. Empty when no
    /// network is published, the source is unknown, or nothing is reached.
    pub fn analyze(
        &self,
        source: TerritoryId,
        trigger: CascadeTrigger,
        magnitude: f64,
    ) -> Vec<CascadeEvent> {
        let Some(network) = self.published() else {
            return Vec::new();
        };
        let request = CascadeRequest {
            source,
            trigger,
            magnitude,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };
        let analysis = propagation::analyze(&network, self.builder.config(), &request);
        self.metrics.record_request(
            analysis.elapsed,
            analysis.events.len(),
            analysis.budget_exceeded,
        );
        analysis.events
    }

    /// Chain-reaction forecast; `max_waves` defaults to the configured limit.
    pub fn simulate_chain(
        &self,
        source: TerritoryId,
        trigger: CascadeTrigger,
        magnitude: f64,
        max_waves: Option<usize>,
    ) -> Vec<CascadeWave> {
        let Some(network) = self.published() else {
            return Vec::new();
        };
        let config = self.builder.config();
        ChainSimulator::new(&network, config)
            .with_metrics(&self.metrics)
            .run(
                ChainTrigger {
                    territory: source,
                    trigger,
                    magnitude,
                },
                max_waves.unwrap_or(config.max_chain_waves),
                &self.sequence,
            )
    }

    pub fn metrics(&self) -> CascadeMetricsSnapshot {
        let cache = self.builder.cache();
        self.metrics.snapshot(cache.hits(), cache.misses())
    }
}

impl Default for CascadeEngine {
    fn default() -> Self {
        Self::new(CascadeConfig::builtin())
    }
}
