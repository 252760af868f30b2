//! Per-node graph centrality.
//!
//! Two strategies populate the same [`CentralityMetrics`]:
//! - [`GraphCentrality`] (feature `graph-analysis`): closeness and betweenness
//!   over hop distances, eigenvector importance over influence weights.
//! - [`DegreeApproximation`]: every metric scaled from degree centrality.
//!
//! Results are memoised in a [`CentralityCache`] keyed by the network's
//! structural version and expire after the configured TTL.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::CascadeError;
use crate::network::{NetworkEdge, NodeIndex};

const CLOSENESS_FROM_DEGREE: f64 = 0.8;
const BETWEENNESS_FROM_DEGREE: f64 = 0.6;
const EIGENVECTOR_FROM_DEGREE: f64 = 0.7;

const CONNECTIVITY_DEGREE_WEIGHT: f64 = 0.3;
const CONNECTIVITY_CLOSENESS_WEIGHT: f64 = 0.3;
const CONNECTIVITY_BETWEENNESS_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CentralityMetrics {
    pub degree: f64,
    pub closeness: f64,
    pub betweenness: f64,
    pub eigenvector: f64,
}

impl CentralityMetrics {
    fn clamped(self) -> Self {
        Self {
            degree: unit(self.degree),
            closeness: unit(self.closeness),
            betweenness: unit(self.betweenness),
            eigenvector: unit(self.eigenvector),
        }
    }

    /// Weighted blend used as the node's connectivity score.
    pub fn connectivity(&self) -> f64 {
        unit(
            self.degree * CONNECTIVITY_DEGREE_WEIGHT
                + self.closeness * CONNECTIVITY_CLOSENESS_WEIGHT
                + self.betweenness * CONNECTIVITY_BETWEENNESS_WEIGHT,
        )
    }
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Read-only view of an edge set handed to a strategy.
#[derive(Debug, Clone, Copy)]
pub struct CentralityInput<'a> {
    pub node_count: usize,
    pub edges: &'a [NetworkEdge],
    pub adjacency: &'a [Vec<(NodeIndex, usize)>],
}

impl CentralityInput<'_> {
    fn degree_centrality(&self, node: NodeIndex) -> f64 {
        if self.node_count <= 1 {
            return 0.0;
        }
        self.adjacency[node].len() as f64 / (self.node_count - 1) as f64
    }
}

pub trait CentralityStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// One entry per node, in node-index order, every value in [0, 1].
    fn compute(&self, input: &CentralityInput<'_>) -> Vec<CentralityMetrics>;
}

/// Degree-only approximation for large networks or builds without graph analysis.
#[derive(Debug, Clone, Copy, Default)]
pub struct DegreeApproximation;

impl CentralityStrategy for DegreeApproximation {
    fn name(&self) -> &'static str {
        "degree_approximation"
    }

    fn compute(&self, input: &CentralityInput<'_>) -> Vec<CentralityMetrics> {
        (0..input.node_count)
            .map(|node| {
                let degree = input.degree_centrality(node);
                CentralityMetrics {
                    degree,
                    closeness: degree * CLOSENESS_FROM_DEGREE,
                    betweenness: degree * BETWEENNESS_FROM_DEGREE,
                    eigenvector: degree * EIGENVECTOR_FROM_DEGREE,
                }
                .clamped()
            })
            .collect()
    }
}

#[cfg(feature = "graph-analysis")]
pub use graph::GraphCentrality;

#[cfg(feature = "graph-analysis")]
mod graph {
    use std::collections::VecDeque;

    use petgraph::algo::dijkstra;
    use petgraph::graph::{NodeIndex as GraphIndex, UnGraph};
    use petgraph::visit::EdgeRef;

    use super::{CentralityInput, CentralityMetrics, CentralityStrategy};

    /// Full-fidelity centrality computed over a petgraph view of the network.
    #[derive(Debug, Clone, Copy)]
    pub struct GraphCentrality {
        pub max_iterations: usize,
        pub tolerance: f64,
    }

    impl Default for GraphCentrality {
        fn default() -> Self {
            Self {
                max_iterations: 100,
                tolerance: 1e-9,
            }
        }
    }

    impl CentralityStrategy for GraphCentrality {
        fn name(&self) -> &'static str {
            "graph"
        }

        fn compute(&self, input: &CentralityInput<'_>) -> Vec<CentralityMetrics> {
            let graph = build_graph(input);
            let closeness = closeness(&graph);
            let betweenness = betweenness(&graph);
            let eigenvector = self.eigenvector(&graph);

            (0..input.node_count)
                .map(|node| {
                    CentralityMetrics {
                        degree: input.degree_centrality(node),
                        closeness: closeness[node],
                        betweenness: betweenness[node],
                        eigenvector: eigenvector[node],
                    }
                    .clamped()
                })
                .collect()
        }
    }

    impl GraphCentrality {
        /// Power iteration on `A + I` with influence weights. The identity shift
        /// keeps bipartite layouts (stars, chains) from oscillating.
        fn eigenvector(&self, graph: &UnGraph<(), f64>) -> Vec<f64> {
            let n = graph.node_count();
            let mut scores = vec![1.0; n];
            for _ in 0..self.max_iterations {
                let mut next = scores.clone();
                for edge in graph.edge_references() {
                    let (a, b) = (edge.source().index(), edge.target().index());
                    let weight = *edge.weight();
                    next[a] += weight * scores[b];
                    next[b] += weight * scores[a];
                }
                let peak = next.iter().copied().fold(0.0_f64, f64::max);
                if peak <= 0.0 {
                    break;
                }
                next.iter_mut().for_each(|value| *value /= peak);
                let change: f64 = next
                    .iter()
                    .zip(&scores)
                    .map(|(new, old)| (new - old).abs())
                    .sum();
                scores = next;
                if change < self.tolerance * n as f64 {
                    break;
                }
            }
            for node in graph.node_indices() {
                if graph.neighbors(node).next().is_none() {
                    scores[node.index()] = 0.0;
                }
            }
            scores
        }
    }

    fn build_graph(input: &CentralityInput<'_>) -> UnGraph<(), f64> {
        let mut graph = UnGraph::with_capacity(input.node_count, input.edges.len());
        for _ in 0..input.node_count {
            graph.add_node(());
        }
        for edge in input.edges {
            graph.add_edge(
                GraphIndex::new(edge.a),
                GraphIndex::new(edge.b),
                edge.influence_weight,
            );
        }
        graph
    }

    /// Wasserman-Faust closeness over hop distances, so disconnected
    /// components are scaled by the share of the network they can reach.
    fn closeness(graph: &UnGraph<(), f64>) -> Vec<f64> {
        let n = graph.node_count();
        if n <= 1 {
            return vec![0.0; n];
        }
        graph
            .node_indices()
            .map(|start| {
                let distances = dijkstra(graph, start, None, |_| 1u32);
                let reachable = distances.len().saturating_sub(1) as f64;
                let total: u32 = distances.values().sum();
                if reachable == 0.0 || total == 0 {
                    0.0
                } else {
                    (reachable / f64::from(total)) * (reachable / (n - 1) as f64)
                }
            })
            .collect()
    }

    /// Brandes betweenness on the unweighted graph, normalised for undirected pairs.
    fn betweenness(graph: &UnGraph<(), f64>) -> Vec<f64> {
        let n = graph.node_count();
        let mut scores = vec![0.0; n];
        if n <= 2 {
            return scores;
        }

        for source in 0..n {
            let mut order = Vec::with_capacity(n);
            let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
            let mut paths = vec![0.0_f64; n];
            let mut depth = vec![usize::MAX; n];
            paths[source] = 1.0;
            depth[source] = 0;

            let mut queue = VecDeque::from([source]);
            while let Some(current) = queue.pop_front() {
                order.push(current);
                for neighbor in graph.neighbors(GraphIndex::new(current)) {
                    let neighbor = neighbor.index();
                    if depth[neighbor] == usize::MAX {
                        depth[neighbor] = depth[current] + 1;
                        queue.push_back(neighbor);
                    }
                    if depth[neighbor] == depth[current] + 1 {
                        paths[neighbor] += paths[current];
                        predecessors[neighbor].push(current);
                    }
                }
            }

            let mut dependency = vec![0.0_f64; n];
            while let Some(node) = order.pop() {
                for &pred in &predecessors[node] {
                    dependency[pred] += paths[pred] / paths[node] * (1.0 + dependency[node]);
                }
                if node != source {
                    scores[node] += dependency[node];
                }
            }
        }

        // Each unordered pair was visited from both ends.
        let scale = ((n - 1) * (n - 2)) as f64;
        scores.iter_mut().for_each(|score| *score /= scale);
        scores
    }
}

static FALLBACK_NOTICE: Once = Once::new();

/// The full-fidelity strategy compiled into this build, if any.
pub fn full_fidelity_strategy() -> Option<Arc<dyn CentralityStrategy>> {
    #[cfg(feature = "graph-analysis")]
    {
        Some(Arc::new(GraphCentrality::default()))
    }
    #[cfg(not(feature = "graph-analysis"))]
    {
        None
    }
}

pub(crate) fn report_fallback() {
    FALLBACK_NOTICE.call_once(|| {
        warn!(
            target: "cascade::centrality",
            error = %CascadeError::CentralityLibraryUnavailable,
            "centrality.fallback"
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheKey {
    structural_version: u64,
    strategy: &'static str,
    /// Address of the strategy's shared allocation, so two strategies
    /// reporting the same name never share an entry.
    instance: usize,
}

#[derive(Debug)]
struct CachedCentrality {
    key: CacheKey,
    computed_at: Instant,
    metrics: Arc<Vec<CentralityMetrics>>,
}

/// Single-slot centrality cache shared by every build of one builder.
///
/// A read is valid only while the structural version and strategy instance match and
/// the TTL has not elapsed; otherwise the metrics are recomputed outside the
/// lock and the slot is replaced wholesale.
#[derive(Debug)]
pub struct CentralityCache {
    ttl: Duration,
    slot: RwLock<Option<CachedCentrality>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CentralityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get_or_compute(
        &self,
        structural_version: u64,
        strategy: &Arc<dyn CentralityStrategy>,
        input: &CentralityInput<'_>,
    ) -> Arc<Vec<CentralityMetrics>> {
        let key = CacheKey {
            structural_version,
            strategy: strategy.name(),
            instance: Arc::as_ptr(strategy).cast::<()>() as usize,
        };

        {
            let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = slot.as_ref() {
                if cached.key == key && cached.computed_at.elapsed() < self.ttl {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        target: "cascade::centrality",
                        structural_version,
                        strategy = key.strategy,
                        "centrality.cache_hit"
                    );
                    return Arc::clone(&cached.metrics);
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "cascade::centrality",
            structural_version,
            strategy = key.strategy,
            nodes = input.node_count,
            "centrality.cache_miss"
        );
        let metrics = Arc::new(strategy.compute(input));
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(CachedCentrality {
            key,
            computed_at: Instant::now(),
            metrics: Arc::clone(&metrics),
        });
        metrics
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
