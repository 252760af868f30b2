use std::collections::BTreeSet;
use std::sync::Arc;

use cascade_core::propagation::propagate;
use cascade_core::{
    synthetic_snapshot, CascadeConfig, CascadeEngine, CascadeTrigger, CascadeType, NetworkBuilder,
    TerritoryId,
};
use proptest::prelude::*;

fn trigger() -> impl Strategy<Value = CascadeTrigger> {
    prop::sample::select(CascadeTrigger::ALL.to_vec())
}

fn engine(config: CascadeConfig, size: usize, factions: usize, seed: u64) -> CascadeEngine {
    let engine = CascadeEngine::new(Arc::new(config));
    engine
        .rebuild(&synthetic_snapshot(size, factions, seed))
        .expect("synthetic snapshot builds");
    engine
}

fn pick(size: usize, index: usize) -> TerritoryId {
    TerritoryId((index % size) as u32 + 1)
}

/// Everything reachable and every event kept, so chains run as long as allowed.
fn permissive() -> CascadeConfig {
    CascadeConfig {
        inclusion_threshold: 0.0,
        chain_probability_threshold: 0.0,
        chain_delta_threshold: 0.0,
        ..CascadeConfig::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn events_stay_within_bounds(
        size in 2usize..40,
        factions in 0usize..5,
        seed in any::<u64>(),
        source in 0usize..1000,
        trigger in trigger(),
        magnitude in 0.0f64..6.0,
    ) {
        let config = CascadeConfig::default();
        let engine = engine(config.clone(), size, factions, seed);
        for event in engine.analyze(pick(size, source), trigger, magnitude) {
            let cap = config.max_hops(event.cascade_type);
            prop_assert!((0.0..=1.0).contains(&event.probability));
            prop_assert!(event.magnitude >= 0.0);
            prop_assert!(event.propagation_distance <= cap);
            prop_assert!(event.estimated_duration_hours > 0.0);
            prop_assert!(!event.affected.is_empty());
            for entry in &event.affected {
                prop_assert!(entry.territory != event.source);
                prop_assert!(entry.distance >= 1 && entry.distance <= cap);
                prop_assert!((0.0..=1.0).contains(&entry.probability));
                prop_assert!((-2.0..=2.0).contains(&entry.strategic_value_delta));
            }
        }
    }

    #[test]
    fn node_scores_are_unit_interval(
        size in 2usize..60,
        factions in 0usize..6,
        seed in any::<u64>(),
    ) {
        let engine = engine(CascadeConfig::default(), size, factions, seed);
        let network = engine.network().expect("network published");
        for node in network.nodes() {
            for score in [
                node.vulnerability,
                node.connectivity,
                node.economic_importance,
                node.centrality.degree,
                node.centrality.closeness,
                node.centrality.betweenness,
                node.centrality.eigenvector,
            ] {
                prop_assert!((0.0..=1.0).contains(&score), "{} out of range", score);
            }
        }
    }

    #[test]
    fn repeated_analysis_is_deterministic(
        size in 2usize..40,
        seed in any::<u64>(),
        source in 0usize..1000,
        trigger in trigger(),
        magnitude in 0.0f64..3.0,
    ) {
        let first = engine(CascadeConfig::default(), size, 3, seed);
        let second = engine(CascadeConfig::default(), size, 3, seed);
        let source = pick(size, source);
        let a = first.analyze(source, trigger, magnitude);
        let b = second.analyze(source, trigger, magnitude);

        prop_assert_eq!(a.len(), b.len());
        for (left, right) in a.iter().zip(&b) {
            prop_assert_eq!(left.cascade_type, right.cascade_type);
            prop_assert_eq!(left.probability, right.probability);
            prop_assert_eq!(&left.affected, &right.affected);
            prop_assert_eq!(&left.id, &right.id);
        }
    }

    #[test]
    fn larger_magnitude_never_lowers_probability(
        size in 2usize..40,
        seed in any::<u64>(),
        source in 0usize..1000,
        kind in prop::sample::select(CascadeType::ALL.to_vec()),
        low in 0.0f64..3.0,
        extra in 0.0f64..3.0,
    ) {
        let config = CascadeConfig::default();
        let network = NetworkBuilder::new(Arc::new(config.clone()))
            .build(&synthetic_snapshot(size, 3, seed))
            .expect("synthetic snapshot builds");
        let source = source % size;
        let weak = propagate(&network, &config, source, kind, low);
        let strong = propagate(&network, &config, source, kind, low + extra);

        for reached in &weak {
            let matching = strong.iter().find(|other| other.node == reached.node);
            prop_assert!(matching.is_some(), "node dropped at higher magnitude");
            let matching = matching.unwrap();
            prop_assert!(matching.probability >= reached.probability);
            prop_assert_eq!(matching.distance, reached.distance);
            prop_assert!(matching.distance <= config.max_hops(kind));
        }
    }

    #[test]
    fn chains_terminate_within_wave_limit(
        size in 2usize..30,
        seed in any::<u64>(),
        source in 0usize..1000,
        trigger in trigger(),
        magnitude in 0.0f64..4.0,
        max_waves in 0usize..7,
    ) {
        let engine = engine(permissive(), size, 3, seed);
        let waves = engine.simulate_chain(pick(size, source), trigger, magnitude, Some(max_waves));
        prop_assert!(waves.len() <= max_waves);

        let mut seen = BTreeSet::new();
        for wave in &waves {
            prop_assert!(!wave.events.is_empty());
            let sources: BTreeSet<_> = wave.events.iter().map(|event| event.source).collect();
            for source in sources {
                prop_assert!(seen.insert(source), "territory triggered in two waves");
            }
        }
    }

    #[test]
    fn network_build_is_idempotent(
        size in 2usize..50,
        factions in 0usize..5,
        seed in any::<u64>(),
    ) {
        let snapshot = synthetic_snapshot(size, factions, seed);
        let builder = NetworkBuilder::new(Arc::new(CascadeConfig::default()));
        let first = builder.build(&snapshot).expect("first build");
        let second = NetworkBuilder::new(Arc::new(CascadeConfig::default()))
            .build(&snapshot)
            .expect("second build");

        prop_assert_eq!(first.edges(), second.edges());
        prop_assert_eq!(first.nodes(), second.nodes());
        prop_assert_eq!(first.structural_version(), second.structural_version());
        prop_assert_eq!(first.snapshot_hash(), second.snapshot_hash());
    }
}
