use std::sync::Arc;

use cascade_core::{
    synthetic_snapshot, CascadeConfig, CascadeEngine, CascadeTrigger, CentralityMode,
    NetworkBuilder, TerritoryId,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

const SIZES: [usize; 3] = [64, 256, 1024];

/// Territory with the most neighbours, so every traversal has work to do.
fn busiest_territory(engine: &CascadeEngine) -> TerritoryId {
    let network = engine.network().expect("network published");
    (0..network.node_count())
        .max_by_key(|&index| network.degree(index))
        .map(|index| network.node(index).id)
        .expect("non-empty network")
}

fn bench_network_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("network_build");

    for size in SIZES {
        let snapshot = synthetic_snapshot(size, 6, 42);
        for mode in [CentralityMode::Full, CentralityMode::Approximate] {
            let label = match mode {
                CentralityMode::Full => "full",
                _ => "approximate",
            };
            group.bench_with_input(BenchmarkId::new(label, size), &snapshot, |b, snapshot| {
                b.iter_batched(
                    || {
                        NetworkBuilder::new(Arc::new(CascadeConfig {
                            centrality_mode: mode,
                            ..CascadeConfig::default()
                        }))
                    },
                    |builder| builder.build(snapshot).expect("synthetic snapshot builds"),
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_analyze");

    for size in SIZES {
        let engine = CascadeEngine::new(Arc::new(CascadeConfig::default()));
        engine
            .rebuild(&synthetic_snapshot(size, 6, 42))
            .expect("synthetic snapshot builds");
        let source = busiest_territory(&engine);

        group.bench_with_input(BenchmarkId::new("strategic_node_loss", size), &size, |b, _| {
            b.iter(|| engine.analyze(source, CascadeTrigger::StrategicNodeLoss, 1.5));
        });
    }

    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_chain");

    for size in SIZES {
        let engine = CascadeEngine::new(Arc::new(CascadeConfig::default()));
        engine
            .rebuild(&synthetic_snapshot(size, 6, 7))
            .expect("synthetic snapshot builds");
        let source = busiest_territory(&engine);

        group.bench_with_input(BenchmarkId::new("five_waves", size), &size, |b, _| {
            b.iter(|| engine.simulate_chain(source, CascadeTrigger::TerritoryLoss, 2.0, Some(5)));
        });
    }

    group.finish();
}

criterion_group!(propagation_benches, bench_network_build, bench_analyze, bench_chain);
criterion_main!(propagation_benches);
