mod common;

use std::sync::Arc;
use std::thread;

use bevy_ecs::world::World;
use cascade_core::{synthetic_snapshot, CascadeEngine, CascadeError, CascadeTrigger, TerritoryId};
use cascade_schema::InfluenceRecord;

#[test]
fn readers_keep_a_consistent_network_during_rebuilds() -> anyhow::Result<()> {
    common::ensure_test_config();
    let engine = Arc::new(CascadeEngine::from_env());
    engine.rebuild(&synthetic_snapshot(48, 4, 1))?;

    let readers: Vec<_> = (0..4)
        .map(|reader| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for round in 0..25u32 {
                    let network = engine.network().expect("a network is always published");
                    let version = network.structural_version();
                    let source = TerritoryId(1 + (reader * 7 + round) % 48);
                    let _ = engine.analyze(source, CascadeTrigger::StrategicNodeLoss, 1.2);
                    // The Arc we hold never changes underneath us.
                    assert_eq!(network.structural_version(), version);
                    assert_eq!(network.node_count(), 48);
                }
            })
        })
        .collect();

    for seed in 2..6 {
        engine.rebuild(&synthetic_snapshot(48, 4, seed))?;
    }
    for reader in readers {
        reader.join().expect("reader thread panicked");
    }

    let metrics = engine.metrics();
    assert_eq!(metrics.rebuilds, 5);
    assert_eq!(metrics.requests, 100);
    Ok(())
}

#[test]
fn invalid_snapshot_leaves_previous_network_published() -> anyhow::Result<()> {
    let engine = common::engine_with("star_snapshot.json")?;
    let published = engine.network().expect("star network published");

    let mut broken = common::load_snapshot("star_snapshot.json")?;
    broken.influence.push(InfluenceRecord {
        territory_id: TerritoryId(99),
        faction_id: cascade_core::FactionId(1),
        influence_level: 10.0,
    });
    let err = engine.rebuild(&broken.finalize()).unwrap_err();
    assert!(matches!(err, CascadeError::InvalidSnapshot { .. }));

    let mut out_of_range = common::load_snapshot("star_snapshot.json")?;
    out_of_range.influence[0].influence_level = 140.0;
    assert!(matches!(
        engine.rebuild(&out_of_range),
        Err(CascadeError::InvalidSnapshot { .. })
    ));

    let current = engine.network().expect("network still published");
    assert!(Arc::ptr_eq(&published, &current));
    assert!(!engine
        .analyze(TerritoryId(1), CascadeTrigger::TerritoryLoss, 1.5)
        .is_empty());
    Ok(())
}

#[test]
fn identical_rebuild_reuses_cached_centrality() -> anyhow::Result<()> {
    let engine = common::engine_with("star_snapshot.json")?;
    let first = engine.network().expect("published");
    let second = engine.rebuild(&common::load_snapshot("star_snapshot.json")?)?;

    assert_eq!(first.structural_version(), second.structural_version());
    let metrics = engine.metrics();
    assert_eq!((metrics.cache_hits, metrics.cache_misses), (1, 1));
    Ok(())
}

#[test]
fn engine_is_shared_through_the_world() -> anyhow::Result<()> {
    let engine = common::engine_with("star_snapshot.json")?;
    let mut world = World::new();
    world.insert_resource(engine);

    let engine = world.resource::<CascadeEngine>();
    let waves = engine.simulate_chain(TerritoryId(1), CascadeTrigger::TerritoryLoss, 1.5, Some(2));
    assert!(!waves.is_empty() && waves.len() <= 2);
    Ok(())
}
