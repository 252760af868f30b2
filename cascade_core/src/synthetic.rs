//! Reproducible synthetic snapshots for benchmarks, the CLI and tests.

use cascade_schema::{
    FactionBehaviorRecord, FactionId, InfluenceRecord, TerritoryId, TerritoryRecord,
    TerritorySnapshot,
};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const CATEGORIES: [&str; 3] = ["industrial", "corporate", "logistics"];
/// Grid pitch between territory anchors, below the base interaction distance.
const CELL_SIZE: f64 = 2000.0;
const JITTER: f64 = 600.0;

/// A snapshot of `territories` territories scattered over a jittered grid and
/// split between `factions` factions. Identical seeds give identical snapshots
/// on every platform.
pub fn synthetic_snapshot(territories: usize, factions: usize, seed: u64) -> TerritorySnapshot {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let faction_ids: Vec<FactionId> = (1..=factions as u32).map(FactionId).collect();
    let columns = (territories as f64).sqrt().ceil().max(1.0) as usize;

    let mut records = Vec::with_capacity(territories);
    let mut influence = Vec::new();
    for index in 0..territories {
        let id = TerritoryId(index as u32 + 1);
        let (row, column) = (index / columns, index % columns);
        let position = (
            column as f64 * CELL_SIZE + rng.gen_range(-JITTER..=JITTER),
            row as f64 * CELL_SIZE + rng.gen_range(-JITTER..=JITTER),
        );
        let controller = if rng.gen_bool(0.85) {
            faction_ids.choose(&mut rng).copied()
        } else {
            None
        };
        let category = if rng.gen_bool(0.4) {
            CATEGORIES.choose(&mut rng).map(|name| name.to_string())
        } else {
            None
        };

        let mut present: Vec<FactionId> = faction_ids
            .choose_multiple(&mut rng, faction_ids.len().min(3))
            .copied()
            .collect();
        present.sort();
        for faction in present {
            let level = if Some(faction) == controller {
                rng.gen_range(40.0..=90.0)
            } else {
                rng.gen_range(0.0..=40.0)
            };
            influence.push(InfluenceRecord {
                territory_id: id,
                faction_id: faction,
                influence_level: level,
            });
        }

        records.push(TerritoryRecord {
            id,
            name: format!("Sector {:04}", id.0),
            strategic_value: rng.gen_range(1..=10),
            controller_faction_id: controller,
            position,
            contested: rng.gen_bool(0.15),
            category,
        });
    }

    let behaviour = faction_ids
        .iter()
        .map(|&faction_id| FactionBehaviorRecord {
            faction_id,
            discipline: rng.gen_range(0.2..=0.9),
            aggression: rng.gen_range(0.0..=1.0),
            tech_level: rng.gen_range(0.0..=1.0),
        })
        .collect();

    TerritorySnapshot::new(records, influence, behaviour)
}
