//! Simulation benchmarks for tactical_core.
//!
//! Run with: `cargo bench -p tactical_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use tactical_core::prelude::*;
use tactical_core::scenario::{TreasurePlacement, UnitPlacement};

/// A 32x32 field with two armies of `per_side` units and scattered gold.
fn crowded(per_side: i32) -> Scenario {
    let stats = Stats {
        strength: 5,
        precision: 50,
        constitution: 40,
        dexterity: 20,
        perception: 6,
        intelligence: 4,
        bravery: 70,
        greed: 30,
    };
    let kits = vec![
        BehaviourKit::Wander { teleport: false },
        BehaviourKit::Loot,
        BehaviourKit::Combat,
    ];

    let mut scenario = Scenario::sample();
    scenario.name = "Crowded field".to_string();
    scenario.width = 32;
    scenario.height = 32;
    scenario.terrain.clear();
    scenario.units = (0..per_side)
        .flat_map(|i| {
            let y = i % 32;
            let column = i / 32;
            [
                UnitPlacement::new("green", 1, (column, y), stats, kits.clone()),
                UnitPlacement::new("red", 2, (31 - column, y), stats, kits.clone()),
            ]
        })
        .collect();
    scenario.treasure = (0..16)
        .map(|i| TreasurePlacement::new(10, 8 + i, (i * 7) % 32))
        .collect();
    scenario
}

pub fn simulation_benchmark(c: &mut Criterion) {
    let dt = Fixed::from_num(0.1);

    for per_side in [8, 32] {
        let scenario = crowded(per_side);
        c.bench_function(&format!("tick_{}_units", per_side * 2), |b| {
            b.iter_batched(
                || scenario.build().expect("benchmark scenario builds"),
                |mut sim| {
                    for _ in 0..10 {
                        black_box(sim.tick(dt));
                    }
                    sim
                },
                BatchSize::SmallInput,
            );
        });
    }

    c.bench_function("state_hash_sample", |b| {
        let sim = Scenario::sample().build().expect("sample builds");
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
