//! Simulation benchmarks for conquest_core.
//!
//! Run with: `cargo bench -p conquest_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use conquest_core::config::SimConfig;
use conquest_core::map::{BuildingSpec, MapData, ObstacleSpec};
use conquest_core::math::Vec2Fixed;
use conquest_core::simulation::Simulation;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

/// Four-faction grid with a ring of obstacles, roughly the size of the
/// portrait maps.
fn arena() -> MapData {
    let teams = ["player", "enemy", "green", "yellow"];
    let mut buildings = Vec::new();
    for row in 0..6 {
        for col in 0..4 {
            let team = if row == 0 || row == 5 {
                teams[(row / 5) * 2 + col / 2]
            } else {
                "neutral"
            };
            buildings.push(BuildingSpec::new(
                140.0 + 270.0 * f64::from(col as u8),
                160.0 + 320.0 * f64::from(row as u8),
                team,
                if team == "neutral" { 15 } else { 60 },
            ));
        }
    }
    let obstacles = (0..4)
        .map(|i| ObstacleSpec {
            x: 200.0 + 180.0 * f64::from(i as u8),
            y: 900.0,
            w: 80.0,
            h: 60.0,
        })
        .collect();
    MapData {
        buildings,
        obstacles,
        biome: None,
    }
}

pub fn simulation_benchmark(c: &mut Criterion) {
    let map = arena();

    c.bench_function("tick_1000_four_factions", |b| {
        b.iter_batched(
            || Simulation::from_map(SimConfig::default().with_seed(7), &map),
            |mut sim| {
                for _ in 0..1000 {
                    black_box(sim.tick());
                }
                sim.state_hash()
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("path_query_uncached", |b| {
        let p1 = Vec2Fixed::from_ints(140, 160);
        let p2 = Vec2Fixed::from_ints(950, 1760);
        b.iter_batched(
            || Simulation::from_map(SimConfig::default(), &map),
            |mut sim| black_box(sim.is_path_blocked(p1, p2)),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
