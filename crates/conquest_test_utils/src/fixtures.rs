//! Test fixtures and helpers.
//!
//! Ready-made maps and configurations for consistent testing. Coordinates
//! follow the portrait 1080x1920 layout of the shipped maps.

use conquest_core::buildings::BuildingId;
use conquest_core::config::SimConfig;
use conquest_core::error::Result;
use conquest_core::factions::Team;
use conquest_core::map::{BuildingSpec, MapData, ObstacleSpec};
use conquest_core::random::RandomSource;
use conquest_core::simulation::Simulation;
use conquest_core::soldiers::Soldier;

use crate::random::ScriptedRandom;

/// Default config with the AI switched off and no intensity ramp.
///
/// Buildings still generate; nothing moves unless a test sends it.
#[must_use]
pub fn passive_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.ai.min_attack_count = i32::MAX;
    config.intensity.enabled = false;
    config
}

/// Default config that ends the run on the victory tick.
#[must_use]
pub fn fast_config(seed: u64) -> SimConfig {
    let mut config = SimConfig::default().with_seed(seed);
    config.victory.fast_finish = true;
    config
}

/// A map holding only the given buildings.
#[must_use]
pub fn map_of(buildings: Vec<BuildingSpec>) -> MapData {
    MapData {
        buildings,
        ..MapData::default()
    }
}

/// One building per side, facing each other down the middle.
///
/// Building 0 is PLAYER, building 1 is ENEMY.
#[must_use]
pub fn duel_map() -> MapData {
    map_of(vec![
        BuildingSpec::new(540.0, 1700.0, "PLAYER", 100),
        BuildingSpec::new(540.0, 220.0, "ENEMY", 100),
    ])
}

/// [`duel_map`] with a wall across the whole field.
#[must_use]
pub fn walled_duel_map() -> MapData {
    MapData {
        obstacles: vec![ObstacleSpec {
            x: -100.0,
            y: 900.0,
            w: 1280.0,
            h: 80.0,
        }],
        ..duel_map()
    }
}

/// Two factions, neutral buildings of every kind, and a few obstacles.
#[must_use]
pub fn skirmish_map() -> MapData {
    MapData {
        buildings: vec![
            BuildingSpec::new(540.0, 1728.0, "player", 150),
            BuildingSpec::new(200.0, 1500.0, "player", 40).with_kind("factory"),
            BuildingSpec::new(540.0, 192.0, "enemy", 150),
            BuildingSpec::new(880.0, 420.0, "enemy", 40).with_kind("bunker"),
            BuildingSpec::new(240.0, 1100.0, "neutral", 12),
            BuildingSpec::new(840.0, 1100.0, "neutral", 18).with_kind("factory"),
            BuildingSpec::new(240.0, 800.0, "neutral", 18).with_kind("bunker"),
            BuildingSpec::new(840.0, 800.0, "neutral", 12),
            BuildingSpec::new(540.0, 960.0, "neutral", 30),
        ],
        obstacles: vec![
            ObstacleSpec {
                x: 420.0,
                y: 1250.0,
                w: 240.0,
                h: 60.0,
            },
            ObstacleSpec {
                x: 420.0,
                y: 610.0,
                w: 240.0,
                h: 60.0,
            },
        ],
        biome: Some("TECH".to_string()),
    }
}

/// Four factions in the corners around a neutral centre.
#[must_use]
pub fn free_for_all_map() -> MapData {
    map_of(vec![
        BuildingSpec::new(150.0, 150.0, "player", 60),
        BuildingSpec::new(930.0, 150.0, "enemy", 60),
        BuildingSpec::new(150.0, 1770.0, "green", 60),
        BuildingSpec::new(930.0, 1770.0, "yellow", 60),
        BuildingSpec::new(540.0, 960.0, "neutral", 20),
    ])
}

/// A simulation with scripted randomness and the AI switched off.
#[must_use]
pub fn scripted_sim(map: &MapData, rng: ScriptedRandom) -> Simulation<ScriptedRandom> {
    let mut sim = Simulation::with_random(passive_config(), rng);
    sim.load_map(map);
    sim
}

/// Put a `team` soldier right on top of `target`, so it arrives on the
/// next tick.
///
/// # Errors
///
/// Returns an error if `target` is not a building of `sim`.
pub fn stage_arrival<R: RandomSource>(
    sim: &mut Simulation<R>,
    target: BuildingId,
    team: Team,
) -> Result<()> {
    let position = sim.building(target)?.position;
    sim.add_soldier(Soldier::new(position, target, team))
}
