//! Property tests: invariants that hold on every tick of arbitrary maps.

use conquest_core::config::SimConfig;
use conquest_core::events::SimEvent;
use conquest_core::factions::Team;
use conquest_core::map::MapData;
use conquest_core::math::Vec2Fixed;
use conquest_core::simulation::Simulation;
use conquest_test_utils::determinism::strategies::{arb_map, arb_obstacle, arb_seed};
use proptest::prelude::*;

fn short_game_config(seed: u64) -> SimConfig {
    let mut config = SimConfig::default().with_seed(seed);
    config.ai.cooldown = 10;
    config.victory.display_ticks = 30;
    config.intensity.start_tick = 200;
    config
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn counts_stay_within_cap(map in arb_map(10, 4), seed in arb_seed()) {
        let config = short_game_config(seed);
        let max = config.building.max_count;
        let mut sim = Simulation::from_map(config, &map);
        for _ in 0..600 {
            sim.tick();
            for building in sim.buildings() {
                prop_assert!(building.count >= 0 && building.count <= max,
                    "count {} out of range", building.count);
            }
        }
    }

    #[test]
    fn neutral_buildings_never_grow(map in arb_map(10, 4), seed in arb_seed()) {
        let mut sim = Simulation::from_map(short_game_config(seed), &map);
        for _ in 0..400 {
            let before: Vec<(Team, i32)> = sim.buildings().iter().map(|b| (b.team, b.count)).collect();
            sim.tick();
            for (after, (team, count)) in sim.buildings().iter().zip(before) {
                if team == Team::Neutral && after.team == Team::Neutral {
                    prop_assert!(after.count <= count);
                }
            }
        }
    }

    #[test]
    fn victory_and_finished_are_monotonic(map in arb_map(8, 3), seed in arb_seed()) {
        let mut sim = Simulation::from_map(short_game_config(seed), &map);
        let mut seen_victory = None;
        let mut seen_finished = false;
        let mut announcements = 0;
        for _ in 0..1500 {
            let events = sim.tick();
            announcements += events.iter().filter(|e| matches!(e, SimEvent::Victory { .. })).count();
            if let Some(previous) = seen_victory {
                prop_assert_eq!(sim.victory(), Some(previous));
            }
            seen_victory = sim.victory();
            if seen_finished {
                prop_assert!(sim.is_finished());
                prop_assert!(events.is_empty());
            }
            seen_finished = sim.is_finished();
        }
        prop_assert!(announcements <= 1);
    }

    #[test]
    fn obstruction_is_order_independent(
        obstacles in proptest::collection::vec(arb_obstacle(), 1..6),
        x1 in 0i32..1080, y1 in 0i32..1920, x2 in 0i32..1080, y2 in 0i32..1920,
    ) {
        let map = MapData { obstacles, ..MapData::default() };
        let a = Vec2Fixed::from_ints(x1, y1);
        let b = Vec2Fixed::from_ints(x2, y2);

        let mut forward = Simulation::from_map(SimConfig::default(), &map);
        let mut backward = Simulation::from_map(SimConfig::default(), &map);
        let first = forward.is_path_blocked(a, b);

        prop_assert_eq!(forward.is_path_blocked(a, b), first);
        prop_assert_eq!(backward.is_path_blocked(b, a), first);
    }
}

