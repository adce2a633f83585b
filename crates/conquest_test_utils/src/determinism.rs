//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Captured games are re-rendered offline, so a run must be reproducible
//! from its map, config and seed. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   Positions and speeds use [`conquest_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: The obstruction cache is a `HashMap`, but
//!   it is only ever probed by key, never iterated.
//!
//! - **Ambient randomness**: Every roll goes through an injected
//!   [`RandomSource`] seeded from the config.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Building, soldier and AI rules in isolation
//! 2. **Property tests**: Random maps must still replay identically
//! 3. **Integration tests**: Whole games are reproducible
//! 4. **Parallel tests**: Running N simulations on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use conquest_core::random::RandomSource;
use conquest_core::simulation::Simulation;
use conquest_core::snapshot::WorldSnapshot;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use conquest_test_utils::determinism::verify_determinism;
/// use conquest_test_utils::fixtures::{duel_map, fast_config};
/// use conquest_core::simulation::Simulation;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     600, // 600 ticks each
///     || Simulation::from_map(fast_config(3), &duel_map()),
///     |sim| { sim.tick(); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run two identically built simulations and compare their final hashes.
pub fn verify_simulation_determinism<R, F>(setup_fn: F, num_ticks: u64) -> bool
where
    R: RandomSource,
    F: Fn() -> Simulation<R>,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    );
    result.is_deterministic
}

/// Run N simulations on scoped threads and collect their final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<R, F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    R: RandomSource,
    F: Fn() -> Simulation<R> + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// Useful for debugging non-determinism by finding exactly when
/// simulations start to differ.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<R, F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    R: RandomSource,
    F: Fn() -> Simulation<R>,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        let events1 = sim1.tick();
        let events2 = sim2.tick();

        if events1 != events2 || sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot survives a bincode round trip unchanged.
pub fn verify_snapshot_roundtrip<R: RandomSource>(sim: &Simulation<R>) -> bool {
    let snapshot = sim.snapshot();
    let Ok(bytes) = snapshot.to_bytes() else {
        return false;
    };
    WorldSnapshot::from_bytes(&bytes).is_ok_and(|restored| restored == snapshot)
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible maps for
/// property-based testing of the simulation.
pub mod strategies {
    use conquest_core::factions::Team;
    use conquest_core::map::{BuildingSpec, MapData, ObstacleSpec};
    use proptest::prelude::*;

    /// Any faction tag, neutral included.
    pub fn arb_team() -> impl Strategy<Value = Team> {
        prop::sample::select(Team::ALL.to_vec())
    }

    /// A map tag for `arb_team`, in a random case.
    pub fn arb_team_tag() -> impl Strategy<Value = String> {
        (arb_team(), any::<bool>()).prop_map(|(team, lower)| {
            if lower {
                team.tag().to_ascii_lowercase()
            } else {
                team.tag().to_string()
            }
        })
    }

    /// An optional building subtype.
    pub fn arb_kind() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some("NORMAL".to_string())),
            Just(Some("FACTORY".to_string())),
            Just(Some("BUNKER".to_string())),
        ]
    }

    /// A building somewhere on a 1080x1920 field.
    pub fn arb_building() -> impl Strategy<Value = BuildingSpec> {
        (0u16..1080, 0u16..1920, arb_team_tag(), 0i64..200, arb_kind()).prop_map(
            |(x, y, team, count, kind)| BuildingSpec {
                x: f64::from(x),
                y: f64::from(y),
                team,
                count,
                kind,
            },
        )
    }

    /// A modest obstacle on the same field.
    pub fn arb_obstacle() -> impl Strategy<Value = ObstacleSpec> {
        (0u16..1000, 0u16..1850, 20u16..250, 20u16..200).prop_map(|(x, y, w, h)| ObstacleSpec {
            x: f64::from(x),
            y: f64::from(y),
            w: f64::from(w),
            h: f64::from(h),
        })
    }

    /// A complete map with 2..`max_buildings` buildings and up to
    /// `max_obstacles` obstacles.
    pub fn arb_map(max_buildings: usize, max_obstacles: usize) -> impl Strategy<Value = MapData> {
        (
            proptest::collection::vec(arb_building(), 2..max_buildings),
            proptest::collection::vec(arb_obstacle(), 0..max_obstacles),
        )
            .prop_map(|(buildings, obstacles)| MapData {
                buildings,
                obstacles,
                biome: None,
            })
    }

    /// A simulation seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{duel_map, fast_config, free_for_all_map, skirmish_map};
    use proptest::prelude::*;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_empty_simulation_determinism() {
        assert!(verify_simulation_determinism(
            || Simulation::new(fast_config(0)),
            100
        ));
    }

    #[test]
    fn test_duel_determinism() {
        assert!(verify_simulation_determinism(
            || Simulation::from_map(fast_config(11), &duel_map()),
            1500
        ));
    }

    #[test]
    fn test_find_divergence_on_deterministic_sim() {
        let divergence =
            find_first_divergence(|| Simulation::from_map(fast_config(5), &skirmish_map()), 800);
        assert!(divergence.is_none(), "Expected no divergence");
    }

    #[test]
    fn test_parallel_free_for_all() {
        let result = run_parallel_simulations(
            || Simulation::from_map(fast_config(9), &free_for_all_map()),
            4,
            600,
        );
        result.assert_deterministic();
        assert_eq!(result.unique_hashes().len(), 1);
    }

    #[test]
    fn test_snapshot_roundtrip_mid_game() {
        let mut sim = Simulation::from_map(fast_config(2), &skirmish_map());
        sim.run_until_finished(300);
        assert!(verify_snapshot_roundtrip(&sim));
    }

    #[test]
    fn test_different_seeds_can_differ() {
        // Not guaranteed for every pair, but these two diverge within a
        // few AI decisions on the skirmish map.
        let hashes: Vec<u64> = (0..4)
            .map(|seed| {
                let mut sim = Simulation::from_map(fast_config(seed), &skirmish_map());
                sim.run_until_finished(2000);
                sim.state_hash()
            })
            .collect();
        let mut unique = hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        assert!(unique.len() > 1, "all seeds produced {hashes:?}");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_random_maps_replay_identically(
            map in strategies::arb_map(8, 4),
            seed in strategies::arb_seed(),
        ) {
            let result = verify_determinism(
                2,
                400,
                || Simulation::from_map(fast_config(seed), &map),
                |sim| { sim.tick(); },
                Simulation::state_hash,
            );
            prop_assert!(result.is_deterministic);
        }
    }
}
