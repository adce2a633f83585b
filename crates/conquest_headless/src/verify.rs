//! Determinism verification.
//!
//! Runs one map under one seed several times and compares the state hash
//! after every tick. Any difference means something outside the seed leaks
//! into the simulation.

use conquest_core::config::SimConfig;
use conquest_core::map::MapData;
use conquest_core::simulation::Simulation;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Result of a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Seed under test
    pub seed: u64,
    /// Number of runs compared
    pub runs: u32,
    /// Ticks simulated by the reference run
    pub ticks: u64,
    /// Final hash of each run
    pub final_hashes: Vec<u64>,
    /// First tick where some run disagreed with the reference run
    pub first_divergence: Option<u64>,
}

impl VerifyReport {
    /// Whether every run matched the first one on every tick.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.first_divergence.is_none() && self.final_hashes.windows(2).all(|w| w[0] == w[1])
    }
}

fn hash_trace(config: &SimConfig, map: &MapData, max_ticks: u64) -> Vec<u64> {
    let mut sim = Simulation::from_map(config.clone(), map);
    let mut trace = vec![sim.state_hash()];
    while !sim.is_finished() && sim.get_tick() < max_ticks {
        sim.tick();
        trace.push(sim.state_hash());
    }
    trace
}

/// Run `map` `runs` times with `config`, up to `max_ticks` each.
#[must_use]
pub fn verify_determinism(config: &SimConfig, map: &MapData, runs: u32, max_ticks: u64) -> VerifyReport {
    let reference = hash_trace(config, map, max_ticks);
    let mut final_hashes = vec![reference.last().copied().unwrap_or_default()];
    let mut first_divergence: Option<u64> = None;

    for run in 1..runs {
        let trace = hash_trace(config, map, max_ticks);
        final_hashes.push(trace.last().copied().unwrap_or_default());

        let diverged = reference
            .iter()
            .zip(&trace)
            .position(|(a, b)| a != b)
            .or_else(|| (reference.len() != trace.len()).then_some(reference.len().min(trace.len())));

        if let Some(index) = diverged {
            let tick = index as u64;
            warn!(run, tick, "Run diverged from reference");
            first_divergence = Some(first_divergence.map_or(tick, |t| t.min(tick)));
        } else {
            debug!(run, "Run matches reference");
        }
    }

    VerifyReport {
        seed: config.seed,
        runs: runs.max(1),
        ticks: (reference.len() - 1) as u64,
        final_hashes,
        first_divergence,
    }
}
