//! Batch game runner for balance testing.
//!
//! Runs the same map under many seeds in parallel using rayon and tallies
//! who won. Each game is still a single-threaded simulation with its own
//! seeded random source, so results do not depend on scheduling.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use conquest_core::config::SimConfig;
use conquest_core::events::Outcome;
use conquest_core::factions::Team;
use conquest_core::map::MapData;
use conquest_core::simulation::Simulation;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default tick limit: ten minutes of game time at 60 ticks per second.
pub const DEFAULT_MAX_TICKS: u64 = 36_000;

/// Configuration for a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Label for the map, recorded in the results
    pub map_name: String,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Starting seed for deterministic runs
    pub seed_start: u64,
    /// Maximum ticks per game
    pub max_ticks: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            map_name: "map".to_string(),
            game_count: 100,
            parallel_games: 0,
            seed_start: 0,
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }
}

impl BatchConfig {
    /// Create config for a named map
    #[must_use]
    pub fn new(map_name: &str, game_count: u32) -> Self {
        Self {
            map_name: map_name.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set seed start
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the per-game tick limit
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Set the worker count
    #[must_use]
    pub fn with_parallelism(mut self, parallel_games: u32) -> Self {
        self.parallel_games = parallel_games;
        self
    }
}

/// Outcome of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    /// Seed the game ran with
    pub seed: u64,
    /// Decided outcome, `None` if the tick limit hit first
    pub winner: Option<Outcome>,
    /// Ticks simulated
    pub ticks: u64,
    /// Whether the game reached its finished state
    pub finished: bool,
    /// Final state hash
    pub final_hash: u64,
    /// Buildings held per faction at the end
    pub buildings_owned: BTreeMap<String, usize>,
}

/// Play one game to completion or `max_ticks`.
#[must_use]
pub fn run_game(config: SimConfig, map: &MapData, max_ticks: u64) -> GameResult {
    let seed = config.seed;
    let mut sim = Simulation::from_map(config, map);
    sim.run_until_finished(max_ticks);

    let snapshot = sim.snapshot();
    let buildings_owned = Team::ALL
        .iter()
        .map(|&team| (team.to_string(), snapshot.buildings_owned(team)))
        .filter(|(_, owned)| *owned > 0)
        .collect();

    GameResult {
        seed,
        winner: sim.victory(),
        ticks: sim.get_tick(),
        finished: sim.is_finished(),
        final_hash: sim.state_hash(),
        buildings_owned,
    }
}

/// Aggregate statistics of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games played
    pub total_games: u32,
    /// Wins keyed by outcome (`PLAYER`, `NONE`, `MULTIPLE`, ...)
    pub wins: BTreeMap<String, u32>,
    /// Games that hit the tick limit undecided
    pub undecided: u32,
    /// Mean game length in ticks
    pub average_ticks: f64,
}

impl BatchSummary {
    /// Tally a set of results.
    #[must_use]
    pub fn from_games(games: &[GameResult]) -> Self {
        let mut summary = Self {
            total_games: u32::try_from(games.len()).unwrap_or(u32::MAX),
            ..Self::default()
        };
        for game in games {
            match game.winner {
                Some(outcome) => *summary.wins.entry(outcome.to_string()).or_insert(0) += 1,
                None => summary.undecided += 1,
            }
        }
        if !games.is_empty() {
            let total: u64 = games.iter().map(|g| g.ticks).sum();
            summary.average_ticks = total as f64 / games.len() as f64;
        }
        summary
    }

    /// Share of games won by `outcome`.
    #[must_use]
    pub fn win_rate(&self, outcome: &str) -> f64 {
        let wins = self.wins.get(outcome).copied().unwrap_or(0);
        f64::from(wins) / f64::from(self.total_games.max(1))
    }
}

/// Results from a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual games, in seed order
    pub games: Vec<GameResult>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }

    /// Default results path inside `dir`.
    #[must_use]
    pub fn default_path(dir: &Path) -> PathBuf {
        dir.join("batch_results.json")
    }
}

/// Run a batch of games
#[must_use]
pub fn run_batch(config: BatchConfig, sim_config: &SimConfig, map: &MapData) -> BatchResults {
    let start = Instant::now();
    let completed = AtomicU32::new(0);

    info!(
        "Starting batch run: {} games of '{}'",
        config.game_count, config.map_name
    );

    let play_all = || -> Vec<GameResult> {
        (0..config.game_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                let result = run_game(sim_config.clone().with_seed(seed), map, config.max_ticks);

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 10 == 0 {
                    debug!("Progress: {}/{}", done, config.game_count);
                }
                result
            })
            .collect()
    };

    let games = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build()
        {
            Ok(pool) => pool.install(play_all),
            Err(e) => {
                warn!("Failed to build thread pool: {}, using default", e);
                play_all()
            }
        }
    } else {
        play_all()
    };

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s ({:.1} games/sec)",
        games.len(),
        duration_seconds,
        games.len() as f64 / duration_seconds.max(f64::EPSILON)
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
    }
}
