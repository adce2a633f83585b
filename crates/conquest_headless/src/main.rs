//! Headless Conquest runner.
//!
//! Runs the simulation without graphics, controlled via JSON on stdin/stdout
//! or driven to completion by one of the batch subcommands.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p conquest_headless -- run --map maps/skirmish.json
//!
//! # Play one game and print a JSON summary
//! cargo run -p conquest_headless -- play --map maps/skirmish.json --seed 7
//!
//! # Record every tick for offline rendering
//! cargo run -p conquest_headless -- capture --map maps/skirmish.json --output frames.bin
//!
//! # Run batch balance test
//! cargo run -p conquest_headless -- batch --map maps/skirmish.json --count 1000 --output results/
//!
//! # Verify determinism
//! cargo run -p conquest_headless -- verify --map maps/skirmish.json --runs 5
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conquest_core::config::SimConfig;
use conquest_core::map::MapData;
use conquest_core::simulation::Simulation;
use conquest_headless::{
    batch::{run_batch, run_game, BatchConfig, BatchResults, DEFAULT_MAX_TICKS},
    capture::{record_to_file, CaptureHeader},
    load_sim_config,
    runner::HeadlessRunner,
    verify::verify_determinism,
};

#[derive(Parser)]
#[command(name = "conquest_headless")]
#[command(about = "Headless Conquest runner for automation, capture and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Simulation config (RON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Ticks per second; frame-based values are rescaled to match
    #[arg(long, global = true)]
    tick_rate: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the stepping protocol on stdin/stdout
    Run {
        /// Map to load before the first command
        #[arg(short, long)]
        map: Option<PathBuf>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Play one game and print a JSON summary
    Play {
        /// Map file (JSON or RON)
        #[arg(short, long)]
        map: PathBuf,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Stop after this many ticks
        #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
        max_ticks: u64,
    },

    /// Record every tick to a capture file
    Capture {
        /// Map file (JSON or RON)
        #[arg(short, long)]
        map: PathBuf,

        /// Capture file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Stop after this many ticks
        #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
        max_ticks: u64,
    },

    /// Run many seeds in parallel and tally the winners
    Batch {
        /// Map file (JSON or RON)
        #[arg(short, long)]
        map: PathBuf,

        /// Number of games to run
        #[arg(short = 'n', long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Stop each game after this many ticks
        #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
        max_ticks: u64,

        /// Directory for batch_results.json; summary goes to stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Map file (JSON or RON)
        #[arg(short, long)]
        map: PathBuf,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Stop each run after this many ticks
        #[arg(long, default_value = "3600")]
        max_ticks: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for protocol and summaries
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let config_path = cli.config.as_deref();
    let settings = |seed: Option<u64>| -> SimConfig {
        load_sim_config(config_path, cli.tick_rate, seed).unwrap_or_else(|e| fatal(&e))
    };

    match cli.command {
        Some(Commands::Run { map, seed }) => cmd_run(settings(seed), map.as_deref()),
        Some(Commands::Play {
            map,
            seed,
            max_ticks,
        }) => cmd_play(settings(seed), &map, max_ticks),
        Some(Commands::Capture {
            map,
            output,
            seed,
            max_ticks,
        }) => cmd_capture(settings(seed), &map, &output, max_ticks),
        Some(Commands::Batch {
            map,
            count,
            parallel,
            seed,
            max_ticks,
            output,
        }) => {
            let config = BatchConfig::new(&map.display().to_string(), count)
                .with_seed(seed)
                .with_max_ticks(max_ticks)
                .with_parallelism(parallel);
            cmd_batch(&settings(None), &map, config, output.as_deref());
        }
        Some(Commands::Verify {
            map,
            seed,
            runs,
            max_ticks,
        }) => cmd_verify(&settings(Some(seed)), &map, runs, max_ticks),
        None => cmd_run(settings(None), None),
    }
}

fn fatal(error: &dyn std::fmt::Display) -> ! {
    tracing::error!(error = %error, "Fatal error");
    eprintln!("FATAL: {error}");
    std::process::exit(1);
}

fn load_map(path: &Path) -> MapData {
    MapData::load(path).unwrap_or_else(|e| fatal(&e))
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => fatal(&e),
    }
}

/// Serve the stepping protocol
fn cmd_run(config: SimConfig, map: Option<&Path>) {
    let mut runner = match map {
        Some(path) => HeadlessRunner::with_map(config, &load_map(path)),
        None => HeadlessRunner::new(config),
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(e) = runner.run(stdin.lock(), stdout.lock()) {
        fatal(&e);
    }
}

/// Play one game to the end
fn cmd_play(config: SimConfig, map_path: &Path, max_ticks: u64) {
    let map = load_map(map_path);
    tracing::info!(map = %map_path.display(), seed = config.seed, "Playing game");
    let result = run_game(config, &map, max_ticks);
    print_json(&result);
}

/// Record a game for offline rendering
fn cmd_capture(config: SimConfig, map_path: &Path, output: &Path, max_ticks: u64) {
    let map = load_map(map_path);
    let header = CaptureHeader::new(config.seed, config.tick_rate, map.biome.clone());
    let mut sim = Simulation::from_map(config, &map);

    match record_to_file(&mut sim, &header, output, max_ticks) {
        Ok(summary) => print_json(&summary),
        Err(e) => fatal(&e),
    }
}

/// Run batch of games for balance testing
fn cmd_batch(config: &SimConfig, map_path: &Path, batch: BatchConfig, output: Option<&Path>) {
    let map = load_map(map_path);
    let results = run_batch(batch, config, &map);

    match output {
        Some(dir) => {
            let path = BatchResults::default_path(dir);
            if let Err(e) = results.save(&path) {
                fatal(&e);
            }
            tracing::info!(path = %path.display(), "Results saved");
            print_json(&results.summary);
        }
        None => print_json(&results),
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", results.summary.total_games);
    for (outcome, wins) in &results.summary.wins {
        eprintln!(
            "  {:<10} {:>5} ({:.1}%)",
            outcome,
            wins,
            results.summary.win_rate(outcome) * 100.0
        );
    }
    if results.summary.undecided > 0 {
        eprintln!("  {:<10} {:>5}", "undecided", results.summary.undecided);
    }
}

/// Verify determinism
fn cmd_verify(config: &SimConfig, map_path: &Path, runs: u32, max_ticks: u64) {
    let map = load_map(map_path);
    tracing::info!(seed = config.seed, runs, "Verifying determinism");

    let report = verify_determinism(config, &map, runs, max_ticks);
    print_json(&report);

    if report.is_deterministic() {
        eprintln!("PASS: {} runs, {} ticks, identical hashes", report.runs, report.ticks);
    } else {
        eprintln!(
            "FAIL: runs diverged at tick {}",
            report.first_divergence.unwrap_or(report.ticks)
        );
        std::process::exit(1);
    }
}
