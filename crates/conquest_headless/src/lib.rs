//! Headless game runner for automation, capture and CI verification.
//!
//! This crate drives the Conquest simulation without graphics. The
//! simulation only advances when a controller tells it to, which enables:
//!
//! - **Manual stepping**: An external process steps ticks over JSON lines
//! - **Frame capture**: Record every tick for offline rendering
//! - **Batch balance runs**: Many seeds in parallel, tallied by winner
//! - **Determinism checks**: Same seed, same hashes, every time
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (step, query, send, etc.)
//! - **stdout**: Responses (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See [`protocol`] module for the full command/response reference.
//!
//! # Example
//!
//! ```bash
//! # Step interactively
//! echo '{"cmd":"step","count":60}' | cargo run -p conquest_headless -- run --map maps/skirmish.json
//!
//! # Record a game for rendering
//! cargo run -p conquest_headless -- capture --map maps/skirmish.json --output frames.bin
//!
//! # Verify determinism
//! cargo run -p conquest_headless -- verify --map maps/skirmish.json --runs 5
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod batch;
pub mod capture;
pub mod protocol;
pub mod runner;
pub mod verify;

use std::path::Path;

use conquest_core::config::SimConfig;
use conquest_core::error::Result;

pub use batch::{run_batch, run_game, BatchConfig, BatchResults, BatchSummary, GameResult};
pub use capture::{CaptureError, CaptureFrame, CaptureHeader, CaptureReader, CaptureWriter};
pub use protocol::{Command, ProtocolError, Response};
pub use runner::HeadlessRunner;
pub use verify::{verify_determinism, VerifyReport};

/// Build the simulation config from an optional RON file plus overrides.
///
/// Frame-based values are rescaled when `tick_rate` differs from the
/// file's rate. The result is validated.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the values are invalid.
pub fn load_sim_config(
    path: Option<&Path>,
    tick_rate: Option<u32>,
    seed: Option<u64>,
) -> Result<SimConfig> {
    let mut config = match path {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(rate) = tick_rate {
        config = config.scaled_to_tick_rate(rate);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_with_overrides() {
        let config = load_sim_config(None, Some(30), Some(9)).unwrap();
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.seed, 9);
        assert_eq!(config.ai.cooldown, 23);
    }

    #[test]
    fn test_low_tick_rate_is_rejected() {
        assert!(load_sim_config(None, Some(10), None).is_err());
        assert!(load_sim_config(None, Some(20), None).is_ok());
    }

    #[test]
    fn test_config_file_is_loaded() {
        let mut file = tempfile::Builder::new().suffix(".ron").tempfile().unwrap();
        writeln!(file, "(seed: 42, victory: (fast_finish: true))").unwrap();

        let config = load_sim_config(Some(file.path()), None, None).unwrap();
        assert_eq!(config.seed, 42);
        assert!(config.victory.fast_finish);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        assert!(load_sim_config(Some(Path::new("/nonexistent.ron")), None, None).is_err());
    }
}
