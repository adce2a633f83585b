//! # Conquest Core
//!
//! Deterministic simulation core for the Conquest territory-control game.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No audio
//! - No ambient randomness (every roll goes through [`random::RandomSource`])
//! - No floating-point positional math (uses fixed-point)
//!
//! This separation enables:
//! - Headless stepping under external control
//! - Offline frame capture
//! - Batch balance runs
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`geometry`] - Segment and rectangle intersection
//! - [`buildings`] - Troop generators and their subtypes
//! - [`soldiers`] - Units in flight and hit resolution
//! - [`ai`] - Computer opponent heuristic
//! - [`simulation`] - Tick orchestration, dispatch, obstruction, victory
//! - [`map`] - Map file format
//! - [`config`] - Tuning values
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod buildings;
pub mod config;
pub mod error;
pub mod events;
pub mod factions;
pub mod geometry;
pub mod map;
pub mod math;
pub mod random;
pub mod simulation;
pub mod snapshot;
pub mod soldiers;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{AiAgent, AttackCommand};
    pub use crate::buildings::{Building, BuildingId, BuildingKind};
    pub use crate::config::SimConfig;
    pub use crate::error::{GameError, Result};
    pub use crate::events::{Outcome, SimEvent, TickEvents};
    pub use crate::factions::Team;
    pub use crate::geometry::Rect;
    pub use crate::map::{BuildingSpec, MapData, ObstacleSpec};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::random::{RandomSource, SeededRandom};
    pub use crate::simulation::Simulation;
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::soldiers::{ScheduledSpawn, Soldier};
}
