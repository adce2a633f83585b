//! Buildings: the map's capturable troop generators.
//!
//! A building is created at map load and never destroyed. Ownership moves
//! between factions through captures; troops accumulate through passive
//! generation and reinforcement and are spent by dispatches and hostile
//! arrivals.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::factions::Team;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Index of a building in the simulation's building list.
///
/// Indices are assigned at map load and stay valid for the whole run.
pub type BuildingId = usize;

/// Structural subtype of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildingKind {
    /// Plain generator.
    #[default]
    Normal,
    /// Generates troops twice as fast.
    Factory,
    /// May block hostile damage while owned.
    Bunker,
}

impl BuildingKind {
    /// Divisor applied to the base spawn interval.
    #[must_use]
    pub fn spawn_rate_multiplier(self) -> Fixed {
        match self {
            Self::Factory => Fixed::from_num(2),
            Self::Normal | Self::Bunker => Fixed::ONE,
        }
    }

    /// Canonical upper-case name.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Factory => "FACTORY",
            Self::Bunker => "BUNKER",
        }
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Returned for a building type outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown building type '{0}'")]
pub struct UnknownBuildingKind(pub String);

impl FromStr for BuildingKind {
    type Err = UnknownBuildingKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(Self::Normal),
            "FACTORY" => Ok(Self::Factory),
            "BUNKER" => Ok(Self::Bunker),
            _ => Err(UnknownBuildingKind(s.to_string())),
        }
    }
}

/// A capturable building.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Building {
    /// Centre point.
    pub position: Vec2Fixed,
    /// Current owner.
    pub team: Team,
    /// Troops garrisoned. Kept within `0..=max_count` between ticks.
    pub count: i32,
    /// Structural subtype.
    pub kind: BuildingKind,
    /// Ticks accumulated toward the next passive increment.
    pub spawn_counter: u32,
    /// Cosmetic highlight, 1 on generation and decaying toward 0.
    #[serde(with = "fixed_serde")]
    pub pulse: Fixed,
}

impl Building {
    /// Create a building with an idle counter and no pulse.
    #[must_use]
    pub fn new(position: Vec2Fixed, team: Team, count: i32, kind: BuildingKind) -> Self {
        Self {
            position,
            team,
            count,
            kind,
            spawn_counter: 0,
            pulse: Fixed::ZERO,
        }
    }

    /// Whether this building currently mitigates hostile hits.
    #[must_use]
    pub fn is_fortified(&self) -> bool {
        self.kind == BuildingKind::Bunker && !self.team.is_neutral()
    }

    /// Ticks needed for the next passive increment at the given intensity.
    #[must_use]
    pub fn spawn_interval(&self, config: &SimConfig, intensity: Fixed) -> Fixed {
        config.soldier.spawn_interval / self.kind.spawn_rate_multiplier() / intensity
    }

    /// Advance one tick: decay the pulse and run passive generation.
    ///
    /// Neutral buildings and buildings at the cap do not accumulate.
    /// Returns true when a troop was generated.
    pub fn update(&mut self, config: &SimConfig, intensity: Fixed) -> bool {
        if self.pulse > pulse_floor() {
            self.pulse *= pulse_decay();
        }

        if self.team.is_neutral() || self.count >= config.building.max_count {
            return false;
        }

        self.spawn_counter = self.spawn_counter.saturating_add(1);
        if Fixed::saturating_from_num(self.spawn_counter) >= self.spawn_interval(config, intensity)
        {
            self.count += 1;
            self.spawn_counter = 0;
            self.pulse = Fixed::ONE;
            return true;
        }
        false
    }
}

fn pulse_decay() -> Fixed {
    Fixed::from_num(0.9)
}

fn pulse_floor() -> Fixed {
    Fixed::from_num(0.01)
}
