//! Simulation tuning.
//!
//! Every gameplay constant lives in [`SimConfig`], which is handed to the
//! simulation at construction. Defaults are tuned for 60 ticks per
//! second; a RON file only needs to name the fields it changes.
//!
//! # Example RON
//!
//! ```ron
//! SimConfig(
//!     seed: 7,
//!     soldier: (speed: 6.0, send_delay: 3),
//!     ai: (cooldown: 30, error_chance: 0.0),
//!     victory: (fast_finish: true),
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{decimal_serde, Fixed};

/// Tick rate the default values are expressed in.
pub const BASE_TICK_RATE: u32 = 60;

/// Soldier movement and dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoldierConfig {
    /// Distance travelled per tick.
    #[serde(with = "decimal_serde")]
    pub speed: Fixed,
    /// Ticks between passive troop increments at a normal building.
    #[serde(with = "decimal_serde")]
    pub spawn_interval: Fixed,
    /// Fraction of a building's troops sent per dispatch.
    pub send_fraction: f64,
    /// Ticks between consecutive soldiers of one dispatch.
    pub send_delay: u32,
}

impl Default for SoldierConfig {
    fn default() -> Self {
        Self {
            speed: Fixed::from_num(4.5),
            spawn_interval: Fixed::from_num(30),
            send_fraction: 0.8,
            send_delay: 5,
        }
    }
}

/// Building limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingConfig {
    /// Troop cap for every building.
    pub max_count: i32,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self { max_count: 200 }
    }
}

/// Arrival and damage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// A soldier closer than this to its target has arrived.
    #[serde(with = "decimal_serde")]
    pub hit_radius: Fixed,
    /// Troops removed by one hostile arrival.
    pub damage: i32,
    /// Chance that an owned bunker shrugs off a hit.
    pub bunker_block_chance: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            hit_radius: Fixed::from_num(10),
            damage: 1,
            bunker_block_chance: 0.5,
        }
    }
}

impl CombatConfig {
    /// Squared hit radius, compared against squared distances.
    #[must_use]
    pub fn hit_radius_squared(&self) -> Fixed {
        self.hit_radius.saturating_mul(self.hit_radius)
    }
}

/// Opponent heuristic settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Polls between accepted commands.
    pub cooldown: u32,
    /// Chance of picking among the top three targets instead of the best.
    pub error_chance: f64,
    /// A building needs strictly more troops than this to attack.
    pub min_attack_count: i32,
    /// Weight of distance in the target score.
    #[serde(with = "decimal_serde")]
    pub distance_weight: Fixed,
    /// Weight of defender count in the target score.
    #[serde(with = "decimal_serde")]
    pub count_weight: Fixed,
    /// Score multiplier applied to neutral targets.
    #[serde(with = "decimal_serde")]
    pub neutral_multiplier: Fixed,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            cooldown: 45,
            error_chance: 0.05,
            min_attack_count: 20,
            distance_weight: Fixed::from_num(0.2),
            count_weight: Fixed::from_num(0.8),
            neutral_multiplier: Fixed::from_num(1.2),
        }
    }
}

/// Late-game generation speed-up that forces long games to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityConfig {
    /// Whether the multiplier grows at all.
    pub enabled: bool,
    /// Elapsed ticks before growth starts.
    pub start_tick: u64,
    /// Multiplier gained per elapsed second past `start_tick`.
    #[serde(with = "decimal_serde")]
    pub growth_per_second: Fixed,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_tick: 3600,
            growth_per_second: Fixed::from_num(0.05),
        }
    }
}

/// End-of-game behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VictoryConfig {
    /// Ticks the simulation keeps running after a victory.
    pub display_ticks: u32,
    /// Latch `finished` on the victory tick.
    pub fast_finish: bool,
}

impl Default for VictoryConfig {
    fn default() -> Self {
        Self {
            display_ticks: 120,
            fast_finish: false,
        }
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ticks per simulated second.
    pub tick_rate: u32,
    /// Seed for the default random source.
    pub seed: u64,
    /// Soldier settings.
    pub soldier: SoldierConfig,
    /// Building settings.
    pub building: BuildingConfig,
    /// Combat settings.
    pub combat: CombatConfig,
    /// AI settings.
    pub ai: AiConfig,
    /// Intensity ramp.
    pub intensity: IntensityConfig,
    /// Victory settings.
    pub victory: VictoryConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: BASE_TICK_RATE,
            seed: 0,
            soldier: SoldierConfig::default(),
            building: BuildingConfig::default(),
            combat: CombatConfig::default(),
            ai: AiConfig::default(),
            intensity: IntensityConfig::default(),
            victory: VictoryConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| GameError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = ron::from_str(&contents).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Same configuration with a different seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Rescale frame-based values to a different tick rate.
    ///
    /// Soldiers cover the same distance per second and every delay spans
    /// the same wall-clock time. Tick counts are rounded to the nearest
    /// whole tick and never drop below one. Low rates can push the
    /// per-tick speed past what [`SimConfig::validate`] accepts.
    #[must_use]
    pub fn scaled_to_tick_rate(mut self, tick_rate: u32) -> Self {
        if tick_rate == 0 || tick_rate == self.tick_rate {
            return self;
        }
        let scale = Fixed::from_num(self.tick_rate) / Fixed::from_num(tick_rate);
        let ticks = |value: u32| -> u32 {
            let scaled = (Fixed::from_num(value) / scale).round().to_num::<u32>();
            scaled.max(1)
        };

        self.soldier.speed *= scale;
        self.soldier.spawn_interval /= scale;
        self.soldier.send_delay = ticks(self.soldier.send_delay);
        self.ai.cooldown = ticks(self.ai.cooldown);
        self.victory.display_ticks = ticks(self.victory.display_ticks);
        self.intensity.start_tick =
            (Fixed::saturating_from_num(self.intensity.start_tick) / scale)
                .round()
                .saturating_to_num::<u64>();
        self.tick_rate = tick_rate;
        self
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        let probability = |name: &str, p: f64| {
            if (0.0..=1.0).contains(&p) {
                Ok(())
            } else {
                Err(GameError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {p}"
                )))
            }
        };

        if self.tick_rate == 0 {
            return Err(GameError::InvalidConfig("tick_rate must be positive".into()));
        }
        if self.soldier.speed <= Fixed::ZERO {
            return Err(GameError::InvalidConfig("soldier.speed must be positive".into()));
        }
        if self.combat.hit_radius <= Fixed::ZERO {
            return Err(GameError::InvalidConfig("combat.hit_radius must be positive".into()));
        }
        // A faster soldier can step across the hit circle and never arrive.
        if self.soldier.speed >= self.combat.hit_radius.saturating_mul(Fixed::from_num(2)) {
            return Err(GameError::InvalidConfig(format!(
                "soldier.speed ({}) must be below twice combat.hit_radius ({})",
                self.soldier.speed, self.combat.hit_radius
            )));
        }
        if self.soldier.spawn_interval <= Fixed::ZERO {
            return Err(GameError::InvalidConfig(
                "soldier.spawn_interval must be positive".into(),
            ));
        }
        if self.building.max_count < 1 {
            return Err(GameError::InvalidConfig(
                "building.max_count must be at least 1".into(),
            ));
        }
        if self.combat.damage < 0 {
            return Err(GameError::InvalidConfig(
                "combat.damage must not be negative".into(),
            ));
        }
        probability("soldier.send_fraction", self.soldier.send_fraction)?;
        probability("combat.bunker_block_chance", self.combat.bunker_block_chance)?;
        probability("ai.error_chance", self.ai.error_chance)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_tuning() {
        let config = SimConfig::default();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.soldier.speed, Fixed::from_num(4.5));
        assert_eq!(config.soldier.send_delay, 5);
        assert_eq!(config.building.max_count, 200);
        assert_eq!(config.ai.cooldown, 45);
        assert_eq!(config.ai.min_attack_count, 20);
        assert_eq!(config.combat.hit_radius_squared(), Fixed::from_num(100));
        assert_eq!(config.victory.display_ticks, 120);
        assert!(!config.victory.fast_finish);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_ron_keeps_other_defaults() {
        let config = SimConfig::from_ron_str(
            "(seed: 9, soldier: (speed: 6.0), victory: (fast_finish: true))",
        )
        .unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.soldier.speed, Fixed::from_num(6));
        assert_eq!(config.soldier.send_delay, 5);
        assert!(config.victory.fast_finish);
        assert_eq!(config.ai, AiConfig::default());
    }

    #[test]
    fn invalid_probability_is_rejected() {
        let err = SimConfig::from_ron_str("(ai: (error_chance: 1.5))").unwrap_err();
        assert!(matches!(err, GameError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_ron_is_a_parse_error() {
        let err = SimConfig::from_ron_str("(soldier: oops)").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { .. }));
    }

    #[test]
    fn halving_tick_rate_doubles_speed_and_halves_delays() {
        let config = SimConfig::default().scaled_to_tick_rate(30);
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.soldier.speed, Fixed::from_num(9));
        assert_eq!(config.soldier.spawn_interval, Fixed::from_num(15));
        assert_eq!(config.soldier.send_delay, 3);
        assert_eq!(config.ai.cooldown, 23);
        assert_eq!(config.victory.display_ticks, 60);
        assert_eq!(config.intensity.start_tick, 1800);
    }

    #[test]
    fn speed_that_overshoots_hit_radius_is_rejected() {
        let slow = SimConfig::default().scaled_to_tick_rate(10);
        assert_eq!(slow.soldier.speed, Fixed::from_num(27));
        assert!(matches!(slow.validate(), Err(GameError::InvalidConfig(_))));

        let err = SimConfig::from_ron_str("(soldier: (speed: 20.0))").unwrap_err();
        assert!(matches!(err, GameError::InvalidConfig(_)));
        assert!(SimConfig::from_ron_str("(soldier: (speed: 19.5))").is_ok());
    }

    #[test]
    fn same_tick_rate_is_unchanged() {
        assert_eq!(
            SimConfig::default().scaled_to_tick_rate(60),
            SimConfig::default()
        );
    }
}
