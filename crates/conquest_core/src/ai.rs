//! Computer opponent.
//!
//! Each non-neutral faction gets one [`AiAgent`]. An agent waits out a
//! cooldown, then picks a random building of its own with enough troops
//! and sends it at the cheapest reachable rival or neutral building.
//! "Cheapest" is a weighted mix of distance and defender count, with a
//! surcharge on neutral targets so the agent prefers fighting to
//! expanding when costs are close.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buildings::{Building, BuildingId};
use crate::config::AiConfig;
use crate::factions::Team;
use crate::math::Fixed;
use crate::random::RandomSource;

/// Number of best-scored targets a mistaken pick chooses among.
const MISTAKE_POOL: usize = 3;

/// An attack the agent wants dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttackCommand {
    /// Sending building.
    pub from: BuildingId,
    /// Receiving building.
    pub to: BuildingId,
}

/// Per-faction decision state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AiAgent {
    /// Faction this agent plays.
    pub team: Team,
    /// Polls since the last issued command.
    pub cooldown_counter: u32,
}

impl AiAgent {
    /// Create an agent for `team` with a fresh cooldown.
    #[must_use]
    pub fn new(team: Team) -> Self {
        Self {
            team,
            cooldown_counter: 0,
        }
    }

    /// Decide on at most one attack.
    ///
    /// `is_blocked(from, to)` reports whether the straight path between two
    /// buildings is obstructed. The counter resets only when a command is
    /// returned, so an agent with nothing to do retries on the next poll.
    pub fn poll<R, F>(
        &mut self,
        buildings: &[Building],
        config: &AiConfig,
        rng: &mut R,
        mut is_blocked: F,
    ) -> Option<AttackCommand>
    where
        R: RandomSource + ?Sized,
        F: FnMut(BuildingId, BuildingId) -> bool,
    {
        self.cooldown_counter = self.cooldown_counter.saturating_add(1);
        if self.cooldown_counter < config.cooldown {
            return None;
        }

        let attackers: Vec<BuildingId> = buildings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.team == self.team && b.count > config.min_attack_count)
            .map(|(id, _)| id)
            .collect();
        if attackers.is_empty() {
            return None;
        }

        if !buildings.iter().any(|b| b.team != self.team) {
            return None;
        }

        let from = attackers[rng.pick(attackers.len())];

        let mut candidates: Vec<(BuildingId, Fixed)> = buildings
            .iter()
            .enumerate()
            .filter(|(id, b)| b.team != self.team && !is_blocked(from, *id))
            .map(|(id, b)| (id, score_target(&buildings[from], b, config)))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        candidates.sort_by(|a, b| a.1.cmp(&b.1));

        let mistake = rng.chance(config.error_chance);
        let index = if mistake && candidates.len() >= MISTAKE_POOL {
            rng.pick(MISTAKE_POOL)
        } else {
            0
        };
        let to = candidates[index].0;

        self.cooldown_counter = 0;
        debug!(team = %self.team, from, to, mistake, "AI attack");
        Some(AttackCommand { from, to })
    }
}

/// Cost of attacking `target` from `from`. Lower is better.
#[must_use]
pub fn score_target(from: &Building, target: &Building, config: &AiConfig) -> Fixed {
    let distance = from.position.distance(target.position);
    let base = distance * config.distance_weight + Fixed::from_num(target.count) * config.count_weight;
    if target.team.is_neutral() {
        base * config.neutral_multiplier
    } else {
        base
    }
}
