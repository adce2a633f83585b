//! Soldiers in flight and the spawns that will become them.
//!
//! A dispatch does not create soldiers directly. It queues one
//! [`ScheduledSpawn`] per troop with staggered delays; each record turns
//! into a [`Soldier`] when its countdown runs out. Soldiers travel in a
//! straight line and resolve combat exactly once on arrival.

use serde::{Deserialize, Serialize};

use crate::buildings::{Building, BuildingId};
use crate::config::SimConfig;
use crate::factions::Team;
use crate::math::Vec2Fixed;
use crate::random::RandomSource;

/// A pending soldier waiting out its dispatch delay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduledSpawn {
    /// Where the soldier will appear.
    pub origin: Vec2Fixed,
    /// Building it will walk to.
    pub target: BuildingId,
    /// Faction at dispatch time.
    pub team: Team,
    /// Ticks left. Decremented before it is tested, so 0 spawns next tick.
    pub frames_left: u32,
}

impl ScheduledSpawn {
    /// Count down one tick. Returns true once the soldier is due.
    pub fn countdown(&mut self) -> bool {
        self.frames_left = self.frames_left.saturating_sub(1);
        self.frames_left == 0
    }

    /// The soldier this record becomes.
    #[must_use]
    pub fn materialize(&self) -> Soldier {
        Soldier::new(self.origin, self.target, self.team)
    }
}

/// What an arrival did to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitOutcome {
    /// Reinforcement or damage. `target_team` is the owner after the hit.
    Hit {
        /// Arriving faction.
        team: Team,
        /// Owner after resolution.
        target_team: Team,
    },
    /// Ownership flipped to the arriving faction.
    Capture {
        /// New owner.
        team: Team,
    },
}

/// A unit walking toward a building.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Soldier {
    /// Current position.
    pub position: Vec2Fixed,
    /// Destination building.
    pub target: BuildingId,
    /// Faction at creation; never changes.
    pub team: Team,
    /// Arrived at the target.
    pub reached: bool,
    /// Combat already resolved. Nothing mutates the soldier afterwards.
    pub has_hit: bool,
}

impl Soldier {
    /// Create a soldier at `position` heading for `target`.
    #[must_use]
    pub fn new(position: Vec2Fixed, target: BuildingId, team: Team) -> Self {
        Self {
            position,
            target,
            team,
            reached: false,
            has_hit: false,
        }
    }

    /// Advance one tick toward `destination`.
    ///
    /// Within the hit radius the soldier arrives instead of moving and this
    /// returns true. The caller then resolves [`Soldier::hit`].
    pub fn advance(&mut self, destination: Vec2Fixed, config: &SimConfig) -> bool {
        if self.reached {
            return true;
        }

        let offset = destination - self.position;
        if offset.dot(offset) < config.combat.hit_radius_squared() {
            self.reached = true;
            return true;
        }

        let step = offset.normalize().scale(config.soldier.speed);
        self.position = self.position + step;
        false
    }

    /// Resolve arrival against `target`.
    ///
    /// A friendly arrival reinforces up to the cap. A hostile arrival deals
    /// damage, which an owned bunker may block; driving the count below
    /// zero captures the building with one troop. Returns `None` if this
    /// soldier has already hit.
    pub fn hit<R: RandomSource + ?Sized>(
        &mut self,
        target: &mut Building,
        config: &SimConfig,
        rng: &mut R,
    ) -> Option<HitOutcome> {
        if self.has_hit {
            return None;
        }
        self.has_hit = true;

        if target.team == self.team {
            target.count = (target.count + 1).min(config.building.max_count);
            return Some(HitOutcome::Hit {
                team: self.team,
                target_team: target.team,
            });
        }

        let blocked =
            target.is_fortified() && rng.chance(config.combat.bunker_block_chance);
        let damage = if blocked { 0 } else { config.combat.damage };
        target.count -= damage;

        if target.count < 0 {
            target.team = self.team;
            target.count = 1;
            return Some(HitOutcome::Capture { team: self.team });
        }

        Some(HitOutcome::Hit {
            team: self.team,
            target_team: target.team,
        })
    }
}
