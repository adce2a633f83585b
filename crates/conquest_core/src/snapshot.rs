//! Read-only world state for consumers.

use serde::{Deserialize, Serialize};

use crate::buildings::Building;
use crate::error::{GameError, Result};
use crate::events::Outcome;
use crate::factions::Team;
use crate::soldiers::Soldier;

/// Copy of everything a renderer or tool may look at after a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Ticks advanced since the map was loaded.
    pub tick: u64,
    /// Buildings in ID order.
    pub buildings: Vec<Building>,
    /// Soldiers in flight.
    pub soldiers: Vec<Soldier>,
    /// Dispatched soldiers that have not appeared yet.
    pub pending_spawns: usize,
    /// Decided outcome, if any.
    pub victory: Option<Outcome>,
    /// Ticks elapsed since the victory was decided.
    pub victory_frames: u32,
    /// No further ticks will change anything.
    pub finished: bool,
}

impl WorldSnapshot {
    /// Number of buildings owned by `team`.
    #[must_use]
    pub fn buildings_owned(&self, team: Team) -> usize {
        self.buildings.iter().filter(|b| b.team == team).count()
    }

    /// Troops garrisoned in `team`'s buildings.
    #[must_use]
    pub fn garrison(&self, team: Team) -> i64 {
        self.buildings
            .iter()
            .filter(|b| b.team == team)
            .map(|b| i64::from(b.count))
            .sum()
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to encode snapshot: {e}")))
    }

    /// Decode from bincode.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::Serialization(format!("Failed to decode snapshot: {e}")))
    }
}
