//! Per-tick event output.
//!
//! Renderers, audio and commentary never read simulation internals to
//! learn what happened; they consume the ordered list of events each tick
//! returns.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::factions::Team;
use crate::math::Vec2Fixed;

/// Result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Outcome {
    /// Exactly one faction survived.
    Winner(Team),
    /// Every faction was eliminated on the same tick.
    None,
    /// Several survivors remain after at least one faction was eliminated.
    Multiple,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Winner(team) => team.fmt(f),
            Self::None => f.write_str("NONE"),
            Self::Multiple => f.write_str("MULTIPLE"),
        }
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.to_string()
    }
}

impl TryFrom<String> for Outcome {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "NONE" => Ok(Self::None),
            "MULTIPLE" => Ok(Self::Multiple),
            tag => tag
                .parse::<Team>()
                .map(Self::Winner)
                .map_err(|e| e.to_string()),
        }
    }
}

/// Something observable that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimEvent {
    /// A dispatch left a building.
    Spawn {
        /// Origin building centre.
        position: Vec2Fixed,
    },
    /// A soldier reinforced or damaged a building without capturing it.
    Hit {
        /// Target building centre.
        position: Vec2Fixed,
        /// Arriving faction.
        team: Team,
        /// Target owner after the hit. Equal to `team` for reinforcement.
        target_team: Team,
    },
    /// A building changed owner.
    Capture {
        /// Captured building centre.
        position: Vec2Fixed,
        /// New owner.
        team: Team,
    },
    /// The game was decided. Emitted once.
    Victory {
        /// Who won.
        winner: Outcome,
    },
}

/// Events generated during one tick, in the order they happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Ordered events.
    pub events: Vec<SimEvent>,
}

impl TickEvents {
    /// Append an event.
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Iterate in order.
    pub fn iter(&self) -> std::slice::Iter<'_, SimEvent> {
        self.events.iter()
    }

    /// Number of captures this tick.
    #[must_use]
    pub fn captures(&self) -> usize {
        self.iter()
            .filter(|e| matches!(e, SimEvent::Capture { .. }))
            .count()
    }

    /// The victory announced this tick, if any.
    #[must_use]
    pub fn victory(&self) -> Option<Outcome> {
        self.iter().find_map(|e| match e {
            SimEvent::Victory { winner } => Some(*winner),
            _ => None,
        })
    }
}

impl IntoIterator for TickEvents {
    type Item = SimEvent;
    type IntoIter = std::vec::IntoIter<SimEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a TickEvents {
    type Item = &'a SimEvent;
    type IntoIter = std::slice::Iter<'a, SimEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
