//! Faction definitions and identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ownership tag for buildings and soldiers.
///
/// `Neutral` is reserved: it never gets an AI agent and never generates
/// troops on its own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Team {
    /// Unclaimed buildings.
    Neutral,
    /// The first competing faction (bottom of the portrait maps).
    Player,
    /// The second competing faction (top of the portrait maps).
    Enemy,
    /// Third faction for free-for-all maps.
    Green,
    /// Fourth faction for free-for-all maps.
    Yellow,
}

impl Team {
    /// Every tag, neutral first.
    pub const ALL: [Self; 5] = [
        Self::Neutral,
        Self::Player,
        Self::Enemy,
        Self::Green,
        Self::Yellow,
    ];

    /// Whether this is the reserved neutral tag.
    #[must_use]
    pub const fn is_neutral(self) -> bool {
        matches!(self, Self::Neutral)
    }

    /// Canonical upper-case tag as used in map files and events.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Neutral => "NEUTRAL",
            Self::Player => "PLAYER",
            Self::Enemy => "ENEMY",
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Returned when a map names a faction outside the fixed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown team tag '{0}'")]
pub struct UnknownTeam(pub String);

impl FromStr for Team {
    type Err = UnknownTeam;

    /// Parse a tag case-insensitively (`"player"`, `"Player"`, `"PLAYER"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|team| team.tag() == upper)
            .ok_or_else(|| UnknownTeam(s.to_string()))
    }
}
