//! JSON protocol for headless game communication.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controlling process
//! **Output (stdout):** One or more responses per command
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. Controller sends commands as JSON lines
//! 3. `step` answers with one `tick` response per advanced tick
//! 4. `quit` answers `bye` and the runner exits
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"load_map","path":"maps/skirmish.json"}
//! <- {"type":"loaded","buildings":9,"obstacles":2,"factions":["PLAYER","ENEMY"]}
//! -> {"cmd":"send","from":0,"to":4}
//! <- {"type":"dispatch","accepted":true}
//! -> {"cmd":"step","count":2}
//! <- {"type":"tick","tick":1,"events":[{"type":"SPAWN","x":540.0,"y":1728.0}]}
//! <- {"type":"tick","tick":2,"events":[]}
//! -> {"cmd":"hash"}
//! <- {"type":"hash","tick":2,"hash":1234567890}
//! ```
//!
//! Coordinates are plain floats on the wire. The simulation itself stays in
//! fixed point; conversion happens only here.

use conquest_core::buildings::Building;
use conquest_core::error::GameError;
use conquest_core::events::SimEvent;
use conquest_core::factions::Team;
use conquest_core::math::Vec2Fixed;
use conquest_core::snapshot::WorldSnapshot;
use conquest_core::soldiers::Soldier;
use serde::{Deserialize, Serialize};

/// Protocol version reported in the `ready` line.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance simulation by N ticks. Stops early once the game finishes.
    Step {
        /// Number of ticks to advance (default: 1)
        #[serde(default = "default_step_count")]
        count: u32,
    },

    /// Query current game state.
    Query,

    /// Replace the world with a map file (JSON, or RON by extension).
    LoadMap {
        /// Path to the map file
        path: String,
    },

    /// Dispatch troops from one building to another.
    Send {
        /// Origin building index
        from: usize,
        /// Target building index
        to: usize,
    },

    /// Get the state hash for determinism checks.
    Hash,

    /// Quit the runner.
    Quit,
}

fn default_step_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol version
        version: String,
        /// Current tick
        tick: u64,
    },

    /// One tick was advanced.
    Tick {
        /// Tick count after advancing
        tick: u64,
        /// Events of this tick, in order
        events: Vec<EventOutput>,
    },

    /// Full game state.
    State(StateOutput),

    /// A map was loaded.
    Loaded {
        /// Buildings in the new world
        buildings: usize,
        /// Obstacles in the new world
        obstacles: usize,
        /// Competing factions discovered
        factions: Vec<Team>,
    },

    /// Result of a `send` command.
    Dispatch {
        /// Whether troops were sent
        accepted: bool,
    },

    /// State hash response.
    Hash {
        /// Current tick
        tick: u64,
        /// Deterministic state hash
        hash: u64,
    },

    /// Error occurred.
    Error {
        /// Error message
        message: String,
        /// Command that caused the error, when it could be parsed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },

    /// Runner is shutting down.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// A simulation event with float coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventOutput {
    /// Troops left a building.
    Spawn {
        /// Origin X
        x: f64,
        /// Origin Y
        y: f64,
    },
    /// A soldier arrived without capturing.
    Hit {
        /// Target X
        x: f64,
        /// Target Y
        y: f64,
        /// Arriving faction
        team: Team,
        /// Owner of the target after the hit
        #[serde(rename = "targetTeam")]
        target_team: Team,
    },
    /// A building changed owner.
    Capture {
        /// Building X
        x: f64,
        /// Building Y
        y: f64,
        /// New owner
        team: Team,
    },
    /// The game was decided.
    Victory {
        /// Faction tag, `NONE` or `MULTIPLE`
        winner: String,
    },
}

impl From<&SimEvent> for EventOutput {
    fn from(event: &SimEvent) -> Self {
        match *event {
            SimEvent::Spawn { position } => {
                let (x, y) = to_float(position);
                Self::Spawn { x, y }
            }
            SimEvent::Hit {
                position,
                team,
                target_team,
            } => {
                let (x, y) = to_float(position);
                Self::Hit {
                    x,
                    y,
                    team,
                    target_team,
                }
            }
            SimEvent::Capture { position, team } => {
                let (x, y) = to_float(position);
                Self::Capture { x, y, team }
            }
            SimEvent::Victory { winner } => Self::Victory {
                winner: winner.to_string(),
            },
        }
    }
}

/// Building state for output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingState {
    /// Building index
    pub id: usize,
    /// Centre X
    pub x: f64,
    /// Centre Y
    pub y: f64,
    /// Owner
    pub team: Team,
    /// Garrison
    pub count: i32,
    /// Subtype tag
    pub kind: String,
}

/// Soldier state for output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldierState {
    /// Current X
    pub x: f64,
    /// Current Y
    pub y: f64,
    /// Owner
    pub team: Team,
    /// Target building index
    pub target: usize,
}

/// Payload of a `state` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateOutput {
    /// Current tick
    pub tick: u64,
    /// All buildings in index order
    pub buildings: Vec<BuildingState>,
    /// Soldiers in flight
    pub soldiers: Vec<SoldierState>,
    /// Scheduled spawns not yet on the field
    pub pending_spawns: usize,
    /// Outcome once decided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub victory: Option<String>,
    /// Ticks elapsed since the outcome was decided
    #[serde(rename = "victoryFrames")]
    pub victory_frames: u32,
    /// Whether the game is over
    pub finished: bool,
}

impl From<&WorldSnapshot> for StateOutput {
    fn from(snapshot: &WorldSnapshot) -> Self {
        Self {
            tick: snapshot.tick,
            buildings: snapshot
                .buildings
                .iter()
                .enumerate()
                .map(|(id, b)| BuildingState::new(id, b))
                .collect(),
            soldiers: snapshot.soldiers.iter().map(SoldierState::from).collect(),
            pending_spawns: snapshot.pending_spawns,
            victory: snapshot.victory.map(|v| v.to_string()),
            victory_frames: snapshot.victory_frames,
            finished: snapshot.finished,
        }
    }
}

impl BuildingState {
    fn new(id: usize, building: &Building) -> Self {
        let (x, y) = to_float(building.position);
        Self {
            id,
            x,
            y,
            team: building.team,
            count: building.count,
            kind: building.kind.tag().to_string(),
        }
    }
}

impl From<&Soldier> for SoldierState {
    fn from(soldier: &Soldier) -> Self {
        let (x, y) = to_float(soldier.position);
        Self {
            x,
            y,
            team: soldier.team,
            target: soldier.target,
        }
    }
}

fn to_float(position: Vec2Fixed) -> (f64, f64) {
    (position.x.to_num(), position.y.to_num())
}

// ============================================================================
// Errors
// ============================================================================

/// Failures while serving the protocol.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A line was not a valid command.
    #[error("invalid command: {0}")]
    Parse(#[from] serde_json::Error),

    /// The simulation rejected a command.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Create a state response from a snapshot.
    #[must_use]
    pub fn state(snapshot: &WorldSnapshot) -> Self {
        Self::State(StateOutput::from(snapshot))
    }

    /// Serialize to a JSON line (with trailing newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse a command from a JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Parse`] if the line is not a known command.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Get command name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Step { .. } => "step",
            Self::Query => "query",
            Self::LoadMap { .. } => "load_map",
            Self::Send { .. } => "send",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conquest_core::events::Outcome;
    use conquest_core::math::Fixed;

    #[test]
    fn test_parse_step_command() {
        let cmd = Command::from_json(r#"{"cmd":"step","count":60}"#).unwrap();
        assert_eq!(cmd, Command::Step { count: 60 });
    }

    #[test]
    fn test_step_count_defaults_to_one() {
        let cmd = Command::from_json(r#"{"cmd":"step"}"#).unwrap();
        assert_eq!(cmd, Command::Step { count: 1 });
    }

    #[test]
    fn test_parse_send_command() {
        let cmd = Command::from_json(r#"{"cmd":"send","from":3,"to":7}"#).unwrap();
        assert_eq!(cmd, Command::Send { from: 3, to: 7 });
        assert_eq!(cmd.name(), "send");
    }

    #[test]
    fn test_parse_load_map_command() {
        let cmd = Command::from_json(r#"{"cmd":"load_map","path":"maps/a.json"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::LoadMap {
                path: "maps/a.json".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_command_is_parse_error() {
        let err = Command::from_json(r#"{"cmd":"fly"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Parse(_)));
    }

    #[test]
    fn test_ready_line() {
        let line = Response::ready(0).to_json_line();
        assert!(line.ends_with('\n'));
        assert!(line.contains(r#""type":"ready""#));
        assert!(line.contains(r#""version":"1.0""#));
    }

    #[test]
    fn test_error_omits_missing_cmd() {
        let json = Response::error("bad", None).to_json_line();
        assert!(json.contains(r#""message":"bad""#));
        assert!(!json.contains("cmd"));
    }

    #[test]
    fn test_hit_event_uses_camel_case_target_team() {
        let event = SimEvent::Hit {
            position: Vec2Fixed::new(Fixed::from_num(10.5), Fixed::from_num(20)),
            team: Team::Player,
            target_team: Team::Enemy,
        };
        let json = serde_json::to_string(&EventOutput::from(&event)).unwrap();
        assert_eq!(
            json,
            r#"{"type":"HIT","x":10.5,"y":20.0,"team":"PLAYER","targetTeam":"ENEMY"}"#
        );
    }

    #[test]
    fn test_victory_event_carries_outcome_tag() {
        let event = SimEvent::Victory {
            winner: Outcome::Multiple,
        };
        assert_eq!(
            EventOutput::from(&event),
            EventOutput::Victory {
                winner: "MULTIPLE".to_string()
            }
        );
    }

    #[test]
    fn test_state_response_is_flat() {
        let snapshot = WorldSnapshot {
            tick: 4,
            buildings: vec![],
            soldiers: vec![],
            pending_spawns: 2,
            victory: Some(Outcome::Winner(Team::Enemy)),
            victory_frames: 1,
            finished: false,
        };
        let json = Response::state(&snapshot).to_json_line();
        assert!(json.contains(r#""type":"state""#));
        assert!(json.contains(r#""tick":4"#));
        assert!(json.contains(r#""victory":"ENEMY""#));
        assert!(json.contains(r#""victoryFrames":1"#));
    }
}
