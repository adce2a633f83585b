//! Map input format.
//!
//! Maps are authored as JSON (the format the capture tooling already
//! produces) or RON. Loading is lenient: missing arrays are empty, and a
//! record the simulation cannot use is skipped with a warning instead of
//! failing the whole map.
//!
//! ```json
//! {
//!   "buildings": [
//!     { "x": 540, "y": 1728, "team": "player", "count": 150 },
//!     { "x": 540, "y": 960, "team": "NEUTRAL", "count": 25, "type": "BUNKER" }
//!   ],
//!   "obstacles": [ { "x": 432, "y": 1248, "w": 216, "h": 120 } ],
//!   "biome": "TECH"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::buildings::{Building, BuildingKind};
use crate::error::{GameError, Result};
use crate::factions::Team;
use crate::geometry::Rect;
use crate::math::{Fixed, Vec2Fixed};

/// Largest coordinate magnitude a map record may use.
///
/// Keeps every difference between two map points well inside the
/// integer range of [`Fixed`].
pub const MAX_COORDINATE: f64 = 1_000_000.0;

/// One building record as written in a map file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSpec {
    /// Centre X.
    pub x: f64,
    /// Centre Y.
    pub y: f64,
    /// Owning faction tag, any case.
    pub team: String,
    /// Starting troops.
    #[serde(default)]
    pub count: i64,
    /// Structural subtype, any case. Absent means normal.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl BuildingSpec {
    /// Convenience constructor used by fixtures and tools.
    #[must_use]
    pub fn new(x: f64, y: f64, team: &str, count: i64) -> Self {
        Self {
            x,
            y,
            team: team.to_string(),
            count,
            kind: None,
        }
    }

    /// Same record with a structural subtype.
    #[must_use]
    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }
}

/// One obstacle rectangle as written in a map file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSpec {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub w: f64,
    /// Height.
    pub h: f64,
}

/// A complete map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    /// Buildings in load order. Their index becomes the building ID.
    #[serde(default)]
    pub buildings: Vec<BuildingSpec>,
    /// Static obstacles.
    #[serde(default)]
    pub obstacles: Vec<ObstacleSpec>,
    /// Visual theme, passed through for renderers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biome: Option<String>,
}

impl MapData {
    /// Load a map, choosing the format from the file extension
    /// (`.ron` for RON, anything else is read as JSON).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| GameError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let is_ron = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ron"));

        let parsed = if is_ron {
            ron::from_str(&contents).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| GameError::DataParseError {
            path: path.display().to_string(),
            message,
        })
    }

    /// Parse a JSON map.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Parse a RON map.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Build the simulation's buildings.
    ///
    /// Records with an unknown team, or a coordinate that is non-finite or
    /// beyond [`MAX_COORDINATE`], are skipped.
    /// Counts are clamped into `0..=max_count`. Unknown subtypes load as
    /// normal buildings.
    #[must_use]
    pub fn to_buildings(&self, max_count: i32) -> Vec<Building> {
        let mut buildings = Vec::with_capacity(self.buildings.len());
        for (index, spec) in self.buildings.iter().enumerate() {
            let team = match spec.team.parse::<Team>() {
                Ok(team) => team,
                Err(err) => {
                    warn!(index, %err, "Skipping building with unknown team");
                    continue;
                }
            };
            let Some(position) = to_point(spec.x, spec.y) else {
                warn!(index, x = spec.x, y = spec.y, "Skipping building with invalid position");
                continue;
            };
            let kind = match spec.kind.as_deref() {
                None => BuildingKind::Normal,
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    warn!(index, kind = raw, "Unknown building type, using NORMAL");
                    BuildingKind::Normal
                }),
            };
            let count = spec.count.clamp(0, i64::from(max_count)) as i32;
            if i64::from(count) != spec.count {
                warn!(index, requested = spec.count, count, "Clamped building count");
            }
            buildings.push(Building::new(position, team, count, kind));
        }
        buildings
    }

    /// Build the simulation's obstacles, skipping rectangles with a
    /// non-finite or out-of-range value.
    #[must_use]
    pub fn to_obstacles(&self) -> Vec<Rect> {
        self.obstacles
            .iter()
            .enumerate()
            .filter_map(|(index, spec)| {
                let rect = to_point(spec.x, spec.y)
                    .zip(to_point(spec.w, spec.h))
                    .map(|(corner, size)| Rect::new(corner.x, corner.y, size.x, size.y));
                if rect.is_none() {
                    warn!(index, "Skipping obstacle with invalid geometry");
                }
                rect
            })
            .collect()
    }
}

fn to_point(x: f64, y: f64) -> Option<Vec2Fixed> {
    let in_range = |v: f64| v.is_finite() && v.abs() <= MAX_COORDINATE;
    if !in_range(x) || !in_range(y) {
        return None;
    }
    Some(Vec2Fixed::new(
        Fixed::checked_from_num(x)?,
        Fixed::checked_from_num(y)?,
    ))
}
