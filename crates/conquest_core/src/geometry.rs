//! Segment and rectangle intersection tests.
//!
//! Pure functions, no state. Obstacles are axis-aligned rectangles and a
//! dispatch path is the straight segment between two building centres.
//! Cross products are taken on widened intermediates, see [`wide_mul`].

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, wide_mul, Fixed, Vec2Fixed};

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Top edge.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
    /// Width.
    #[serde(with = "fixed_serde")]
    pub w: Fixed,
    /// Height.
    #[serde(with = "fixed_serde")]
    pub h: Fixed,
}

impl Rect {
    /// Create a rectangle from its corner and extent.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed, w: Fixed, h: Fixed) -> Self {
        Self { x, y, w, h }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> Fixed {
        self.x + self.w
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> Fixed {
        self.y + self.h
    }

    /// The four boundary edges: left, right, top, bottom.
    #[must_use]
    pub fn edges(&self) -> [(Vec2Fixed, Vec2Fixed); 4] {
        let top_left = Vec2Fixed::new(self.x, self.y);
        let top_right = Vec2Fixed::new(self.right(), self.y);
        let bottom_left = Vec2Fixed::new(self.x, self.bottom());
        let bottom_right = Vec2Fixed::new(self.right(), self.bottom());
        [
            (top_left, bottom_left),
            (top_right, bottom_right),
            (top_left, top_right),
            (bottom_left, bottom_right),
        ]
    }
}

/// Squared distance between two points.
#[must_use]
pub fn distance_squared(p1: Vec2Fixed, p2: Vec2Fixed) -> Fixed {
    p1.distance_squared(p2)
}

/// Whether segment `p1`–`p2` crosses any boundary edge of `rect`.
///
/// Rejects early when the segment's bounding box misses the rectangle.
/// A segment lying wholly inside the rectangle touches no edge and is
/// reported as not intersecting.
#[must_use]
pub fn segment_intersects_rect(p1: Vec2Fixed, p2: Vec2Fixed, rect: &Rect) -> bool {
    let min_x = p1.x.min(p2.x);
    let max_x = p1.x.max(p2.x);
    let min_y = p1.y.min(p2.y);
    let max_y = p1.y.max(p2.y);

    if max_x < rect.x || min_x > rect.right() || max_y < rect.y || min_y > rect.bottom() {
        return false;
    }

    rect.edges()
        .iter()
        .any(|&(a, b)| segment_intersects_segment(p1, p2, a, b))
}

/// Parametric segment intersection.
///
/// True iff both intersection parameters lie in `[0, 1]`, so touching
/// endpoints count. Parallel and collinear segments (zero denominator)
/// never intersect.
#[must_use]
pub fn segment_intersects_segment(
    p1: Vec2Fixed,
    p2: Vec2Fixed,
    p3: Vec2Fixed,
    p4: Vec2Fixed,
) -> bool {
    let d1 = p2 - p1;
    let d2 = p4 - p3;
    let r = p1 - p3;

    let den = cross(d1, d2);
    if den == 0 {
        return false;
    }

    let num_a = cross(d2, r);
    let num_b = cross(d1, r);

    // u = num / den lies in [0, 1] without dividing.
    let in_unit_range = |num: i128| {
        if den > 0 {
            num >= 0 && num <= den
        } else {
            num <= 0 && num >= den
        }
    };

    in_unit_range(num_a) && in_unit_range(num_b)
}

fn cross(a: Vec2Fixed, b: Vec2Fixed) -> i128 {
    wide_mul(a.x, b.y) - wide_mul(a.y, b.x)
}
