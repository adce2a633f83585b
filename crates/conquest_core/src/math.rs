//! Fixed-point math utilities for deterministic simulation.
//!
//! All positional simulation math uses fixed-point arithmetic so that a
//! tick produces bit-identical results on every platform. Floating-point
//! square roots in particular are not guaranteed to agree across CPUs.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for human-authored fixed-point values.
///
/// Configuration files are written by hand, so values such as `4.5` are
/// read as decimals and converted once at load time. The conversion rounds
/// to the nearest representable value and is itself deterministic.
pub mod decimal_serde {
    use super::Fixed;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| D::Error::custom(format!("{value} is outside the fixed-point range")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Build a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    ///
    /// Saturates at `Fixed::MAX` instead of overflowing.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        narrow(wide_length_squared(self, other))
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        wide_sqrt(wide_length_squared(self, other))
    }

    /// Dot product of two vectors, saturating at the fixed-point range.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        narrow(wide_mul(self.x, other.x).saturating_add(wide_mul(self.y, other.y)))
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Both coordinates rounded to the nearest integer.
    #[must_use]
    pub fn rounded(self) -> (i32, i32) {
        (
            self.x.round().saturating_to_num::<i32>(),
            self.y.round().saturating_to_num::<i32>(),
        )
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = wide_sqrt(wide_length_squared(self, Self::ZERO));
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }
}

/// Product of two fixed-point values with all 64 fractional bits kept.
///
/// Squared lengths and cross products of map coordinates exceed the
/// integer range of `Fixed`, so they are compared in this form.
#[must_use]
pub fn wide_mul(a: Fixed, b: Fixed) -> i128 {
    i128::from(a.to_bits()) * i128::from(b.to_bits())
}

fn wide_length_squared(a: Vec2Fixed, b: Vec2Fixed) -> i128 {
    let dx = i128::from(a.x.to_bits()) - i128::from(b.x.to_bits());
    let dy = i128::from(a.y.to_bits()) - i128::from(b.y.to_bits());
    dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
}

/// Drops the extra 32 fractional bits of a wide product, saturating.
fn narrow(wide: i128) -> Fixed {
    let bits = (wide >> 32).clamp(i128::from(i64::MIN), i128::from(i64::MAX));
    Fixed::from_bits(bits as i64)
}

/// Square root of a wide (64 fractional bits) value as a `Fixed`.
fn wide_sqrt(wide: i128) -> Fixed {
    if wide <= 0 {
        return Fixed::ZERO;
    }
    let root = isqrt(wide as u128).min(i64::MAX as u128);
    Fixed::from_bits(root as i64)
}

/// Floor square root by Newton iteration from an overestimate.
fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = 1u128 << (128 - n.leading_zeros()).div_ceil(2);
    loop {
        let y = (x + n / x) >> 1;
        if y >= x {
            return x;
        }
        x = y;
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}
