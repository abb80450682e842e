//! Fixed-point math utilities for the simulation.
//!
//! Positions, timers and movement costs use fixed-point arithmetic so that a
//! seeded run replays identically on every platform. Floats only appear at
//! the configuration boundary (see [`fixed_decimal`]).

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// 1/√2, the speed factor applied to diagonal steps.
///
/// Raw bits of `0.70710678118 × 2³²`.
pub const DIAGONAL_FACTOR: Fixed = Fixed::from_bits(3_037_000_500);

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

/// Serde support for fixed-point numbers written by hand.
///
/// Scenario and config files are edited by people, so values are written as
/// plain decimals (`1.5`) and converted once on load.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a decimal into a fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("{value} is out of fixed-point range")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Check whether `other` lies within `radius` (inclusive) without a sqrt.
    #[must_use]
    pub fn within(self, other: Self, radius: Fixed) -> bool {
        if radius < Fixed::ZERO {
            return false;
        }
        self.distance_squared(other) <= radius.saturating_mul(radius)
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Per-component sign (-1, 0 or 1).
    #[must_use]
    pub fn signum(self) -> (i32, i32) {
        (sign(self.x), sign(self.y))
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }
}

fn sign(value: Fixed) -> i32 {
    if value > Fixed::ZERO {
        1
    } else if value < Fixed::ZERO {
        -1
    } else {
        0
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    // Invariant: low² ≤ value < high².
    let mut low = Fixed::ZERO;
    let mut high = value.max(Fixed::ONE).saturating_add(Fixed::DELTA);

    for _ in 0..64 {
        let mid = low + (high - low) / Fixed::from_num(2);
        if mid == low {
            break;
        }
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::from_ints(3, 0);
        let b = Vec2Fixed::from_ints(0, 4);
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_vec2_distance_is_exact_for_pythagorean_triples() {
        let a = Vec2Fixed::from_ints(0, 0);
        let b = Vec2Fixed::from_ints(3, 4);
        assert_eq!(a.distance(b), Fixed::from_num(5));
    }

    #[test]
    fn test_within_is_inclusive() {
        let a = Vec2Fixed::from_ints(0, 0);
        assert!(a.within(Vec2Fixed::from_ints(5, 0), Fixed::from_num(5)));
        assert!(!a.within(Vec2Fixed::from_ints(6, 0), Fixed::from_num(5)));
        assert!(!a.within(a, Fixed::from_num(-1)));
    }

    #[test]
    fn test_diagonal_factor_approximates_inverse_sqrt2() {
        let expected = Fixed::from_num(0.707_106_78_f64);
        let epsilon = Fixed::ONE / Fixed::from_num(1_000_000);
        assert!((DIAGONAL_FACTOR - expected).abs() < epsilon);
    }

    #[test]
    fn test_signum() {
        let v = Vec2Fixed::new(Fixed::from_num(-0.5), Fixed::ZERO);
        assert_eq!(v.signum(), (-1, 0));
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2Fixed::from_ints(3, 4);
        let norm = v.normalize();

        let len_sq = norm.dot(norm);
        let one = Fixed::ONE;
        let epsilon = one / Fixed::from_num(10000);
        assert!(
            (len_sq - one).abs() < epsilon,
            "normalized vector length² should be ~1, got {:?}",
            len_sq
        );

        let ratio_diff = (norm.x * Fixed::from_num(4)) - (norm.y * Fixed::from_num(3));
        assert!(
            ratio_diff.abs() < epsilon,
            "direction not preserved: {:?}",
            ratio_diff
        );
    }

    #[test]
    fn test_fixed_sqrt_of_small_values() {
        let quarter = Fixed::from_num(0.25);
        let root = fixed_sqrt(quarter);
        let epsilon = Fixed::ONE / Fixed::from_num(100_000);
        assert!((root - Fixed::from_num(0.5)).abs() < epsilon);
        assert_eq!(fixed_sqrt(Fixed::ZERO), Fixed::ZERO);
    }
}
