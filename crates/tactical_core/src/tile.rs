//! Grid cells, compass directions and movement cost.
//!
//! Tile costs are speed multipliers: a unit crossing from `a` to `b` moves at
//! `a.cost_to_leave × b.cost_to_enter` of its base speed, scaled down by
//! [`DIAGONAL_FACTOR`] for diagonal steps. A cost of zero is impassable for
//! walking units. Teleporting ignores costs entirely.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TacticalError};
use crate::ids::{TreasureId, UnitId};
use crate::math::{Fixed, Vec2Fixed, DIAGONAL_FACTOR};

/// Integer grid coordinates. `y` grows northwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TileCoord {
    /// Create a coordinate pair.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinate one step away in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Coordinate shifted by an arbitrary offset.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// True when `other` is one of the eight neighbours.
    #[must_use]
    pub fn is_adjacent(self, other: Self) -> bool {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx <= 1 && dy <= 1 && (dx, dy) != (0, 0)
    }

    /// True when `other` is a diagonal neighbour.
    #[must_use]
    pub fn is_diagonal_to(self, other: Self) -> bool {
        self.x.abs_diff(other.x) == 1 && self.y.abs_diff(other.y) == 1
    }

    /// Centre of the tile in continuous space.
    #[must_use]
    pub fn to_position(self) -> Vec2Fixed {
        Vec2Fixed::from_ints(self.x, self.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The eight compass directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// +y.
    North,
    /// +x, +y.
    NorthEast,
    /// +x.
    East,
    /// +x, -y.
    SouthEast,
    /// -y.
    South,
    /// -x, -y.
    SouthWest,
    /// -x.
    West,
    /// -x, +y.
    NorthWest,
}

impl Direction {
    /// Scan order used for neighbour queries. Wander relies on this order, so
    /// changing it changes which tile a given random draw selects.
    pub const COMPASS: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// Grid offset for this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::NorthEast => (1, 1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, -1),
            Direction::South => (0, -1),
            Direction::SouthWest => (-1, -1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, 1),
        }
    }

    /// True for the four diagonal directions.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        let (dx, dy) = self.offset();
        dx != 0 && dy != 0
    }
}

/// One grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    coord: TileCoord,
    /// Speed multiplier when stepping onto this tile. Zero is impassable.
    pub cost_to_enter: Fixed,
    /// Speed multiplier when stepping off this tile. Zero is impassable.
    pub cost_to_leave: Fixed,
    pub(crate) occupant: Option<UnitId>,
    pub(crate) sprite: u32,
    pub(crate) treasure: Vec<TreasureId>,
}

impl Tile {
    /// Create an open tile with unit costs.
    #[must_use]
    pub fn new(coord: TileCoord) -> Self {
        Self {
            coord,
            cost_to_enter: Fixed::ONE,
            cost_to_leave: Fixed::ONE,
            occupant: None,
            sprite: 0,
            treasure: Vec::new(),
        }
    }

    /// Grid coordinates.
    #[must_use]
    pub const fn coord(&self) -> TileCoord {
        self.coord
    }

    /// Column.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.coord.x
    }

    /// Row.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.coord.y
    }

    /// Unit standing on this tile, if any.
    #[must_use]
    pub const fn occupant(&self) -> Option<UnitId> {
        self.occupant
    }

    /// True when no unit stands here.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.occupant.is_none()
    }

    /// Visual index consumed by renderers.
    #[must_use]
    pub const fn sprite(&self) -> u32 {
        self.sprite
    }

    /// Treasure pile on this tile, oldest first.
    #[must_use]
    pub fn treasure(&self) -> &[TreasureId] {
        &self.treasure
    }

    /// True when walking units can step onto this tile.
    #[must_use]
    pub fn is_enterable(&self) -> bool {
        self.cost_to_enter > Fixed::ZERO
    }

    /// Movement cost multiplier for stepping from this tile onto `other`.
    ///
    /// With `terrain_effects` disabled only the diagonal factor applies.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::SameTile`] when `other` is this tile and
    /// [`TacticalError::NotAdjacent`] when it is not a neighbour.
    pub fn cost_to_enter_tile(&self, other: &Tile, terrain_effects: bool) -> Result<Fixed> {
        if other.coord == self.coord {
            return Err(TacticalError::SameTile(self.coord));
        }
        if !self.coord.is_adjacent(other.coord) {
            return Err(TacticalError::NotAdjacent {
                from: self.coord,
                to: other.coord,
            });
        }

        let direction_factor = if self.coord.is_diagonal_to(other.coord) {
            DIAGONAL_FACTOR
        } else {
            Fixed::ONE
        };

        if terrain_effects {
            Ok(direction_factor * self.cost_to_leave * other.cost_to_enter)
        } else {
            Ok(direction_factor)
        }
    }
}
