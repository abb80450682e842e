//! Error types for the tactical simulation.
//!
//! Nothing in this crate is fatal to the simulation driver. Lookups that can
//! miss return `Option`, usage errors come back as [`TacticalError`] and are
//! logged by the caller, and starvation (nothing to do) is not an error at all.

use thiserror::Error;

use crate::ids::{TreasureId, UnitId};
use crate::tile::TileCoord;

/// Result type alias using [`TacticalError`].
pub type Result<T> = std::result::Result<T, TacticalError>;

/// Top-level error type for all tactical simulation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TacticalError {
    /// Coordinates outside the map.
    #[error("Tile ({x}, {y}) is out of bounds")]
    TileOutOfBounds {
        /// Requested x coordinate.
        x: i32,
        /// Requested y coordinate.
        y: i32,
    },

    /// Tile already holds another unit.
    #[error("Tile {0} is already occupied")]
    TileOccupied(TileCoord),

    /// Two tiles were expected to be neighbours.
    #[error("Tiles {from} and {to} are not adjacent")]
    NotAdjacent {
        /// Tile being left.
        from: TileCoord,
        /// Tile being entered.
        to: TileCoord,
    },

    /// A tile was compared against itself.
    #[error("Tile {0} cannot be entered from itself")]
    SameTile(TileCoord),

    /// Movement cost between two tiles is zero.
    #[error("Moving from {from} to {to} is impassable")]
    Impassable {
        /// Tile being left.
        from: TileCoord,
        /// Tile being entered.
        to: TileCoord,
    },

    /// A unit tried to start a second move before finishing the first.
    #[error("Unit {0:?} is already moving")]
    AlreadyMoving(UnitId),

    /// Unit handle does not resolve in this map.
    #[error("Unit not found: {0:?}")]
    UnitNotFound(UnitId),

    /// Treasure handle does not resolve in this map.
    #[error("Treasure not found: {0:?}")]
    TreasureNotFound(TreasureId),

    /// A behaviour name was registered twice on one unit.
    #[error("Behaviour '{name}' is already registered for {unit}")]
    DuplicateBehaviour {
        /// Unit name.
        unit: String,
        /// Behaviour name.
        name: String,
    },

    /// A behaviour name is not registered on the unit.
    #[error("Behaviour '{name}' is not registered for {unit}")]
    UnknownBehaviour {
        /// Unit name.
        unit: String,
        /// Behaviour name.
        name: String,
    },

    /// Base stats may only be assigned once.
    #[error("Stats for {0} have already been set")]
    StatsAlreadySet(String),

    /// A stat is too large for the fixed-point rules.
    #[error("{unit} has {stat} {value}, above the ceiling of {ceiling}", ceiling = crate::unit::STAT_CEILING)]
    StatOutOfRange {
        /// Unit name.
        unit: String,
        /// Stat name.
        stat: &'static str,
        /// Rejected value.
        value: u32,
    },

    /// Tuning value outside what the rules can handle.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Weighted selection was asked to choose from nothing.
    #[error("Weighted selection needs at least one positive weight")]
    EmptySelection,

    /// Scenario file parsing error.
    #[error("Failed to parse scenario '{path}': {message}")]
    ScenarioParse {
        /// Path or label of the scenario source.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid simulation state.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}
