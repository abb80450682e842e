//! # Tactical Core
//!
//! Deterministic simulation core for small grid-based tactical encounters.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO beyond reading a scenario file
//! - No system randomness (the random source is injected)
//! - No floating-point math at runtime (uses fixed-point)
//!
//! This separation enables:
//! - Headless runs and CI checks
//! - Seeded, replayable runs
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`map`] - Tile grid, unit and treasure registries, change channels
//! - [`ids`] - Versioned unit and treasure handles
//! - [`tile`] - Tiles, coordinates and movement cost
//! - [`unit`] - Units, stats, health and behaviour state
//! - [`treasure`] - Ground and carried treasure
//! - [`perception`] - Noticing and forgetting
//! - [`awareness`] - Morale and behaviour-state refresh
//! - [`ai`] - Weighted-utility decision core
//! - [`behaviours`] - Wander, rest, teleport, combat and loot
//! - [`pathfinding`] - One-step local mover
//! - [`simulation`] - Tick driver and mission outcome
//! - [`scenario`] - RON scenario files
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod awareness;
pub mod behaviours;
pub mod config;
pub mod error;
pub mod ids;
pub mod map;
pub mod math;
pub mod observer;
pub mod pathfinding;
pub mod perception;
pub mod scenario;
pub mod selection;
pub mod simulation;
pub mod tile;
pub mod treasure;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{Activity, Behaviour, Continuation, SimContext, WeightTable};
    pub use crate::ids::{TreasureId, UnitId};
    pub use crate::behaviours::{BehaviourKit, CombatKit, LootKit, WanderKit};
    pub use crate::config::SimConfig;
    pub use crate::error::{Result, TacticalError};
    pub use crate::map::{AllegianceProfile, Colour, Map};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::observer::SubscriptionId;
    pub use crate::scenario::Scenario;
    pub use crate::selection::select_weighted;
    pub use crate::simulation::{MissionOutcome, MissionRules, Simulation, TickEvents};
    pub use crate::tile::{Direction, Tile, TileCoord};
    pub use crate::treasure::Treasure;
    pub use crate::unit::{Allegiance, BehaviourState, HealthState, Stats, Unit};
}
