//! Autonomous units: stats, health, perception memory and in-flight actions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ai::{Activity, Behaviour, Brain};
use crate::error::{Result, TacticalError};
use crate::ids::{TreasureId, UnitId};
use crate::math::{Fixed, Vec2Fixed};
use crate::tile::TileCoord;
use crate::treasure::Treasure;

/// Sprite key used when none is given.
pub const DEFAULT_UNIT_SPRITE: &str = "knight";

/// Largest value any single stat may take.
pub const STAT_CEILING: u32 = 10_000;

/// Team tag. Units sharing an allegiance are allies, all others are enemies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Allegiance(pub u32);

impl fmt::Display for Allegiance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allegiance {}", self.0)
    }
}

/// The eight base stats, each on a 0..=max stat score scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Damage dealt per attack.
    pub strength: u32,
    /// Accuracy. Not yet used by any rule.
    pub precision: u32,
    /// Maximum and starting HP.
    pub constitution: u32,
    /// Movement speed and attack tempo.
    pub dexterity: u32,
    /// Sight radius in tiles.
    pub perception: u32,
    /// Seconds an unseen unit is remembered.
    pub intelligence: u32,
    /// Resistance to fleeing.
    pub bravery: u32,
    /// Appetite for loot.
    pub greed: u32,
}

impl Stats {
    /// Stats in declaration order, by name.
    #[must_use]
    pub const fn named(&self) -> [(&'static str, u32); 8] {
        [
            ("strength", self.strength),
            ("precision", self.precision),
            ("constitution", self.constitution),
            ("dexterity", self.dexterity),
            ("perception", self.perception),
            ("intelligence", self.intelligence),
            ("bravery", self.bravery),
            ("greed", self.greed),
        ]
    }

    /// First stat above [`STAT_CEILING`], if any.
    #[must_use]
    pub fn out_of_range(&self) -> Option<(&'static str, u32)> {
        self.named()
            .into_iter()
            .find(|&(_, value)| value > STAT_CEILING)
    }
}

/// Health state machine. Only `Conscious` and `Dead` are reachable; the HP
/// boundary at zero is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HealthState {
    /// Acting normally.
    #[default]
    Conscious,
    /// Down but not dying.
    Stable,
    /// Down and losing HP.
    Dying,
    /// Inert. Stays registered in the map.
    Dead,
}

/// High-level disposition derived every tick from what the unit has noticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviourState {
    /// No threats around.
    #[default]
    Exploring,
    /// Hurt with no threats around.
    Resting,
    /// A conscious enemy has been noticed.
    Combat,
    /// Morale broke; trying to get away.
    Fleeing,
    /// Talking to other units.
    Social,
}

/// What a unit currently perceives or remembers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    /// Noticed units and the time since each was last seen.
    pub noticed: BTreeMap<UnitId, Fixed>,
    /// Units that have noticed this one.
    pub noticed_by: BTreeSet<UnitId>,
    /// Ground treasure this unit knows about.
    pub treasure: BTreeSet<TreasureId>,
}

impl Memory {
    /// True when `other` is currently noticed.
    #[must_use]
    pub fn has_noticed(&self, other: UnitId) -> bool {
        self.noticed.contains_key(&other)
    }
}

/// Typed in-flight state shared between behaviours and the mover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionState {
    /// Tile being left while a step is in progress.
    pub move_source: Option<TileCoord>,
    /// Enemy this unit is fighting.
    pub combat_target: Option<UnitId>,
    /// Treasure this unit is heading for.
    pub loot_target: Option<TreasureId>,
}

impl ActionState {
    /// True while a step between tiles is in progress.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.move_source.is_some()
    }
}

/// A unit on the tactical map.
#[derive(Debug)]
pub struct Unit {
    /// Display name, used in log messages.
    pub name: String,
    /// Team tag.
    pub allegiance: Allegiance,
    pub(crate) sprite: String,
    stats: Stats,
    stats_set: bool,
    pub(crate) hp: i32,
    pub(crate) health_state: HealthState,
    pub(crate) behaviour_state: BehaviourState,
    pub(crate) flee_timer: Fixed,
    pub(crate) position: Vec2Fixed,
    pub(crate) tile: TileCoord,
    pub(crate) carried: Vec<Treasure>,
    pub(crate) memory: Memory,
    pub(crate) action: ActionState,
    pub(crate) brain: Brain,
}

impl Unit {
    /// Create a unit standing on `home`. Stats default to zero until
    /// [`set_stats`](Self::set_stats) is called.
    #[must_use]
    pub fn new(name: impl Into<String>, allegiance: Allegiance, home: TileCoord) -> Self {
        Self {
            name: name.into(),
            allegiance,
            sprite: DEFAULT_UNIT_SPRITE.to_string(),
            stats: Stats::default(),
            stats_set: false,
            hp: 0,
            health_state: HealthState::Conscious,
            behaviour_state: BehaviourState::Exploring,
            flee_timer: Fixed::ZERO,
            position: home.to_position(),
            tile: home,
            carried: Vec::new(),
            memory: Memory::default(),
            action: ActionState::default(),
            brain: Brain::default(),
        }
    }

    /// Builder form of [`set_stats`](Self::set_stats).
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::StatsAlreadySet`] if stats were already set.
    pub fn with_stats(mut self, stats: Stats) -> Result<Self> {
        self.set_stats(stats)?;
        Ok(self)
    }

    /// Set the base stats and fill HP to `constitution`. Allowed once.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::StatsAlreadySet`] on a second call and
    /// [`TacticalError::StatOutOfRange`] if any stat exceeds [`STAT_CEILING`].
    pub fn set_stats(&mut self, stats: Stats) -> Result<()> {
        if self.stats_set {
            return Err(TacticalError::StatsAlreadySet(self.name.clone()));
        }
        if let Some((stat, value)) = stats.out_of_range() {
            return Err(TacticalError::StatOutOfRange {
                unit: self.name.clone(),
                stat,
                value,
            });
        }
        self.stats = stats;
        self.stats_set = true;
        self.hp = i32::try_from(stats.constitution).unwrap_or(i32::MAX);
        Ok(())
    }

    /// Register a behaviour with this unit's AI.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::DuplicateBehaviour`] if the name is taken.
    pub fn register_behaviour(&mut self, behaviour: Box<dyn Behaviour>) -> Result<()> {
        self.brain.register(&self.name, behaviour)
    }

    /// Remove a behaviour by name.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::UnknownBehaviour`] if no behaviour has that name.
    pub fn unregister_behaviour(&mut self, name: &str) -> Result<Box<dyn Behaviour>> {
        self.brain.unregister(&self.name, name)
    }

    /// Base stats.
    #[must_use]
    pub const fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Current HP, between zero and constitution.
    #[must_use]
    pub const fn hp(&self) -> i32 {
        self.hp
    }

    /// Health state.
    #[must_use]
    pub const fn health_state(&self) -> HealthState {
        self.health_state
    }

    /// True while the unit takes part in the simulation.
    #[must_use]
    pub fn is_conscious(&self) -> bool {
        self.health_state == HealthState::Conscious
    }

    /// True once HP has dropped to zero.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.health_state == HealthState::Dead
    }

    /// Disposition derived from the last awareness refresh.
    #[must_use]
    pub const fn behaviour_state(&self) -> BehaviourState {
        self.behaviour_state
    }

    /// Remaining flee recovery time.
    #[must_use]
    pub const fn flee_timer(&self) -> Fixed {
        self.flee_timer
    }

    /// Continuous position. Equals the tile centre when not moving.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.position
    }

    /// Tile the unit occupies. While a step is in progress this is already
    /// the destination tile.
    #[must_use]
    pub const fn tile(&self) -> TileCoord {
        self.tile
    }

    /// Sprite key consumed by renderers.
    #[must_use]
    pub fn sprite(&self) -> &str {
        &self.sprite
    }

    /// Treasure carried by this unit.
    #[must_use]
    pub fn carried(&self) -> &[Treasure] {
        &self.carried
    }

    /// Perception memory.
    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Shared in-flight action state.
    #[must_use]
    pub const fn action(&self) -> &ActionState {
        &self.action
    }

    /// True while a step between tiles is in progress.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.action.is_moving()
    }

    /// What the AI is doing right now.
    #[must_use]
    pub fn activity(&self) -> Activity {
        self.brain.current()
    }

    /// Names of registered behaviours, in registration order.
    pub fn behaviour_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.brain.names()
    }

    /// Distance between this unit's position and `point`.
    #[must_use]
    pub fn distance_to(&self, point: Vec2Fixed) -> Fixed {
        self.position.distance(point)
    }

    /// Drop all perception memory and in-flight actions.
    pub(crate) fn forget_everything(&mut self) -> Memory {
        self.action = ActionState::default();
        std::mem::take(&mut self.memory)
    }
}
