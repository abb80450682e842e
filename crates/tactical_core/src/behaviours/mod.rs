//! Concrete behaviours and the kits that register them together.
//!
//! A unit only does what its registered behaviours let it do. Kits bundle
//! the behaviours that make sense together so that setup code (and scenario
//! files) can say "this unit fights" instead of naming every piece.

pub mod combat;
pub mod loot;
pub mod wander;

use serde::{Deserialize, Serialize};

pub use combat::{Attack, Flee, Reposition, Target};
pub use loot::Loot;
pub use wander::{Rest, Teleport, Wander};

use crate::error::Result;
use crate::unit::Unit;

/// Wander and rest, optionally with teleport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WanderKit {
    /// Also register [`Teleport`].
    pub teleport: bool,
}

impl WanderKit {
    /// Register the kit's behaviours on `unit`.
    ///
    /// # Errors
    ///
    /// Fails if any of the behaviours is already registered.
    pub fn register(self, unit: &mut Unit) -> Result<()> {
        unit.register_behaviour(Box::new(Wander::default()))?;
        unit.register_behaviour(Box::new(Rest::default()))?;
        if self.teleport {
            unit.register_behaviour(Box::new(Teleport::default()))?;
        }
        Ok(())
    }
}

/// Treasure collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LootKit;

impl LootKit {
    /// Register [`Loot`] on `unit`.
    ///
    /// # Errors
    ///
    /// Fails if the behaviour is already registered.
    pub fn register(self, unit: &mut Unit) -> Result<()> {
        unit.register_behaviour(Box::new(Loot::default()))
    }
}

/// Targeting, repositioning, attacking and fleeing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombatKit;

impl CombatKit {
    /// Register the kit's behaviours on `unit`.
    ///
    /// # Errors
    ///
    /// Fails if any of the behaviours is already registered.
    pub fn register(self, unit: &mut Unit) -> Result<()> {
        unit.register_behaviour(Box::new(Target::default()))?;
        unit.register_behaviour(Box::new(Reposition))?;
        unit.register_behaviour(Box::new(Attack::default()))?;
        unit.register_behaviour(Box::new(Flee::default()))
    }
}

/// A kit as written in scenario files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviourKit {
    /// See [`WanderKit`].
    Wander {
        /// Also teleport now and then.
        #[serde(default)]
        teleport: bool,
    },
    /// See [`LootKit`].
    Loot,
    /// See [`CombatKit`].
    Combat,
}

impl BehaviourKit {
    /// Register this kit on `unit`.
    ///
    /// # Errors
    ///
    /// Fails if any of the kit's behaviours is already registered.
    pub fn register(self, unit: &mut Unit) -> Result<()> {
        match self {
            Self::Wander { teleport } => WanderKit { teleport }.register(unit),
            Self::Loot => LootKit.register(unit),
            Self::Combat => CombatKit.register(unit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Behaviour;
    use crate::error::TacticalError;
    use crate::tile::TileCoord;
    use crate::unit::Allegiance;

    fn blank() -> Unit {
        Unit::new("blank", Allegiance(1), TileCoord::new(0, 0))
    }

    #[test]
    fn test_kits_register_in_order() {
        let mut unit = blank();
        WanderKit { teleport: true }.register(&mut unit).unwrap();
        LootKit.register(&mut unit).unwrap();
        CombatKit.register(&mut unit).unwrap();
        let names: Vec<_> = unit.behaviour_names().collect();
        assert_eq!(
            names,
            vec!["wander", "rest", "teleport", "loot", "target", "reposition", "attack", "flee"]
        );
    }

    #[test]
    fn test_registering_a_kit_twice_fails() {
        let mut unit = blank();
        CombatKit.register(&mut unit).unwrap();
        assert!(matches!(
            CombatKit.register(&mut unit),
            Err(TacticalError::DuplicateBehaviour { .. })
        ));
    }

    #[test]
    fn test_unregister_removes_one_behaviour() {
        let mut unit = blank();
        WanderKit::default().register(&mut unit).unwrap();
        let removed = unit.unregister_behaviour(Rest::NAME).unwrap();
        assert_eq!(removed.name(), "rest");
        assert_eq!(unit.behaviour_names().collect::<Vec<_>>(), vec!["wander"]);
    }

    #[test]
    fn test_kit_parses_from_ron() {
        let kits: Vec<BehaviourKit> =
            ron::from_str("[Wander(teleport: true), Wander(teleport: false), Loot, Combat]").unwrap();
        assert_eq!(
            kits,
            vec![
                BehaviourKit::Wander { teleport: true },
                BehaviourKit::Wander { teleport: false },
                BehaviourKit::Loot,
                BehaviourKit::Combat,
            ]
        );
    }
}
