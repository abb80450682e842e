//! The tick driver.
//!
//! [`Simulation`] owns the map, the configuration and the random source, and
//! advances every unit once per tick in registration order. Because a later
//! unit sees whatever earlier units changed this tick (occupancy, HP), that
//! order is part of the observable behaviour and never changes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::{self, Activity, SimContext};
use crate::config::SimConfig;
use crate::ids::UnitId;
use crate::map::Map;
use crate::math::Fixed;
use crate::tile::TileCoord;
use crate::unit::Allegiance;

/// One attack landing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackEvent {
    /// Unit that attacked.
    pub attacker: UnitId,
    /// Unit that was hit.
    pub target: UnitId,
    /// HP removed.
    pub damage: u32,
}

/// A unit picking up a treasure pile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootEvent {
    /// Unit that looted.
    pub unit: UnitId,
    /// Tile the pile lay on.
    pub tile: TileCoord,
    /// Pieces taken.
    pub pieces: usize,
}

/// A unit teleporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeleportEvent {
    /// Unit that teleported.
    pub unit: UnitId,
    /// Tile it left.
    pub from: TileCoord,
    /// Tile it arrived on.
    pub to: TileCoord,
}

/// Events generated during a simulation tick.
///
/// These are informational, for logs, reports and effects. The map's change
/// channels carry the fine-grained notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Attacks that landed this tick.
    pub attacks: Vec<AttackEvent>,
    /// Units that died this tick.
    pub deaths: Vec<UnitId>,
    /// Treasure piles picked up this tick.
    pub loot: Vec<LootEvent>,
    /// Teleports this tick.
    pub teleports: Vec<TeleportEvent>,
}

impl TickEvents {
    /// True when nothing notable happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
            && self.deaths.is_empty()
            && self.loot.is_empty()
            && self.teleports.is_empty()
    }
}

/// Which allegiances decide the mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionRules {
    /// The side whose survival matters.
    pub player: Allegiance,
    /// The side that must be defeated.
    pub enemy: Allegiance,
}

/// State of the mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissionOutcome {
    /// Still being fought, or no mission rules were given.
    #[default]
    InProgress,
    /// No enemy unit is conscious.
    Success,
    /// No player unit is conscious.
    Failure,
}

/// The tactical simulation.
///
/// # Tick order
///
/// Each tick, every registered unit runs the AI pipeline
/// ([`ai::update_unit`]) in registration order. Dead units are skipped. After
/// all units have run, the mission outcome is checked once.
#[derive(Debug)]
pub struct Simulation<R: RngCore = ChaCha8Rng> {
    tick: u64,
    elapsed: Fixed,
    map: Map,
    config: SimConfig,
    rng: R,
    mission: Option<MissionRules>,
    outcome: MissionOutcome,
}

impl Simulation<ChaCha8Rng> {
    /// Create a simulation seeded from `config.seed`.
    #[must_use]
    pub fn new(map: Map, config: SimConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::with_rng(map, config, rng)
    }
}

impl<R: RngCore> Simulation<R> {
    /// Create a simulation with an explicit random source.
    #[must_use]
    pub fn with_rng(mut map: Map, config: SimConfig, rng: R) -> Self {
        map.set_terrain_effects(config.terrain_effects);
        Self {
            tick: 0,
            elapsed: Fixed::ZERO,
            map,
            config,
            rng,
            mission: None,
            outcome: MissionOutcome::InProgress,
        }
    }

    /// Attach mission rules.
    #[must_use]
    pub fn with_mission(mut self, rules: MissionRules) -> Self {
        self.mission = Some(rules);
        self
    }

    /// Number of ticks run so far.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds elapsed.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    /// The map.
    #[must_use]
    pub const fn map(&self) -> &Map {
        &self.map
    }

    /// Mutable access to the map, for setup between ticks.
    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Mission rules, if any.
    #[must_use]
    pub const fn mission(&self) -> Option<MissionRules> {
        self.mission
    }

    /// Mission outcome as of the last tick. Once decided it never changes.
    #[must_use]
    pub const fn outcome(&self) -> MissionOutcome {
        self.outcome
    }

    /// Advance every unit by `dt` seconds.
    pub fn tick(&mut self, dt: Fixed) -> TickEvents {
        let mut events = TickEvents::default();
        let order = self.map.unit_ids().to_vec();

        {
            let mut ctx = SimContext {
                map: &mut self.map,
                rng: &mut self.rng,
                config: &self.config,
                events: &mut events,
            };
            for id in order {
                ai::update_unit(&mut ctx, id, dt);
            }
        }

        self.tick += 1;
        self.elapsed = self.elapsed.saturating_add(dt);
        self.check_mission();

        #[cfg(feature = "debug-validation")]
        if let Err(err) = self.map.validate() {
            tracing::error!(tick = self.tick, "Map invariant violated: {}", err);
        }

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    /// Run `ticks` ticks of `dt` seconds, stopping early once the mission is
    /// decided. Returns the number of ticks run.
    pub fn run(&mut self, ticks: u64, dt: Fixed) -> u64 {
        for ran in 0..ticks {
            if self.outcome != MissionOutcome::InProgress {
                return ran;
            }
            self.tick(dt);
        }
        ticks
    }

    fn check_mission(&mut self) {
        let Some(rules) = self.mission else {
            return;
        };
        if self.outcome != MissionOutcome::InProgress {
            return;
        }

        let standing = |allegiance: Allegiance| {
            self.map
                .units()
                .any(|(_, unit)| unit.allegiance == allegiance && unit.is_conscious())
        };
        if !standing(rules.enemy) {
            self.outcome = MissionOutcome::Success;
            info!(tick = self.tick, "Mission success!");
        } else if !standing(rules.player) {
            self.outcome = MissionOutcome::Failure;
            info!(tick = self.tick, "Mission failed!");
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two runs from the same scenario and seed produce the same hash at
    /// every tick.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.elapsed.to_bits().hash(&mut hasher);

        let ids = self.map.unit_ids();
        ids.len().hash(&mut hasher);
        for (id, unit) in self.map.units() {
            id.hash(&mut hasher);
            unit.hp().hash(&mut hasher);
            unit.health_state().hash(&mut hasher);
            unit.behaviour_state().hash(&mut hasher);
            unit.position().x.to_bits().hash(&mut hasher);
            unit.position().y.to_bits().hash(&mut hasher);
            unit.tile().hash(&mut hasher);
            unit.carried().len().hash(&mut hasher);
            unit.action().combat_target.hash(&mut hasher);
            unit.action().loot_target.hash(&mut hasher);
            match unit.activity() {
                Activity::Deciding => 0_u8.hash(&mut hasher),
                Activity::Running(name) => name.hash(&mut hasher),
            }
        }

        self.map.treasure_count().hash(&mut hasher);
        for (id, treasure) in self.map.treasure_iter() {
            id.hash(&mut hasher);
            treasure.gp.hash(&mut hasher);
            treasure.tile().hash(&mut hasher);
        }

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviours::{CombatKit, WanderKit};
    use crate::unit::{Stats, Unit};

    fn fighter(name: &str, allegiance: u32, x: i32, y: i32) -> Unit {
        let mut unit = Unit::new(name, Allegiance(allegiance), TileCoord::new(x, y))
            .with_stats(Stats {
                strength: 10,
                precision: 10,
                constitution: 20,
                dexterity: 20,
                perception: 5,
                intelligence: 3,
                bravery: 100,
                greed: 0,
            })
            .unwrap();
        WanderKit::default().register(&mut unit).unwrap();
        CombatKit.register(&mut unit).unwrap();
        unit
    }

    fn skirmish() -> Map {
        let mut map = Map::new(6, 6);
        map.place_unit(fighter("a", 1, 0, 0)).unwrap();
        map.place_unit(fighter("b", 1, 0, 5)).unwrap();
        map.place_unit(fighter("c", 2, 5, 2)).unwrap();
        map
    }

    #[test]
    fn test_new_simulation() {
        let sim = Simulation::new(Map::new(3, 3), SimConfig::default());
        assert_eq!(sim.get_tick(), 0);
        assert_eq!(sim.elapsed(), Fixed::ZERO);
        assert_eq!(sim.outcome(), MissionOutcome::InProgress);
    }

    #[test]
    fn test_tick_advances_counters() {
        let mut sim = Simulation::new(skirmish(), SimConfig::default());
        sim.tick(Fixed::from_num(0.5));
        sim.tick(Fixed::from_num(0.5));
        assert_eq!(sim.get_tick(), 2);
        assert_eq!(sim.elapsed(), Fixed::ONE);
    }

    #[test]
    fn test_same_seed_same_hashes() {
        let config = SimConfig::default().with_seed(42);
        let mut a = Simulation::new(skirmish(), config.clone());
        let mut b = Simulation::new(skirmish(), config);
        for _ in 0..200 {
            a.tick(Fixed::from_num(0.1));
            b.tick(Fixed::from_num(0.1));
            assert_eq!(a.state_hash(), b.state_hash());
        }
    }

    #[test]
    fn test_mission_success_when_enemies_fall() {
        let mut map = skirmish();
        let enemy = map.unit_ids()[2];
        map.damage_unit(enemy, 100).unwrap();
        let mut sim = Simulation::new(map, SimConfig::default()).with_mission(MissionRules {
            player: Allegiance(1),
            enemy: Allegiance(2),
        });
        sim.tick(Fixed::ONE);
        assert_eq!(sim.outcome(), MissionOutcome::Success);
        assert_eq!(sim.run(10, Fixed::ONE), 0);
    }

    #[test]
    fn test_mission_failure_when_players_fall() {
        let mut map = skirmish();
        let ids = map.unit_ids().to_vec();
        map.damage_unit(ids[0], 100).unwrap();
        map.damage_unit(ids[1], 100).unwrap();
        let mut sim = Simulation::new(map, SimConfig::default()).with_mission(MissionRules {
            player: Allegiance(1),
            enemy: Allegiance(2),
        });
        sim.tick(Fixed::ONE);
        assert_eq!(sim.outcome(), MissionOutcome::Failure);
    }

    #[test]
    fn test_skirmish_keeps_invariants() {
        let mut sim = Simulation::new(skirmish(), SimConfig::default().with_seed(3));
        for _ in 0..300 {
            sim.tick(Fixed::from_num(0.1));
            sim.map().validate().unwrap();
        }
    }
}
