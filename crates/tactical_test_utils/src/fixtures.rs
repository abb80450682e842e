//! Test fixtures and helpers.
//!
//! Pre-built units, maps and simulations for consistent testing.
//!
//! # Panics
//!
//! Builders here unwrap freely: a fixture that fails to build is a broken
//! test, not a runtime condition.

use fixed::types::I32F32;
use tactical_core::behaviours::{BehaviourKit, CombatKit, LootKit, WanderKit};
use tactical_core::map::{AllegianceProfile, Colour, Map};
use tactical_core::scenario::{Scenario, TreasurePlacement, UnitPlacement};
use tactical_core::simulation::{MissionRules, Simulation};
use tactical_core::tile::TileCoord;
use tactical_core::unit::{Allegiance, Stats, Unit};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Middle-of-the-road stats: 20 HP, a 1.5 s attack cooldown-ish tempo,
/// sight 5, memory 3 s, unshakeable.
#[must_use]
pub const fn soldier_stats() -> Stats {
    Stats {
        strength: 5,
        precision: 50,
        constitution: 20,
        dexterity: 20,
        perception: 5,
        intelligence: 3,
        bravery: 100,
        greed: 50,
    }
}

/// A bare unit with `stats` and no behaviours.
///
/// # Panics
///
/// Never in practice: stats are set exactly once.
#[must_use]
pub fn unit(name: &str, allegiance: u32, x: i32, y: i32, stats: Stats) -> Unit {
    Unit::new(name, Allegiance(allegiance), TileCoord::new(x, y))
        .with_stats(stats)
        .expect("fresh unit accepts stats")
}

/// A soldier with the wander and combat kits.
///
/// # Panics
///
/// Never in practice: kits do not overlap.
#[must_use]
pub fn fighter(name: &str, allegiance: u32, x: i32, y: i32) -> Unit {
    let mut fighter = unit(name, allegiance, x, y, soldier_stats());
    WanderKit::default()
        .register(&mut fighter)
        .expect("wander kit registers");
    CombatKit.register(&mut fighter).expect("combat kit registers");
    fighter
}

/// A soldier that only loots.
///
/// # Panics
///
/// Never in practice.
#[must_use]
pub fn looter(name: &str, allegiance: u32, x: i32, y: i32, greed: u32) -> Unit {
    let mut looter = unit(
        name,
        allegiance,
        x,
        y,
        Stats {
            greed,
            ..soldier_stats()
        },
    );
    LootKit.register(&mut looter).expect("loot kit registers");
    looter
}

/// An open map where `allegiance` looks for treasure.
#[must_use]
pub fn looting_map(width: i32, height: i32, allegiance: u32) -> Map {
    let mut map = Map::new(width, height);
    map.set_allegiance(
        Allegiance(allegiance),
        AllegianceProfile {
            colour: Colour::GREEN,
            seeks_loot: true,
        },
    );
    map
}

/// Two fighters on a 6x1 strip, three tiles apart, with mission rules.
///
/// # Panics
///
/// Never in practice: the placements fit.
#[must_use]
pub fn duel() -> Simulation {
    let mut map = Map::new(6, 1);
    map.place_unit(fighter("blue", 1, 1, 0)).expect("blue fits");
    map.place_unit(fighter("red", 2, 4, 0)).expect("red fits");
    Simulation::new(map, tactical_core::config::SimConfig::default()).with_mission(MissionRules {
        player: Allegiance(1),
        enemy: Allegiance(2),
    })
}

/// The built-in sample scenario, ready to run.
///
/// # Panics
///
/// Never in practice: the sample is known to build.
#[must_use]
pub fn skirmish() -> Simulation {
    Scenario::sample().build().expect("sample scenario builds")
}

/// Two greedy looters on either side of a single two-piece pile.
#[must_use]
pub fn loot_race_scenario() -> Scenario {
    let kits = vec![BehaviourKit::Loot];
    Scenario {
        name: "Loot race".to_string(),
        description: "Two allies, one pile".to_string(),
        width: 7,
        height: 1,
        terrain: Vec::new(),
        allegiances: vec![tactical_core::scenario::AllegianceSetup {
            id: Allegiance(1),
            colour: Colour::GREEN,
            seeks_loot: true,
        }],
        units: vec![
            UnitPlacement::new("left", 1, (0, 0), soldier_stats(), kits.clone()),
            UnitPlacement::new("right", 1, (6, 0), soldier_stats(), kits),
        ],
        treasure: vec![TreasurePlacement::new(40, 3, 0), TreasurePlacement::new(2, 3, 0)],
        mission: None,
        config: tactical_core::config::SimConfig::default(),
    }
}
