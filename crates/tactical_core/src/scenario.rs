//! Scenario files.
//!
//! A scenario is the complete starting state of a run: map size and terrain,
//! allegiance settings, the unit roster with stats and behaviour kits, ground
//! treasure, mission rules and tuning. Scenarios are written in RON:
//!
//! ```ron
//! Scenario(
//!     name: "Duel",
//!     width: 6,
//!     height: 1,
//!     units: [
//!         (name: "a", allegiance: 1, x: 0, y: 0, stats: (...), kits: [Combat]),
//!         (name: "b", allegiance: 2, x: 5, y: 0, stats: (...), kits: [Combat]),
//!     ],
//!     mission: Some((player: 1, enemy: 2)),
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::behaviours::BehaviourKit;
use crate::config::SimConfig;
use crate::error::{Result, TacticalError};
use crate::map::{AllegianceProfile, Colour, Map};
use crate::math::{fixed_decimal, Fixed};
use crate::simulation::{MissionRules, Simulation};
use crate::tile::TileCoord;
use crate::treasure::Treasure;
use crate::unit::{Allegiance, Stats, Unit};

/// A complete scenario definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map width in tiles.
    pub width: i32,
    /// Map height in tiles.
    pub height: i32,
    /// Tiles that differ from open ground.
    #[serde(default)]
    pub terrain: Vec<TerrainPatch>,
    /// Colour and loot settings per allegiance.
    #[serde(default)]
    pub allegiances: Vec<AllegianceSetup>,
    /// Units, registered (and therefore updated) in this order.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
    /// Treasure lying on the ground at the start.
    #[serde(default)]
    pub treasure: Vec<TreasurePlacement>,
    /// Win and loss conditions.
    #[serde(default)]
    pub mission: Option<MissionRules>,
    /// Tuning constants.
    #[serde(default)]
    pub config: SimConfig,
}

/// Costs and sprite for a single tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainPatch {
    /// Tile x.
    pub x: i32,
    /// Tile y.
    pub y: i32,
    /// Multiplier for entering the tile. Zero makes it impassable.
    #[serde(default = "open_ground", with = "fixed_decimal")]
    pub cost_to_enter: Fixed,
    /// Multiplier for leaving the tile.
    #[serde(default = "open_ground", with = "fixed_decimal")]
    pub cost_to_leave: Fixed,
    /// Sprite index.
    #[serde(default)]
    pub sprite: Option<u32>,
}

fn open_ground() -> Fixed {
    Fixed::ONE
}

/// Settings for one allegiance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllegianceSetup {
    /// Which allegiance.
    pub id: Allegiance,
    /// Display colour.
    pub colour: Colour,
    /// Whether its units look for treasure.
    #[serde(default)]
    pub seeks_loot: bool,
}

/// A unit to place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Display name.
    pub name: String,
    /// Team.
    pub allegiance: Allegiance,
    /// Home tile x.
    pub x: i32,
    /// Home tile y.
    pub y: i32,
    /// Base stats.
    pub stats: Stats,
    /// Behaviour kits, registered in order.
    #[serde(default)]
    pub kits: Vec<BehaviourKit>,
    /// Sprite key.
    #[serde(default)]
    pub sprite: Option<String>,
}

impl UnitPlacement {
    /// Create a placement with the given kits.
    #[must_use]
    pub fn new(
        name: &str,
        allegiance: u32,
        (x, y): (i32, i32),
        stats: Stats,
        kits: Vec<BehaviourKit>,
    ) -> Self {
        Self {
            name: name.to_string(),
            allegiance: Allegiance(allegiance),
            x,
            y,
            stats,
            kits,
            sprite: None,
        }
    }

    fn build(&self) -> Result<Unit> {
        let mut unit = Unit::new(&self.name, self.allegiance, TileCoord::new(self.x, self.y))
            .with_stats(self.stats)?;
        if let Some(sprite) = &self.sprite {
            unit.sprite.clone_from(sprite);
        }
        for kit in &self.kits {
            kit.register(&mut unit)?;
        }
        Ok(unit)
    }
}

/// Treasure to drop on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasurePlacement {
    /// Value in gold pieces.
    pub gp: u32,
    /// Tile x.
    pub x: i32,
    /// Tile y.
    pub y: i32,
    /// Sprite key.
    #[serde(default)]
    pub sprite: Option<String>,
}

impl TreasurePlacement {
    /// Treasure of `gp` at `(x, y)`.
    #[must_use]
    pub const fn new(gp: u32, x: i32, y: i32) -> Self {
        Self {
            gp,
            x,
            y,
            sprite: None,
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::ScenarioParse`] if the file cannot be read or
    /// parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|e| TacticalError::ScenarioParse {
            path: label.clone(),
            message: e.to_string(),
        })?;
        Self::parse(&contents, label)
    }

    /// Load from a RON string (useful for embedded scenarios).
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::ScenarioParse`] if the string is not a valid
    /// scenario.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        Self::parse(ron, "<string>".to_string())
    }

    fn parse(ron: &str, path: String) -> Result<Self> {
        ron::from_str(ron).map_err(|e| TacticalError::ScenarioParse {
            path,
            message: e.to_string(),
        })
    }

    /// Serialize back to pretty RON.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::InvalidState`] if serialization fails.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| TacticalError::InvalidState(e.to_string()))
    }

    /// Build the map described by this scenario.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config, on stats above the ceiling, or on the
    /// first placement that does not fit: a terrain patch or treasure off the
    /// map, or a unit on an occupied or missing tile.
    pub fn build_map(&self) -> Result<Map> {
        self.config.validate()?;
        let mut map = Map::new(self.width, self.height);
        map.set_terrain_effects(self.config.terrain_effects);

        for patch in &self.terrain {
            let coord = TileCoord::new(patch.x, patch.y);
            map.set_tile_costs(coord, patch.cost_to_enter, patch.cost_to_leave)?;
            if let Some(sprite) = patch.sprite {
                map.set_tile_sprite(coord, sprite)?;
            }
        }

        for setup in &self.allegiances {
            map.set_allegiance(
                setup.id,
                AllegianceProfile {
                    colour: setup.colour,
                    seeks_loot: setup.seeks_loot,
                },
            );
        }

        for placement in &self.units {
            map.place_unit(placement.build()?)?;
        }

        for placement in &self.treasure {
            let mut treasure = Treasure::new(placement.gp);
            if let Some(sprite) = &placement.sprite {
                treasure = treasure.with_sprite(sprite.as_str());
            }
            map.place_treasure(treasure, placement.x, placement.y)?;
        }

        debug!(
            "Built scenario '{}': {}x{}, {} units, {} treasure",
            self.name,
            self.width,
            self.height,
            map.unit_count(),
            map.treasure_count()
        );
        Ok(map)
    }

    /// Build a ready-to-run simulation, seeded from the scenario config.
    ///
    /// # Errors
    ///
    /// See [`Scenario::build_map`].
    pub fn build(&self) -> Result<Simulation> {
        let sim = Simulation::new(self.build_map()?, self.config.clone());
        Ok(match self.mission {
            Some(rules) => sim.with_mission(rules),
            None => sim,
        })
    }

    /// A small skirmish across a ford: three green soldiers who also loot,
    /// three red raiders, a shallow river and a few piles of gold.
    #[must_use]
    pub fn sample() -> Self {
        let soldier = Stats {
            strength: 6,
            precision: 50,
            constitution: 30,
            dexterity: 20,
            perception: 5,
            intelligence: 4,
            bravery: 60,
            greed: 40,
        };
        let raider = Stats {
            strength: 8,
            constitution: 24,
            dexterity: 25,
            bravery: 40,
            greed: 10,
            ..soldier
        };
        let soldier_kits = vec![
            BehaviourKit::Wander { teleport: false },
            BehaviourKit::Loot,
            BehaviourKit::Combat,
        ];
        let raider_kits = vec![BehaviourKit::Wander { teleport: false }, BehaviourKit::Combat];

        let mut terrain: Vec<TerrainPatch> = (0..8)
            .map(|y| TerrainPatch {
                x: 6,
                y,
                cost_to_enter: Fixed::from_num(0.5),
                cost_to_leave: Fixed::from_num(0.5),
                sprite: Some(2),
            })
            .collect();
        terrain.push(TerrainPatch {
            x: 3,
            y: 3,
            cost_to_enter: Fixed::ZERO,
            cost_to_leave: Fixed::ONE,
            sprite: Some(3),
        });

        Self {
            name: "Ford skirmish".to_string(),
            description: "Three soldiers hold a river crossing against three raiders".to_string(),
            width: 12,
            height: 8,
            terrain,
            allegiances: vec![
                AllegianceSetup {
                    id: Allegiance(1),
                    colour: Colour::GREEN,
                    seeks_loot: true,
                },
                AllegianceSetup {
                    id: Allegiance(2),
                    colour: Colour::RED,
                    seeks_loot: false,
                },
            ],
            units: vec![
                UnitPlacement::new("Aldric", 1, (1, 2), soldier, soldier_kits.clone()),
                UnitPlacement::new("Bryn", 1, (1, 4), soldier, soldier_kits.clone()),
                UnitPlacement::new("Cora", 1, (2, 6), soldier, soldier_kits),
                UnitPlacement::new("Raider 1", 2, (10, 1), raider, raider_kits.clone()),
                UnitPlacement::new("Raider 2", 2, (10, 4), raider, raider_kits.clone()),
                UnitPlacement::new("Raider 3", 2, (9, 6), raider, raider_kits),
            ],
            treasure: vec![
                TreasurePlacement::new(25, 4, 1),
                TreasurePlacement::new(10, 4, 1),
                TreasurePlacement::new(50, 8, 4),
                TreasurePlacement::new(5, 2, 7),
            ],
            mission: Some(MissionRules {
                player: Allegiance(1),
                enemy: Allegiance(2),
            }),
            config: SimConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUEL: &str = r#"
        Scenario(
            name: "Duel",
            width: 6,
            height: 1,
            terrain: [(x: 2, y: 0, cost_to_enter: 0.0)],
            allegiances: [(id: 1, colour: (r: 0, g: 255, b: 0), seeks_loot: true)],
            units: [
                (
                    name: "a",
                    allegiance: 1,
                    x: 0,
                    y: 0,
                    stats: (strength: 5, precision: 0, constitution: 10, dexterity: 10,
                            perception: 5, intelligence: 3, bravery: 50, greed: 20),
                    kits: [Wander(teleport: true), Combat],
                ),
            ],
            treasure: [(gp: 30, x: 5, y: 0, sprite: Some("chest"))],
            config: (seed: 99),
        )
    "#;

    #[test]
    fn test_parse_ron_scenario() {
        let scenario = Scenario::from_ron_str(DUEL).unwrap();
        assert_eq!(scenario.name, "Duel");
        assert_eq!(scenario.units.len(), 1);
        assert_eq!(scenario.terrain[0].cost_to_enter, Fixed::ZERO);
        assert_eq!(scenario.terrain[0].cost_to_leave, Fixed::ONE);
        assert_eq!(scenario.config.seed, 99);
        assert_eq!(scenario.mission, None);
    }

    #[test]
    fn test_build_places_everything() {
        let sim = Scenario::from_ron_str(DUEL).unwrap().build().unwrap();
        let map = sim.map();
        assert_eq!(map.unit_count(), 1);
        assert_eq!(map.treasure_count(), 1);
        assert!(map.seeks_loot(Allegiance(1)));
        assert!(!map.tile_at(2, 0).unwrap().is_enterable());

        let (_, unit) = map.units().next().unwrap();
        assert_eq!(
            unit.behaviour_names().collect::<Vec<_>>(),
            vec!["wander", "rest", "teleport", "target", "reposition", "attack", "flee"]
        );
        let (_, chest) = map.treasure_iter().next().unwrap();
        assert_eq!(chest.sprite, "chest");
    }

    #[test]
    fn test_overlapping_units_fail_to_build() {
        let mut scenario = Scenario::sample();
        let first = scenario.units[0].clone();
        scenario.units.push(first);
        assert!(matches!(
            scenario.build_map(),
            Err(TacticalError::TileOccupied(_))
        ));
    }

    #[test]
    fn test_oversized_stat_is_rejected_at_build() {
        let text = DUEL.replace("perception: 5", "perception: 3000000000");
        let scenario = Scenario::from_ron_str(&text).unwrap();
        match scenario.build() {
            Err(TacticalError::StatOutOfRange { unit, stat, value }) => {
                assert_eq!(unit, "a");
                assert_eq!(stat, "perception");
                assert_eq!(value, 3_000_000_000);
            }
            other => panic!("expected a stat error, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_stat_scale_is_rejected_at_build() {
        let text = DUEL.replace(
            "config: (seed: 99)",
            "config: (seed: 99, max_stat_score: 4000000000)",
        );
        let scenario = Scenario::from_ron_str(&text).unwrap();
        assert!(matches!(
            scenario.build(),
            Err(TacticalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_bad_ron_reports_parse_error() {
        assert!(matches!(
            Scenario::from_ron_str("Scenario(name: 3)"),
            Err(TacticalError::ScenarioParse { .. })
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        match Scenario::load("does/not/exist.ron") {
            Err(TacticalError::ScenarioParse { path, .. }) => {
                assert_eq!(path, "does/not/exist.ron");
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_sample_round_trips_through_ron() {
        let sample = Scenario::sample();
        let text = sample.to_ron_string().unwrap();
        assert_eq!(Scenario::from_ron_str(&text).unwrap(), sample);
    }

    #[test]
    fn test_sample_builds_a_valid_map() {
        let sim = Scenario::sample().build().unwrap();
        assert_eq!(sim.map().unit_count(), 6);
        assert_eq!(sim.map().treasure_count(), 4);
        sim.map().validate().unwrap();
    }
}
