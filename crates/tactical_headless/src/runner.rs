//! Single scenario runs.
//!
//! [`run_scenario`] drives a [`Simulation`] to completion (or a tick limit)
//! and condenses what happened into a serializable [`RunReport`].

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tactical_core::math::Fixed;
use tactical_core::scenario::Scenario;
use tactical_core::simulation::{MissionOutcome, Simulation, TickEvents};
use tactical_core::treasure::total_gp;
use tactical_core::unit::{BehaviourState, HealthState};
use tracing::{debug, info};

use crate::error::{HeadlessError, Result};

/// Progress logging interval (ticks).
const PROGRESS_LOG_INTERVAL: u64 = 100;

/// How long and how finely to run a scenario.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunConfig {
    /// Maximum ticks before giving up on a mission outcome.
    pub max_ticks: u64,
    /// Seconds per tick.
    pub dt: Fixed,
    /// Replaces the scenario's own seed when set.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_ticks: 600,
            dt: Fixed::from_num(0.1),
            seed: None,
        }
    }
}

impl RunConfig {
    /// Build a config from command-line values.
    ///
    /// # Errors
    ///
    /// Returns [`HeadlessError::InvalidArgument`] for a non-positive or
    /// unrepresentable `dt`.
    pub fn from_args(max_ticks: u64, dt: f64, seed: Option<u64>) -> Result<Self> {
        let dt = Fixed::checked_from_num(dt)
            .filter(|dt| *dt > Fixed::ZERO)
            .ok_or_else(|| HeadlessError::InvalidArgument(format!("dt must be positive, got {dt}")))?;
        Ok(Self {
            max_ticks,
            dt,
            seed,
        })
    }

    /// Set the seed override.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Final state of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    /// Display name.
    pub name: String,
    /// Team number.
    pub allegiance: u32,
    /// Remaining HP.
    pub hp: i32,
    /// Health at the end of the run.
    pub health: HealthState,
    /// Disposition at the end of the run.
    pub state: BehaviourState,
    /// Tile the unit ended on.
    pub tile: (i32, i32),
    /// Gold carried.
    pub carried_gp: u64,
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: String,
    /// Seed the run used.
    pub seed: u64,
    /// Ticks actually simulated.
    pub ticks: u64,
    /// Simulated seconds.
    pub elapsed_seconds: f64,
    /// Mission result, `InProgress` if undecided or no mission was set.
    pub outcome: MissionOutcome,
    /// Attacks that landed.
    pub attacks: usize,
    /// Total damage dealt.
    pub damage: u64,
    /// Units killed.
    pub deaths: usize,
    /// Treasure piles picked up.
    pub pickups: usize,
    /// Teleports taken.
    pub teleports: usize,
    /// Gold still lying on the ground.
    pub ground_gp: u64,
    /// Final per-unit state, in registration order.
    pub units: Vec<UnitReport>,
    /// Final simulation state hash.
    pub final_state_hash: u64,
    /// Wall-clock time spent, in milliseconds.
    #[serde(default)]
    pub wall_ms: u64,
}

impl RunReport {
    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as JSON to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`HeadlessError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_file(path, &self.to_json()?)
    }

    /// Whether the player side won.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == MissionOutcome::Success
    }
}

/// Running tally of tick events.
#[derive(Debug, Default)]
struct Tally {
    attacks: usize,
    damage: u64,
    deaths: usize,
    pickups: usize,
    teleports: usize,
}

impl Tally {
    fn record(&mut self, events: &TickEvents) {
        self.attacks += events.attacks.len();
        self.damage += events
            .attacks
            .iter()
            .map(|a| u64::from(a.damage))
            .sum::<u64>();
        self.deaths += events.deaths.len();
        self.pickups += events.loot.len();
        self.teleports += events.teleports.len();
    }
}

/// Load a scenario file, or the built-in sample when no path is given.
///
/// # Errors
///
/// Returns [`HeadlessError::Scenario`] if the file cannot be read or parsed.
pub fn load_scenario(path: Option<&Path>) -> Result<Scenario> {
    match path {
        Some(path) => {
            let scenario = Scenario::load(path)?;
            info!(scenario = %scenario.name, path = %path.display(), "Loaded scenario");
            Ok(scenario)
        }
        None => {
            info!("Using built-in sample scenario");
            Ok(Scenario::sample())
        }
    }
}

/// Run `scenario` until the mission is decided or `config.max_ticks` pass.
///
/// # Errors
///
/// Returns [`HeadlessError::Scenario`] if the scenario does not build.
pub fn run_scenario(scenario: &Scenario, config: &RunConfig) -> Result<RunReport> {
    let started = Instant::now();
    let mut scenario = scenario.clone();
    if let Some(seed) = config.seed {
        scenario.config.seed = seed;
    }
    let seed = scenario.config.seed;
    let mut sim = scenario.build()?;

    info!(
        scenario = %scenario.name,
        seed,
        max_ticks = config.max_ticks,
        units = sim.map().unit_count(),
        "Starting run"
    );

    let mut tally = Tally::default();
    while sim.get_tick() < config.max_ticks && sim.outcome() == MissionOutcome::InProgress {
        let events = sim.tick(config.dt);
        if !events.is_empty() {
            debug!(
                tick = sim.get_tick(),
                attacks = events.attacks.len(),
                deaths = events.deaths.len(),
                loot = events.loot.len(),
                teleports = events.teleports.len(),
                "Tick events"
            );
        }
        tally.record(&events);

        if sim.get_tick() % PROGRESS_LOG_INTERVAL == 0 {
            debug!(tick = sim.get_tick(), hash = sim.state_hash(), "Progress");
        }
    }

    let report = summarize(&scenario, seed, &sim, tally, started);
    info!(
        scenario = %report.scenario,
        seed,
        ticks = report.ticks,
        outcome = ?report.outcome,
        deaths = report.deaths,
        "Run finished"
    );
    Ok(report)
}

fn summarize(
    scenario: &Scenario,
    seed: u64,
    sim: &Simulation,
    tally: Tally,
    started: Instant,
) -> RunReport {
    let map = sim.map();
    let units = map
        .units()
        .map(|(_, unit)| UnitReport {
            name: unit.name.clone(),
            allegiance: unit.allegiance.0,
            hp: unit.hp(),
            health: unit.health_state(),
            state: unit.behaviour_state(),
            tile: (unit.tile().x, unit.tile().y),
            carried_gp: total_gp(unit.carried()),
        })
        .collect();

    RunReport {
        scenario: scenario.name.clone(),
        seed,
        ticks: sim.get_tick(),
        elapsed_seconds: sim.elapsed().to_num::<f64>(),
        outcome: sim.outcome(),
        attacks: tally.attacks,
        damage: tally.damage,
        deaths: tally.deaths,
        pickups: tally.pickups,
        teleports: tally.teleports,
        ground_gp: total_gp(map.treasure_iter().map(|(_, t)| t)),
        units,
        final_state_hash: sim.state_hash(),
        wall_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}

/// Write `text` to `path`, or to stdout when no path is given.
///
/// # Errors
///
/// Returns [`HeadlessError::Io`] if the file cannot be written.
pub fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            write_file(path, text)?;
            info!(path = %path.display(), "Wrote output");
            Ok(())
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<()> {
    let io_error = |source| HeadlessError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, contents).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactical_test_utils::fixtures;

    #[test]
    fn test_rejects_bad_dt() {
        assert!(RunConfig::from_args(10, 0.0, None).is_err());
        assert!(RunConfig::from_args(10, -1.0, None).is_err());
        assert!(RunConfig::from_args(10, f64::NAN, None).is_err());
        let config = RunConfig::from_args(10, 0.25, Some(7)).unwrap();
        assert_eq!(config.dt, Fixed::from_num(0.25));
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_run_respects_tick_limit() {
        let config = RunConfig {
            max_ticks: 5,
            ..RunConfig::default()
        };
        let report = run_scenario(&Scenario::sample(), &config).unwrap();
        assert_eq!(report.ticks, 5);
        assert_eq!(report.units.len(), 6);
        assert_eq!(report.outcome, MissionOutcome::InProgress);
    }

    #[test]
    fn test_seed_override() {
        let config = RunConfig {
            max_ticks: 3,
            ..RunConfig::default()
        }
        .with_seed(77);
        let report = run_scenario(&Scenario::sample(), &config).unwrap();
        assert_eq!(report.seed, 77);
    }

    #[test]
    fn test_loot_race_report() {
        let config = RunConfig {
            max_ticks: 40,
            dt: Fixed::from_num(0.5),
            seed: None,
        };
        let report = run_scenario(&fixtures::loot_race_scenario(), &config).unwrap();
        assert_eq!(report.pickups, 1);
        assert_eq!(report.ground_gp, 0);
        let carried: u64 = report.units.iter().map(|u| u.carried_gp).sum();
        assert_eq!(carried, 42);
    }

    #[test]
    fn test_report_json_round_trip() {
        let config = RunConfig {
            max_ticks: 10,
            ..RunConfig::default()
        };
        let report = run_scenario(&Scenario::sample(), &config).unwrap();
        let parsed: RunReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed.final_state_hash, report.final_state_hash);
        assert_eq!(parsed.units, report.units);
    }
}
