//! Batch runner.
//!
//! Runs one scenario across many seeds in parallel using rayon, and checks
//! that a seed replays identically.

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tactical_core::scenario::Scenario;
use tactical_core::simulation::MissionOutcome;
use tracing::{info, warn};

use crate::error::{HeadlessError, Result};
use crate::runner::{run_scenario, write_file, RunConfig, RunReport};

/// Configuration for a batch run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchConfig {
    /// Number of runs.
    pub runs: u32,
    /// Seed of the first run; run `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Per-run settings. Its seed override is ignored.
    pub run: RunConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            runs: 20,
            seed_start: 0,
            run: RunConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Create config for `runs` runs.
    pub fn new(runs: u32) -> Self {
        Self {
            runs,
            ..Default::default()
        }
    }

    /// Set seed start.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }
}

/// A run that failed to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Aggregate outcome counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Runs completed.
    pub total: usize,
    /// Runs the player side won.
    pub successes: usize,
    /// Runs the player side lost.
    pub failures: usize,
    /// Runs still undecided at the tick limit.
    pub undecided: usize,
    /// Mean ticks per run.
    pub mean_ticks: f64,
    /// Mean deaths per run.
    pub mean_deaths: f64,
}

impl BatchSummary {
    /// Summarize finished runs.
    #[must_use]
    pub fn from_reports(reports: &[RunReport]) -> Self {
        let total = reports.len();
        let count = |outcome: MissionOutcome| reports.iter().filter(|r| r.outcome == outcome).count();
        let mean = |sum: u64| {
            if total == 0 {
                0.0
            } else {
                sum as f64 / total as f64
            }
        };
        Self {
            total,
            successes: count(MissionOutcome::Success),
            failures: count(MissionOutcome::Failure),
            undecided: count(MissionOutcome::InProgress),
            mean_ticks: mean(reports.iter().map(|r| r.ticks).sum()),
            mean_deaths: mean(reports.iter().map(|r| r.deaths as u64).sum()),
        }
    }

    /// Fraction of runs the player side won.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successes as f64 / self.total as f64
        }
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario name.
    pub scenario: String,
    /// Individual run reports, in seed order.
    pub runs: Vec<RunReport>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Runs that failed.
    pub errors: Vec<BatchError>,
    /// Total wall-clock runtime.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`HeadlessError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_file(path, &serde_json::to_string_pretty(self)?)
    }
}

/// Run `scenario` once per seed, in parallel.
pub fn run_batch(scenario: &Scenario, config: &BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        scenario = %scenario.name,
        runs = config.runs,
        seed_start = config.seed_start,
        "Starting batch"
    );

    let results: Vec<std::result::Result<RunReport, BatchError>> = (0..config.runs)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            run_scenario(scenario, &config.run.with_seed(seed)).map_err(|err| {
                warn!(seed, "Run failed: {}", err);
                BatchError {
                    seed,
                    message: err.to_string(),
                }
            })
        })
        .collect();

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
    let runs: Vec<RunReport> = runs.into_iter().filter_map(|r| r.ok()).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(|r| r.err()).collect();

    let summary = BatchSummary::from_reports(&runs);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        runs = runs.len(),
        failed = errors.len(),
        successes = summary.successes,
        "Batch complete in {:.2}s",
        duration_seconds
    );

    BatchResults {
        scenario: scenario.name.clone(),
        runs,
        summary,
        errors,
        duration_seconds,
    }
}

/// Run the same seed `runs` times in parallel and check every final state
/// hash matches. Returns the shared hash.
///
/// # Errors
///
/// Returns [`HeadlessError::NonDeterministic`] if the hashes differ, or the
/// first build error.
pub fn verify_determinism(scenario: &Scenario, config: &RunConfig, runs: u32) -> Result<u64> {
    let seed = config.seed.unwrap_or(scenario.config.seed);
    let config = config.with_seed(seed);

    let mut hashes = (0..runs.max(1))
        .into_par_iter()
        .map(|_| run_scenario(scenario, &config).map(|report| report.final_state_hash))
        .collect::<Result<Vec<u64>>>()?;
    hashes.sort_unstable();
    hashes.dedup();

    match hashes.as_slice() {
        [hash] => {
            info!(seed, runs, hash = %format!("{hash:016x}"), "Deterministic");
            Ok(*hash)
        }
        _ => Err(HeadlessError::NonDeterministic {
            seed,
            unique: hashes.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactical_core::math::Fixed;

    fn quick() -> RunConfig {
        RunConfig {
            max_ticks: 30,
            dt: Fixed::from_num(0.5),
            seed: None,
        }
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new(500).with_seed(12345);
        assert_eq!(config.runs, 500);
        assert_eq!(config.seed_start, 12345);
    }

    #[test]
    fn test_run_batch_small() {
        let config = BatchConfig {
            runs: 6,
            seed_start: 10,
            run: quick(),
        };
        let results = run_batch(&Scenario::sample(), &config);

        assert_eq!(results.runs.len(), 6);
        assert!(results.errors.is_empty());
        let seeds: Vec<u64> = results.runs.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, (10..16).collect::<Vec<_>>());
        assert_eq!(results.summary.total, 6);
    }

    #[test]
    fn test_broken_scenario_reports_errors() {
        let mut scenario = Scenario::sample();
        scenario.units[1].x = scenario.units[0].x;
        scenario.units[1].y = scenario.units[0].y;

        let results = run_batch(&scenario, &BatchConfig::new(3));

        assert!(results.runs.is_empty());
        assert_eq!(results.errors.len(), 3);
    }

    #[test]
    fn test_summary_counts() {
        let report = |outcome, ticks| RunReport {
            scenario: "s".to_string(),
            seed: 0,
            ticks,
            elapsed_seconds: 0.0,
            outcome,
            attacks: 0,
            damage: 0,
            deaths: 2,
            pickups: 0,
            teleports: 0,
            ground_gp: 0,
            units: Vec::new(),
            final_state_hash: 0,
            wall_ms: 0,
        };
        let summary = BatchSummary::from_reports(&[
            report(MissionOutcome::Success, 10),
            report(MissionOutcome::Success, 20),
            report(MissionOutcome::Failure, 30),
            report(MissionOutcome::InProgress, 40),
        ]);
        assert_eq!(summary.successes, 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.undecided, 1);
        assert!((summary.mean_ticks - 25.0).abs() < f64::EPSILON);
        assert!((summary.success_rate() - 0.5).abs() < f64::EPSILON);
        assert!((summary.mean_deaths - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_verify_determinism() {
        let hash = verify_determinism(&Scenario::sample(), &quick(), 4).unwrap();
        let single = run_scenario(&Scenario::sample(), &quick()).unwrap();
        assert_eq!(hash, single.final_state_hash);
    }
}
