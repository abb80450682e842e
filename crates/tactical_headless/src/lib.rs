//! Headless scenario runner for batch runs and CI verification.
//!
//! This crate drives [`tactical_core`] simulations without any front end:
//!
//! - **Single runs**: Play a scenario to its outcome and report as JSON
//! - **Batch runs**: Play one scenario across many seeds in parallel
//! - **Determinism checks**: Replay a seed and compare final state hashes
//!
//! Reports go to stdout or a file as JSON. Logs go to stderr.
//!
//! # Example
//!
//! ```bash
//! # Run the built-in sample
//! cargo run -p tactical_headless -- run
//!
//! # Run a scenario file with a different seed
//! cargo run -p tactical_headless -- run --scenario crates/tactical_headless/scenarios/ambush.ron --seed 7
//!
//! # Check a scenario parses and builds
//! cargo run -p tactical_headless -- validate crates/tactical_headless/scenarios/ambush.ron
//!
//! # Verify determinism
//! cargo run -p tactical_headless -- verify --runs 8
//! ```

pub mod batch;
pub mod error;
pub mod runner;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, BatchSummary};
pub use error::{HeadlessError, Result};
pub use runner::{load_scenario, run_scenario, RunConfig, RunReport, UnitReport};

use std::path::Path;

use tactical_core::scenario::Scenario;
use tracing::info;

/// Parse and build a scenario without running it. Returns the number of
/// units placed.
///
/// # Errors
///
/// Returns [`HeadlessError::Scenario`] if the scenario does not load, does not
/// build, or fails the map's consistency checks.
pub fn validate_scenario(path: &Path) -> Result<usize> {
    let scenario = Scenario::load(path)?;
    let sim = scenario.build()?;
    sim.map().validate()?;
    let units = sim.map().unit_count();
    info!(
        scenario = %scenario.name,
        units,
        treasure = sim.map().treasure_count(),
        "Scenario is valid"
    );
    Ok(units)
}
