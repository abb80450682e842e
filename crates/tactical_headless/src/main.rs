//! Headless tactical scenario runner.
//!
//! Runs scenarios without any front end. Designed for CI, batch statistics
//! and determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in sample and print a JSON report
//! cargo run -p tactical_headless -- run
//!
//! # Run a scenario file for at most 2000 ticks of 50 ms
//! cargo run -p tactical_headless -- run --scenario ambush.ron --ticks 2000 --dt 0.05
//!
//! # Run 200 seeds in parallel and save the results
//! cargo run -p tactical_headless -- batch --runs 200 --output results/batch.json
//!
//! # Write the sample scenario out as a starting point
//! cargo run -p tactical_headless -- sample --output my_scenario.ron
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to override the level.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tactical_core::scenario::Scenario;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tactical_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    error::{HeadlessError, Result},
    runner::{load_scenario, run_scenario, write_output, RunConfig},
    validate_scenario,
};

#[derive(Parser)]
#[command(name = "tactical_headless")]
#[command(about = "Headless tactical scenario runner for CI and batch runs")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scenario and report the result as JSON
    Run {
        /// Scenario file to load (defaults to the built-in sample)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Maximum ticks to run
        #[arg(short, long, default_value = "600")]
        ticks: u64,

        /// Seconds per tick
        #[arg(long, default_value = "0.1")]
        dt: f64,

        /// Override the scenario's seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that a scenario file parses and builds
    Validate {
        /// Scenario file
        scenario: PathBuf,
    },

    /// Run one scenario across many seeds in parallel
    Batch {
        /// Scenario file to load (defaults to the built-in sample)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of runs
        #[arg(short, long, default_value = "100")]
        runs: u32,

        /// Seed of the first run
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum ticks per run
        #[arg(short, long, default_value = "600")]
        ticks: u64,

        /// Seconds per tick
        #[arg(long, default_value = "0.1")]
        dt: f64,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Write full results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Scenario file to load (defaults to the built-in sample)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify (defaults to the scenario's seed)
        #[arg(long)]
        seed: Option<u64>,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run
        #[arg(short, long, default_value = "600")]
        ticks: u64,
    },

    /// Write the built-in sample scenario as RON
    Sample {
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for reports
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            ticks,
            dt,
            seed,
            output,
        }) => cmd_run(scenario.as_deref(), ticks, dt, seed, output.as_deref()),
        Some(Commands::Validate { scenario }) => cmd_validate(&scenario),
        Some(Commands::Batch {
            scenario,
            runs,
            seed,
            ticks,
            dt,
            parallel,
            output,
        }) => cmd_batch(
            scenario.as_deref(),
            runs,
            seed,
            ticks,
            dt,
            parallel,
            output.as_deref(),
        ),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
            ticks,
        }) => cmd_verify(scenario.as_deref(), seed, runs, ticks),
        Some(Commands::Sample { output }) => cmd_sample(output.as_deref()),
        None => cmd_run(None, 600, 0.1, None, None),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            eprintln!("FATAL: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Run a single scenario
fn cmd_run(
    scenario: Option<&Path>,
    ticks: u64,
    dt: f64,
    seed: Option<u64>,
    output: Option<&Path>,
) -> Result<()> {
    let config = RunConfig::from_args(ticks, dt, seed)?;
    let scenario = load_scenario(scenario)?;
    let report = run_scenario(&scenario, &config)?;

    eprintln!(
        "{}: {:?} after {} ticks ({} deaths, {} pickups)",
        report.scenario, report.outcome, report.ticks, report.deaths, report.pickups
    );
    write_output(output, &report.to_json()?)
}

/// Check a scenario file
fn cmd_validate(scenario: &Path) -> Result<()> {
    let units = validate_scenario(scenario)?;
    eprintln!("OK: {} ({} units)", scenario.display(), units);
    Ok(())
}

/// Run a batch of seeds
fn cmd_batch(
    scenario: Option<&Path>,
    runs: u32,
    seed: u64,
    ticks: u64,
    dt: f64,
    parallel: usize,
    output: Option<&Path>,
) -> Result<()> {
    let run = RunConfig::from_args(ticks, dt, None)?;
    let scenario = load_scenario(scenario)?;

    if parallel > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(parallel)
            .build_global()
            .ok(); // Ignore if already set
    }

    let config = BatchConfig {
        runs,
        seed_start: seed,
        run,
    };
    let results = run_batch(&scenario, &config);

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE: {}", results.scenario);
    eprintln!("{}", "=".repeat(50));
    eprintln!("Runs:       {}", results.summary.total);
    eprintln!(
        "Successes:  {} ({:.1}%)",
        results.summary.successes,
        results.summary.success_rate() * 100.0
    );
    eprintln!("Failures:   {}", results.summary.failures);
    eprintln!("Undecided:  {}", results.summary.undecided);
    eprintln!("Mean ticks: {:.1}", results.summary.mean_ticks);
    if !results.errors.is_empty() {
        eprintln!("Errors:     {}", results.errors.len());
    }

    let json = serde_json::to_string_pretty(&results)?;
    write_output(output, &json)?;

    match results.errors.first() {
        Some(first) => Err(HeadlessError::BatchFailed {
            failed: results.errors.len(),
            seed: first.seed,
            message: first.message.clone(),
        }),
        None => Ok(()),
    }
}

/// Verify determinism
fn cmd_verify(scenario: Option<&Path>, seed: Option<u64>, runs: u32, ticks: u64) -> Result<()> {
    let scenario = load_scenario(scenario)?;
    let config = RunConfig {
        max_ticks: ticks,
        seed,
        ..RunConfig::default()
    };
    tracing::info!(
        "Verifying determinism: {} ({} runs of {} ticks)",
        scenario.name,
        runs,
        ticks
    );

    let hash = verify_determinism(&scenario, &config, runs)?;
    eprintln!("PASS: All {runs} runs produced identical results");
    eprintln!("  Final hash: {hash:016x}");
    Ok(())
}

/// Print the sample scenario
fn cmd_sample(output: Option<&Path>) -> Result<()> {
    let ron = Scenario::sample().to_ron_string()?;
    write_output(output, &ron)
}
