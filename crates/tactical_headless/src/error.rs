//! Error types for the headless runner.

use std::path::PathBuf;

use tactical_core::error::TacticalError;
use thiserror::Error;

/// Everything that can stop a headless run.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// The scenario failed to load or build.
    #[error(transparent)]
    Scenario(#[from] TacticalError),

    /// A report could not be written.
    #[error("Cannot write {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A report could not be serialized.
    #[error("Cannot encode report: {0}")]
    Json(#[from] serde_json::Error),

    /// A command-line value was out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Some runs of a batch failed to build.
    #[error("{failed} runs failed, first at seed {seed}: {message}")]
    BatchFailed {
        /// Number of failed runs.
        failed: usize,
        /// Seed of the first failure.
        seed: u64,
        /// Its error message.
        message: String,
    },

    /// Repeated runs of the same seed disagreed.
    #[error("Seed {seed} is not deterministic: {unique} distinct final hashes")]
    NonDeterministic {
        /// Seed that diverged.
        seed: u64,
        /// Number of distinct hashes seen.
        unique: usize,
    },
}

/// Result type for headless operations.
pub type Result<T> = std::result::Result<T, HeadlessError>;
