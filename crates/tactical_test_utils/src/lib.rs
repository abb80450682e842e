//! # Tactical Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Fixture builders for units, maps and scenarios
//! - A scripted random source for exact lottery outcomes
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod rng;

pub use rng::SequenceRng;

/// Re-export proptest for convenience.
pub use proptest;
