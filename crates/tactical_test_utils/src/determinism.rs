//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A seeded run must replay exactly. Sources of non-determinism to guard
//! against:
//!
//! - **Floating-point math**: Positions, timers and costs use
//!   [`tactical_core::math::Fixed`]. Floats only appear when a scenario file
//!   is parsed.
//!
//! - **Hash map iteration order**: Memory and allegiance tables are
//!   `BTreeMap`s, and units update in registration order.
//!
//! - **Randomness**: Every draw goes through the simulation's own seeded
//!   random source.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual behaviours with scripted draws
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations on separate threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use tactical_core::math::Fixed;
use tactical_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Distinct hashes seen (one for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic,
            "Simulation is non-deterministic!\n\
             Runs: {}\n\
             Ticks: {}\n\
             Unique hashes: {} (expected 1)\n\
             All hashes: {:?}",
            self.hashes.len(),
            self.ticks,
            self.unique_hashes().len(),
            self.hashes
        );
    }
}

/// Run any stepped state several times and compare the final hashes.
///
/// `setup` builds a fresh state, `step` advances it one tick and `hash`
/// summarises it.
///
/// # Example
///
/// ```ignore
/// use tactical_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,
///     100,
///     || Scenario::sample().build().unwrap(),
///     |sim| { sim.tick(Fixed::ONE); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let mut state = setup();
            for _ in 0..ticks {
                step(&mut state);
            }
            hash(&state)
        })
        .collect();

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Run a [`Simulation`] twice from the same setup and compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, ticks: u64, dt: Fixed) -> DeterminismResult
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        ticks,
        setup_fn,
        |sim| {
            sim.tick(dt);
        },
        Simulation::state_hash,
    )
}

/// Run `num_sims` simulations on scoped threads and collect final hashes.
///
/// Each simulation is built on its own thread, so nothing in it needs to be
/// `Send`.
#[must_use]
pub fn run_parallel_simulations<F>(
    setup_fn: F,
    num_sims: usize,
    ticks: u64,
    dt: Fixed,
) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..ticks {
                        sim.tick(dt);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Step two simulations side by side and report the first tick at which
/// their hashes differ (0 means the initial states already differ).
pub fn find_first_divergence<F>(setup_fn: F, ticks: u64, dt: Fixed) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        first.tick(dt);
        second.tick(dt);
        if first.state_hash() != second.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation inputs.
pub mod strategies {
    use proptest::prelude::*;
    use tactical_core::math::Fixed;
    use tactical_core::tile::TileCoord;
    use tactical_core::unit::Stats;

    /// Lottery weights: 1 to 8 options, each 0 to 200, at least one positive.
    pub fn arb_weights() -> impl Strategy<Value = Vec<u32>> {
        prop::collection::vec(0u32..200, 1..8).prop_filter("needs a positive weight", |w| {
            w.iter().any(|&x| x > 0)
        })
    }

    /// A tile cost between 0.25 and 4, in quarter steps.
    pub fn arb_tile_cost() -> impl Strategy<Value = Fixed> {
        (1i32..=16).prop_map(|quarters| Fixed::from_num(quarters) / Fixed::from_num(4))
    }

    /// A coordinate on a `width` x `height` map.
    pub fn arb_coord(width: i32, height: i32) -> impl Strategy<Value = TileCoord> {
        (0..width, 0..height).prop_map(|(x, y)| TileCoord::new(x, y))
    }

    /// Stats on the usual 1..=100 scale.
    pub fn arb_stats() -> impl Strategy<Value = Stats> {
        (
            (1u32..=100, 1u32..=100, 1u32..=100, 1u32..=100),
            (1u32..=10, 1u32..=10, 1u32..=100, 0u32..=100),
        )
            .prop_map(
                |(
                    (strength, precision, constitution, dexterity),
                    (perception, intelligence, bravery, greed),
                )| Stats {
                    strength,
                    precision,
                    constitution,
                    dexterity,
                    perception,
                    intelligence,
                    bravery,
                    greed,
                },
            )
    }
}
