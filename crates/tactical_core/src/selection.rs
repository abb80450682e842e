//! Weighted lottery used by every AI decision.

use rand::RngCore;

use crate::error::{Result, TacticalError};

/// Pick an index with probability proportional to its weight.
///
/// Draws uniformly from `1..=sum` and walks the list subtracting each weight
/// until the remainder drops to zero or below. Zero weights are never chosen.
///
/// # Errors
///
/// Returns [`TacticalError::EmptySelection`] when `weights` is empty or sums
/// to zero.
pub fn select_weighted<R: RngCore + ?Sized>(weights: &[u32], rng: &mut R) -> Result<usize> {
    let total: u64 = weights.iter().map(|&w| u64::from(w)).sum();
    if total == 0 {
        return Err(TacticalError::EmptySelection);
    }

    let mut remaining = i128::from(rng.next_u64() % total) + 1;
    for (index, &weight) in weights.iter().enumerate() {
        remaining -= i128::from(weight);
        if remaining <= 0 {
            return Ok(index);
        }
    }

    // Unreachable: the draw never exceeds the sum.
    Err(TacticalError::EmptySelection)
}

/// Pick an index in `0..len` uniformly. Returns `None` when `len` is zero.
pub fn pick_index<R: RngCore + ?Sized>(len: usize, rng: &mut R) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some((rng.next_u64() % len as u64) as usize)
}
