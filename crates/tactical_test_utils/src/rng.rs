//! Scripted random source.
//!
//! Weighted lotteries draw `next_u64() % total`, so feeding known values
//! picks known winners. [`SequenceRng`] replays a fixed list of draws and
//! wraps around when it runs out.

use rand::{Error, RngCore};

/// Replays a fixed cycle of `u64` draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRng {
    values: Vec<u64>,
    cursor: usize,
}

impl SequenceRng {
    /// Cycle through `values`. An empty list always yields zero.
    #[must_use]
    pub fn new(values: Vec<u64>) -> Self {
        Self {
            values,
            cursor: 0,
        }
    }

    /// Always yield `value`.
    #[must_use]
    pub fn constant(value: u64) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws taken so far.
    #[must_use]
    pub const fn draws(&self) -> usize {
        self.cursor
    }
}

impl RngCore for SequenceRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() & u64::from(u32::MAX)) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let value = if self.values.is_empty() {
            0
        } else {
            self.values[self.cursor % self.values.len()]
        };
        self.cursor += 1;
        value
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
