//! Randomness used when a create request falls back to a drawn word.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of word-bank draws. Injected so a fulfillment can be replayed.
pub trait DeterministicRng: Send + Sync {
    /// Draws an index for a bank of `len` words. Callers reduce the result
    /// modulo `len`, so implementations may return any value.
    fn next_index(&mut self, len: usize) -> usize;
}

/// Production RNG backed by `StdRng`.
#[derive(Debug)]
pub struct StdDeterministicRng(StdRng);

impl StdDeterministicRng {
    /// Seeds from the operating system's entropy source.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self(StdRng::from_os_rng())
    }

    /// Seeds from a fixed value so a run can be replayed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl DeterministicRng for StdDeterministicRng {
    fn next_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.0.random_range(0..len)
    }
}
