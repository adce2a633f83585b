//! Injectable randomness.
//!
//! The simulation draws every random decision through [`RandomSource`]:
//! bunker blocks, the AI's attacker pick and its occasional sub-optimal
//! target. A seeded source makes whole games reproducible; tests swap in
//! a scripted source to force a particular branch.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the simulation's random decisions.
pub trait RandomSource {
    /// Returns true with probability `p`. Values outside `[0, 1]` clamp.
    fn chance(&mut self, p: f64) -> bool;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn pick(&mut self, len: usize) -> usize;
}

/// Default source backed by a seeded [`StdRng`].
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Create a source from a 64-bit seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn chance(&mut self, p: f64) -> bool {
        if p.is_nan() {
            return false;
        }
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }

    fn pick(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.rng.random_range(0..len)
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn chance(&mut self, p: f64) -> bool {
        (**self).chance(p)
    }

    fn pick(&mut self, len: usize) -> usize {
        (**self).pick(len)
    }
}
