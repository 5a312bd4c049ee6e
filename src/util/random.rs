use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Source of uniformly distributed integers, injected into the services so
/// randomised grants can be replayed deterministically.
pub trait RandomSource: Send + Sync {
    /// Uniform draw from `min..=max`. Callers guarantee `min < max`.
    fn int_inclusive(&self, min: i64, max: i64) -> i64;
}

/// Draw from `[min, max]` (both inclusive). When `max <= min` the result is
/// `min` and the source is not consulted.
pub fn random_between(rng: &dyn RandomSource, min: i64, max: i64) -> i64 {
    if max <= min {
        return min;
    }
    rng.int_inclusive(min, max)
}

/// Thread-local OS-seeded generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn int_inclusive(&self, min: i64, max: i64) -> i64 {
        rand::rng().random_range(min..=max)
    }
}

/// Reproducible generator for tests and replays.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn int_inclusive(&self, min: i64, max: i64) -> i64 {
        self.rng.lock().random_range(min..=max)
    }
}

/// Amount requested by a grant: either fixed or drawn from a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantAmount {
    Exact(i64),
    Range { min: i64, max: i64 },
}

impl GrantAmount {
    pub fn resolve(self, rng: &dyn RandomSource) -> i64 {
        match self {
            GrantAmount::Exact(n) => n,
            GrantAmount::Range { min, max } => random_between(rng, min, max),
        }
    }
}

impl From<i64> for GrantAmount {
    fn from(n: i64) -> Self {
        GrantAmount::Exact(n)
    }
}
