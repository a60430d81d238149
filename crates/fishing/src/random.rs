//! Injectable sources of randomness and time.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use log::warn;
use rand::{
    rngs::{OsRng, StdRng},
    Rng, RngCore, SeedableRng,
};

pub trait RandomSource: Send + Sync {
    /// Uniform draw in `[0, 1)`.
    fn unit(&self) -> f64;

    /// Uniform integer in `[0, n)`. Returns `0` when `n` is `0`.
    fn below(&self, n: u64) -> u64;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads a seed from the operating system, falling back to the current time.
pub fn entropy_seed() -> u64 {
    let mut bytes = [0u8; 8];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(err) => {
            warn!("Could not read seed from the operating system, using the clock: {err}");
            Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64
        }
    }
}

/// A [`StdRng`] behind a mutex so it can be shared between concurrent callers.
#[derive(Debug)]
pub struct SeededRandom(Mutex<StdRng>);

impl SeededRandom {
    pub fn new() -> Self {
        Self::from_seed(entropy_seed())
    }

    pub fn from_seed(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        // the generator holds no invariants a panicking draw could break
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SeededRandom {
    fn unit(&self) -> f64 {
        self.rng().gen::<f64>()
    }

    fn below(&self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        self.rng().gen_range(0..n)
    }
}

/// Replays a fixed list of unit draws, wrapping around at the end.
///
/// `below(n)` maps the next draw onto `[0, n)`, so a script of `[0.0]`
/// always yields the lowest value and `[0.999]` close to the highest.
/// Draws of exactly `1.0` are passed through by [`RandomSource::unit`],
/// which makes the upper bound of a range reachable in tests.
#[derive(Debug)]
pub struct ScriptedRandom {
    draws: Vec<f64>,
    cursor: Mutex<usize>,
}

impl ScriptedRandom {
    pub fn new(draws: impl Into<Vec<f64>>) -> Self {
        Self {
            draws: draws.into(),
            cursor: Mutex::new(0),
        }
    }

    fn next(&self) -> f64 {
        if self.draws.is_empty() {
            return 0.0;
        }
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let draw = self.draws[*cursor % self.draws.len()];
        *cursor += 1;
        draw
    }
}

impl RandomSource for ScriptedRandom {
    fn unit(&self) -> f64 {
        self.next()
    }

    fn below(&self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        ((self.next() * n as f64) as u64).min(n - 1)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
