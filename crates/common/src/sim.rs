//! Injectable delay and fault sampling.
//!
//! All randomness in the system flows through the [`Sampler`] trait so
//! tests can substitute deterministic generators: [`ThreadRngSampler`] for
//! production, [`fixed::FixedSampler`] for exact-value tests, and
//! [`SeededSampler`] for reproducible statistical runs.
//!
//! Simulated delays run through [`pause`], which races the enclosing
//! request's cancellation token so an external deadline interrupts an
//! in-flight delay instead of waiting it out.

use std::ops::Range;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::error::{BeaconError, Result};

/// Dispatcher fast path: uniform [30, 80) ms.
pub const FAST_DELAY_MS: Range<u64> = 30..80;
/// Dispatcher slow path: uniform [2000, 5000) ms, consumed as two
/// sequential halves by the two sub-stages.
pub const SLOW_DELAY_MS: Range<u64> = 2000..5000;
/// Worker standard job: uniform [100, 500) ms.
pub const JOB_DELAY_MS: Range<u64> = 100..500;
/// Worker slow job: uniform [3000, 8000) ms.
pub const SLOW_JOB_DELAY_MS: Range<u64> = 3000..8000;
/// Worker flaky job happy path: uniform [100, 300) ms.
pub const FLAKY_JOB_DELAY_MS: Range<u64> = 100..300;
/// Default probability that the worker's flaky job fails.
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.30;

/// Source of simulated delays, failure draws, and uniform choices.
pub trait Sampler: Send + Sync {
    /// Uniform delay draw over `range`, in milliseconds.
    fn delay_ms(&self, range: Range<u64>) -> Duration;

    /// Bernoulli draw with the given success probability.
    fn chance(&self, probability: f64) -> bool;

    /// Uniform choice over `0..n`. `n` must be non-zero.
    fn choice(&self, n: usize) -> usize;
}

/// Production sampler backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSampler;

impl Sampler for ThreadRngSampler {
    fn delay_ms(&self, range: Range<u64>) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(range))
    }

    fn chance(&self, probability: f64) -> bool {
        rand::thread_rng().gen_bool(probability.clamp(0.0, 1.0))
    }

    fn choice(&self, n: usize) -> usize {
        rand::thread_rng().gen_range(0..n.max(1))
    }
}

/// Reproducible sampler over a seeded RNG, for statistical tests.
///
/// The mutex is held only for the single draw, never across an await.
#[derive(Debug)]
pub struct SeededSampler {
    rng: std::sync::Mutex<StdRng>,
}

impl SeededSampler {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: std::sync::Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut guard = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }
}

impl Sampler for SeededSampler {
    fn delay_ms(&self, range: Range<u64>) -> Duration {
        Duration::from_millis(self.with_rng(|rng| rng.gen_range(range)))
    }

    fn chance(&self, probability: f64) -> bool {
        self.with_rng(|rng| rng.gen_bool(probability.clamp(0.0, 1.0)))
    }

    fn choice(&self, n: usize) -> usize {
        self.with_rng(|rng| rng.gen_range(0..n.max(1)))
    }
}

/// Deterministic sampler for tests (exposed like the service mocks are,
/// so integration suites can import it without feature juggling).
pub mod fixed {
    use super::{Duration, Range, Sampler};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fully deterministic [`Sampler`].
    ///
    /// Delays land at a fixed fraction of the requested range, failure
    /// draws are scripted, and choices cycle round-robin so load tests
    /// visit every endpoint kind.
    #[derive(Debug, Default)]
    pub struct FixedSampler {
        /// Position in [0, 1) within each requested delay range.
        fraction: f64,
        /// Whether probabilistic draws report failure.
        fail: bool,
        next_choice: AtomicUsize,
    }

    impl FixedSampler {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Sample delays at `fraction` of the way through each range.
        #[must_use]
        pub fn with_fraction(mut self, fraction: f64) -> Self {
            self.fraction = fraction.clamp(0.0, 0.999_999);
            self
        }

        /// Script every probabilistic draw to fail (or succeed).
        #[must_use]
        pub fn with_failures(mut self, fail: bool) -> Self {
            self.fail = fail;
            self
        }
    }

    impl Sampler for FixedSampler {
        fn delay_ms(&self, range: Range<u64>) -> Duration {
            let width = range.end.saturating_sub(range.start);
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let offset = (width as f64 * self.fraction) as u64;
            Duration::from_millis(range.start + offset.min(width.saturating_sub(1)))
        }

        fn chance(&self, probability: f64) -> bool {
            if probability <= 0.0 {
                return false;
            }
            if probability >= 1.0 {
                return true;
            }
            self.fail
        }

        fn choice(&self, n: usize) -> usize {
            self.next_choice.fetch_add(1, Ordering::Relaxed) % n.max(1)
        }
    }
}

/// Sleep for `duration`, aborting early if `cancel` fires.
///
/// # Errors
///
/// Returns [`BeaconError::Cancelled`] when the token fires before the
/// delay elapses.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        () = tokio::time::sleep(duration) => Ok(()),
        () = cancel.cancelled() => Err(BeaconError::Cancelled("delay interrupted".to_string())),
    }
}
