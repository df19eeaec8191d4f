//! Exponential backoff with jitter.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of the random offset added to backoff and cooldown delays.
pub trait JitterSource: Send + Sync + fmt::Debug {
    /// Return a jitter in `0..=max`.
    fn jitter(&self, max: Duration) -> Duration;
}

/// Jitter drawn from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn jitter(&self, max: Duration) -> Duration {
        let max_ms = max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Reproducible jitter from a seeded RNG.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn jitter(&self, max: Duration) -> Duration {
        let max_ms = max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}

/// Constant jitter, clamped to the requested maximum.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub Duration);

impl JitterSource for FixedJitter {
    fn jitter(&self, max: Duration) -> Duration {
        self.0.min(max)
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` is the 0-based index of the attempt that just failed, so the
/// first wait is `base`, the second `2 * base`, and so on.
pub fn calculate_backoff(
    attempt: u32,
    base: Duration,
    max_jitter: Duration,
    jitter: &dyn JitterSource,
) -> Duration {
    let base_ms = base.as_millis() as u64;
    let exponential = 2u64.saturating_pow(attempt);
    let delay_ms = base_ms.saturating_mul(exponential);

    Duration::from_millis(delay_ms).saturating_add(jitter.jitter(max_jitter))
}

/// Backoff settings bound to a jitter source.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    max_jitter: Duration,
    jitter: Arc<dyn JitterSource>,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max_jitter: Duration) -> Self {
        Self::with_jitter(base, max_jitter, Arc::new(ThreadRngJitter))
    }

    pub fn with_jitter(base: Duration, max_jitter: Duration, jitter: Arc<dyn JitterSource>) -> Self {
        Self { base, max_jitter, jitter }
    }

    /// Delay to wait after the given 0-based attempt failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base, self.max_jitter, self.jitter.as_ref())
    }
}
