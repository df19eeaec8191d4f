//! Retry logic.
//!
//! # Responsibilities
//! - Classify failures as retryable or terminal
//! - Execute attempts strictly in sequence with exponential backoff + jitter
//! - Surface exhaustion distinctly from terminal failures
//!
//! # Design Decisions
//! - The wait between attempts is a tokio sleep, so only the retrying call is suspended
//! - Terminal failures return immediately without consuming remaining attempts
//! - Timeouts, connection errors and 5xx are retryable; everything else is not

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::RetryConfig;
use crate::resilience::backoff::BackoffPolicy;

/// Failure classification consulted by [`RetryPolicy::run`].
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Why a retried operation ultimately failed.
#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Display> {
    /// Every attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// An attempt failed with a non-retryable error.
    #[error("{0}")]
    Aborted(E),
}

impl<E: fmt::Display> RetryError<E> {
    /// The error produced by the final attempt.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Aborted(e) => e,
        }
    }
}

/// Bounded-attempt retry executor.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            BackoffPolicy::new(
                Duration::from_millis(config.base_delay_ms),
                Duration::from_millis(config.max_jitter_ms),
            ),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// `op` receives the 0-based attempt index.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_while(op, || true).await
    }

    /// Like [`run`](Self::run), but `keep_going` is consulted after every
    /// backoff wait. When it returns false the last failure is reported as
    /// exhaustion without another attempt.
    pub async fn run_while<T, E, F, Fut, G>(&self, mut op: F, mut keep_going: G) -> Result<T, RetryError<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnMut() -> bool,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => {
                    tracing::debug!(attempt, error = %e, "Non-retryable failure");
                    return Err(RetryError::Aborted(e));
                }
                Err(e) if attempt + 1 >= self.max_attempts => {
                    tracing::warn!(attempts = attempt + 1, error = %e, "Retries exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt + 1,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = self.backoff.delay(attempt);
                    tracing::info!(attempt, delay = ?delay, error = %e, "Retrying after failure");
                    tokio::time::sleep(delay).await;
                    if !keep_going() {
                        tracing::warn!(attempts = attempt + 1, error = %e, "Retry abandoned");
                        return Err(RetryError::Exhausted {
                            attempts: attempt + 1,
                            last: e,
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }
}
