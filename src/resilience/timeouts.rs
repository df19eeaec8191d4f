//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Cancel the wrapped future cleanly on expiry
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors and classified as retryable by callers

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The deadline elapsed before the wrapped operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Run `fut`, giving up after `deadline`.
pub async fn with_deadline<F: Future>(deadline: Duration, fut: F) -> Result<F::Output, TimedOut> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| TimedOut(deadline))
}
