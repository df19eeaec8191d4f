//! Write and read path failures.

use thiserror::Error;

use crate::upstream::{EventId, UpstreamError};

/// Why an event could not be written.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The breaker denied admission; no upstream call was made.
    #[error("circuit open, retry after {retry_after_secs}s")]
    CircuitOpen { retry_after_secs: u64 },

    /// Every attempt failed with a retryable error while the breaker was closed.
    #[error("retries exhausted after {attempts} attempts")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: UpstreamError,
    },

    /// The single half-open trial call failed.
    #[error("probe failed")]
    ProbeFailed(#[source] UpstreamError),

    /// The upstream failed with a non-retryable error.
    #[error("upstream rejected the event")]
    Rejected(#[source] UpstreamError),
}

impl WriteError {
    /// Classified reason reported to clients in place of upstream error text.
    pub fn reason(&self) -> &'static str {
        match self {
            WriteError::CircuitOpen { .. } => "circuit_open",
            WriteError::RetryExhausted { .. } => "retry_exhausted",
            WriteError::ProbeFailed(_) => "probe_failed",
            WriteError::Rejected(_) => "upstream_rejected",
        }
    }
}

/// Why a user's events could not be loaded.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to load user: {0}")]
    ParentLoadFailed(#[source] UpstreamError),

    #[error("failed to load event {event_id} (position {index}): {source}")]
    DependencyFetchFailed {
        index: usize,
        event_id: EventId,
        source: UpstreamError,
    },
}
