//! Upstream failure classification.

use reqwest::StatusCode;
use thiserror::Error;

use crate::resilience::{Retryable, TimedOut};

/// A failed upstream call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-success status.
    #[error("upstream returned {0}")]
    Status(StatusCode),

    /// The per-call deadline elapsed.
    #[error("upstream call {0}")]
    Timeout(#[from] TimedOut),

    /// Connection could not be established or was lost.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response body could not be decoded.
    #[error("invalid upstream response: {0}")]
    Decode(String),

    /// The upstream URL could not be built.
    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    /// Label used for the `outcome` metric dimension.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            UpstreamError::Status(s) if s.is_server_error() => "server_error",
            UpstreamError::Status(_) => "client_error",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Decode(_) => "decode",
            UpstreamError::InvalidUrl(_) => "invalid_url",
        }
    }
}

impl Retryable for UpstreamError {
    /// 5xx, timeouts and transport failures are transient; the rest are not.
    fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Status(status) => status.is_server_error(),
            UpstreamError::Timeout(_) | UpstreamError::Transport(_) => true,
            UpstreamError::Decode(_) | UpstreamError::InvalidUrl(_) => false,
        }
    }
}
