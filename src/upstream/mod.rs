//! Upstream event service.
//!
//! The upstream is consumed only as an HTTP endpoint that either succeeds
//! or answers with a status code. Everything here is a single attempt;
//! retries and circuit breaking are layered on by the caller.

pub mod client;
pub mod error;
pub mod types;

pub use client::UpstreamClient;
pub use error::UpstreamError;
pub use types::{EventId, EventPayload, StampedEvent, UserRecord};
