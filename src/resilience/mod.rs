//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Write to upstream:
//!     → circuit_breaker.rs (admission: closed / probe / fail fast)
//!     → retries.rs (bounded attempts, backoff.rs between retryable failures)
//!     → timeouts.rs (deadline on every attempt)
//!     → circuit_breaker.rs (record final outcome, maybe transition)
//!
//! Read fan-out:
//!     → fanout.rs (K workers over a shared cursor, index-stable results)
//!     → timeouts.rs (deadline on every fetch)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - A half-open probe is a single attempt, never retried
//! - Jitter sources are injectable so delays are assertable in tests

pub mod backoff;
pub mod circuit_breaker;
pub mod fanout;
pub mod retries;
pub mod timeouts;

pub use backoff::{BackoffPolicy, FixedJitter, JitterSource, SeededJitter, ThreadRngJitter};
pub use circuit_breaker::{Admission, BreakerSnapshot, CircuitBreaker, CircuitState, Permit};
pub use fanout::{fan_out, FanOutError};
pub use retries::{RetryError, RetryPolicy, Retryable};
pub use timeouts::{with_deadline, TimedOut};
