//! Event relay orchestration.
//!
//! # Data Flow
//! ```text
//! POST /addEvent
//!     → breaker admission (fail fast when open)
//!     → stamp id
//!     → retry executor (closed) | single probe attempt (half-open)
//!     → breaker.record(outcome)
//!
//! GET /getEventsByUserId/{id}
//!     → load user
//!     → fan out over the user's event ids (bounded, ordered)
//! ```

pub mod error;
pub mod relay;

pub use error::{ReadError, WriteError};
pub use relay::EventRelay;
