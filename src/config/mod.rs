//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file (RELAY_CONFIG)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (RELAY_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → handed to subsystems at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breaker settings never change at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    CircuitBreakerConfig, FanOutConfig, ListenerConfig, ObservabilityConfig, RelayConfig,
    RetryConfig, TimeoutConfig, UpstreamConfig,
};
