//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the event relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream service location and per-call deadline.
    pub upstream: UpstreamConfig,

    /// Circuit breaker guarding the write path.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Read path fan-out settings.
    pub fanout: FanOutConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Upstream service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream service.
    pub base_url: String,

    /// Deadline for a single upstream call in milliseconds.
    pub timeout_ms: u64,

    /// Path events are written to.
    pub add_event_path: String,

    /// Path prefix for user lookups; the user id is appended.
    pub user_path: String,

    /// Path prefix for event lookups; the event id is appended.
    pub event_path: String,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_ms: 5_000,
            add_event_path: "/addEvent".to_string(),
            user_path: "/getUserById".to_string(),
            event_path: "/getEventById".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Trailing window failures are counted over, in milliseconds.
    pub window_ms: u64,

    /// Failures within the window that trip the breaker.
    pub failure_threshold: u32,

    /// Cooldown after the breaker first opens, in milliseconds.
    pub cooldown_ms: u64,

    /// Upper bound for the escalating cooldown, in milliseconds.
    pub max_cooldown_ms: u64,

    /// Upper bound of the random offset added when a failed probe re-opens
    /// the breaker, in milliseconds.
    pub cooldown_jitter_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn max_cooldown(&self) -> Duration {
        Duration::from_millis(self.max_cooldown_ms)
    }

    pub fn cooldown_jitter(&self) -> Duration {
        Duration::from_millis(self.cooldown_jitter_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_ms: 30_000,
            failure_threshold: 3,
            cooldown_ms: 15_000,
            max_cooldown_ms: 120_000,
            cooldown_jitter_ms: 1_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per write, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to each delay in milliseconds.
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_jitter_ms: 50,
        }
    }
}

/// Fan-out configuration for the read path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FanOutConfig {
    /// Maximum concurrent child fetches per read request.
    pub concurrency: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self { concurrency: 5 }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
