//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, cooldown ordering)
//! - Validate addresses and the upstream URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid upstream URL '{url}': {reason}")]
    UpstreamUrl { url: String, reason: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("circuit_breaker.max_cooldown_ms ({max}) is below cooldown_ms ({base})")]
    CooldownOrder { base: u64, max: u64 },

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("unknown log format '{0}' (expected \"pretty\" or \"json\")")]
    LogFormat(String),
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::UpstreamUrl {
            url: config.upstream.base_url.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::UpstreamUrl {
            url: config.upstream.base_url.clone(),
            reason: e.to_string(),
        }),
    }

    let breaker = &config.circuit_breaker;
    let positive = [
        ("upstream.timeout_ms", config.upstream.timeout_ms),
        ("circuit_breaker.window_ms", breaker.window_ms),
        ("circuit_breaker.failure_threshold", u64::from(breaker.failure_threshold)),
        ("circuit_breaker.cooldown_ms", breaker.cooldown_ms),
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
        ("fanout.concurrency", config.fanout.concurrency as u64),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if breaker.max_cooldown_ms < breaker.cooldown_ms {
        errors.push(ValidationError::CooldownOrder {
            base: breaker.cooldown_ms,
            max: breaker.max_cooldown_ms,
        });
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }
    if !matches!(observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::LogFormat(observability.log_format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
