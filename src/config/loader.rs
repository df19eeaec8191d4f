//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_VAR: &str = "RELAY_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {var}")]
    Env { var: String, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let config = read_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load configuration the way the binary does: optional file named by
/// `RELAY_CONFIG`, then `RELAY_*` overrides, then validation.
pub fn load_from_env() -> Result<RelayConfig, ConfigError> {
    let config = match std::env::var_os(CONFIG_PATH_VAR) {
        Some(path) => read_file(Path::new(&path))?,
        None => RelayConfig::default(),
    };
    let config = apply_env_overrides(config, std::env::vars())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply `RELAY_*` overrides from the given variables on top of `config`.
///
/// Unknown variables are ignored; known variables with unparseable values
/// are an error.
pub fn apply_env_overrides<I>(mut config: RelayConfig, vars: I) -> Result<RelayConfig, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (var, value) in vars {
        match var.as_str() {
            "RELAY_BIND_ADDRESS" => config.listener.bind_address = value,
            "RELAY_UPSTREAM_URL" => config.upstream.base_url = value,
            "RELAY_UPSTREAM_TIMEOUT_MS" => config.upstream.timeout_ms = parse(&var, &value)?,
            "RELAY_CIRCUIT_COOLDOWN_MS" => config.circuit_breaker.cooldown_ms = parse(&var, &value)?,
            "RELAY_CIRCUIT_MAX_COOLDOWN_MS" => {
                config.circuit_breaker.max_cooldown_ms = parse(&var, &value)?
            }
            "RELAY_FAILURE_WINDOW_MS" => config.circuit_breaker.window_ms = parse(&var, &value)?,
            "RELAY_FAILURE_THRESHOLD" => {
                config.circuit_breaker.failure_threshold = parse(&var, &value)?
            }
            "RELAY_RETRY_MAX_ATTEMPTS" => config.retries.max_attempts = parse(&var, &value)?,
            "RELAY_RETRY_BASE_DELAY_MS" => config.retries.base_delay_ms = parse(&var, &value)?,
            "RELAY_FANOUT_CONCURRENCY" => config.fanout.concurrency = parse(&var, &value)?,
            "RELAY_LOG_LEVEL" => config.observability.log_level = value,
            _ => {}
        }
    }
    Ok(config)
}

fn parse<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}
