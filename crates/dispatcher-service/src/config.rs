//! Dispatcher service configuration.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Dispatcher configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the downstream worker service.
    pub worker_url: String,
    /// Timeout applied to each outbound worker call.
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid DISPATCHER_REQUEST_TIMEOUT_MS: {0}")]
    InvalidTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or a
    /// present variable is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or a
    /// present variable is malformed.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let worker_url = vars
            .get("DISPATCHER_WORKER_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DISPATCHER_WORKER_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let request_timeout = match vars.get("DISPATCHER_REQUEST_TIMEOUT_MS") {
            None => Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            Some(raw) => {
                let ms: u64 = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
                if ms == 0 {
                    return Err(ConfigError::InvalidTimeout(raw.clone()));
                }
                Duration::from_millis(ms)
            }
        };

        Ok(Config {
            worker_url,
            request_timeout,
        })
    }
}
