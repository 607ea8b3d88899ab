//! Worker service configuration.

use std::collections::HashMap;
use std::env;

use thiserror::Error;

use common::sim::DEFAULT_FAILURE_PROBABILITY;

/// Worker configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Probability that the flaky job path fails, in [0, 1].
    pub failure_probability: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid WORKER_FAILURE_PROBABILITY: {0}")]
    InvalidFailureProbability(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is present but malformed.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let failure_probability = match vars.get("WORKER_FAILURE_PROBABILITY") {
            None => DEFAULT_FAILURE_PROBABILITY,
            Some(raw) => {
                let parsed: f64 = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidFailureProbability(raw.clone()))?;
                if !(0.0..=1.0).contains(&parsed) {
                    return Err(ConfigError::InvalidFailureProbability(raw.clone()));
                }
                parsed
            }
        };

        Ok(Config {
            failure_probability,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            failure_probability: DEFAULT_FAILURE_PROBABILITY,
        }
    }
}
