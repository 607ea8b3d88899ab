//! Common error types for Beacon components.

use thiserror::Error;

/// Common errors that can occur across Beacon components.
///
/// The taxonomy matters more than the messages: `Application` failures are
/// deliberate and raised locally, `Remote` means the downstream service
/// reported an application-level failure, and `Transport` means the
/// boundary call itself could not complete. `Remote` and `Transport` are
/// never collapsed into each other so a trace stays truthful about where a
/// request died.
#[derive(Error, Debug)]
pub enum BeaconError {
    /// Deliberate simulated application failure
    #[error("Application error: {0}")]
    Application(String),

    /// Downstream service reported an application-level failure
    #[error("Remote error: {0}")]
    Remote(String),

    /// Boundary call could not complete
    #[error("Transport error: {0}")]
    Transport(String),

    /// Operation interrupted by an external deadline or shutdown
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BeaconError {
    /// Stable label for metrics and log fields, bounded cardinality.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BeaconError::Application(_) => "application",
            BeaconError::Remote(_) => "remote",
            BeaconError::Transport(_) => "transport",
            BeaconError::Cancelled(_) => "cancelled",
            BeaconError::Configuration(_) => "configuration",
        }
    }
}

/// Result type alias using `BeaconError`
pub type Result<T> = std::result::Result<T, BeaconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_message() {
        let err = BeaconError::Remote("worker said no".to_string());
        assert_eq!(err.to_string(), "Remote error: worker said no");
    }

    #[test]
    fn test_error_kind_labels_are_stable() {
        assert_eq!(BeaconError::Application(String::new()).kind(), "application");
        assert_eq!(BeaconError::Remote(String::new()).kind(), "remote");
        assert_eq!(BeaconError::Transport(String::new()).kind(), "transport");
        assert_eq!(BeaconError::Cancelled(String::new()).kind(), "cancelled");
        assert_eq!(
            BeaconError::Configuration(String::new()).kind(),
            "configuration"
        );
    }
}
