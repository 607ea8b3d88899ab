//! Process-wide structured logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Filtering comes from `RUST_LOG` when set, defaulting to `info`.
/// Safe to call more than once (later calls are no-ops), which keeps test
/// binaries that share a process happy.
pub fn init(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
    if result.is_ok() {
        tracing::info!(service = service_name, "logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("dispatcher-service");
        init("dispatcher-service");
    }
}
