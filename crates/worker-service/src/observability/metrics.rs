//! Metrics definitions for the worker service.
//!
//! Naming conventions:
//! - `worker_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration series
//!
//! Tag cardinality is bounded: the only tag is the constant service name.

use common::telemetry::metrics::{Counter, Gauge, MetricsRegistry, Timer};

const SERVICE_TAG: (&str, &str) = ("service", "worker-service");

/// Handle bundle for the worker's metric series, registered once at
/// startup and cloned wherever jobs execute.
#[derive(Debug, Clone)]
pub struct WorkerMetrics {
    /// `worker_jobs_processed_total`: jobs that completed successfully.
    pub jobs_processed: Counter,
    /// `worker_job_duration_seconds`: job execution latency.
    pub job_duration: Timer,
    /// `worker_active_jobs`: jobs currently executing.
    pub active_jobs: Gauge,
}

impl WorkerMetrics {
    /// Register the worker series on `registry`.
    #[must_use]
    pub fn register(registry: &MetricsRegistry) -> Self {
        Self {
            jobs_processed: registry.counter("worker_jobs_processed_total", &[SERVICE_TAG]),
            job_duration: registry.timer("worker_job_duration_seconds", &[SERVICE_TAG]),
            active_jobs: registry.gauge("worker_active_jobs", &[SERVICE_TAG]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice_shares_series() {
        let registry = MetricsRegistry::new();
        let a = WorkerMetrics::register(&registry);
        let b = WorkerMetrics::register(&registry);
        a.jobs_processed.increment();
        assert_eq!(b.jobs_processed.get(), 1);
    }
}
