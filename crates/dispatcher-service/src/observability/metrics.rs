//! Metrics definitions for the dispatcher service.
//!
//! Naming conventions:
//! - `api_` prefix for the request-facing series
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration series
//!
//! Tag cardinality is bounded: the only tag is the constant service name.
//! Every endpoint kind feeds the same three series, so the active-request
//! gauge reads the whole service's concurrency at a glance.

use common::telemetry::metrics::{Counter, Gauge, MetricsRegistry, Timer};

const SERVICE_TAG: (&str, &str) = ("service", "dispatcher-service");

/// Handle bundle for the dispatcher's metric series, registered once at
/// startup and cloned into every handler invocation.
#[derive(Debug, Clone)]
pub struct DispatcherMetrics {
    /// `api_requests_total`: every request, success or failure.
    pub requests_total: Counter,
    /// `api_request_duration_seconds`: request latency.
    pub request_duration: Timer,
    /// `api_active_requests`: requests currently in flight.
    pub active_requests: Gauge,
}

impl DispatcherMetrics {
    /// Register the dispatcher series on `registry`.
    #[must_use]
    pub fn register(registry: &MetricsRegistry) -> Self {
        Self {
            requests_total: registry.counter("api_requests_total", &[SERVICE_TAG]),
            request_duration: registry.timer("api_request_duration_seconds", &[SERVICE_TAG]),
            active_requests: registry.gauge("api_active_requests", &[SERVICE_TAG]),
        }
    }
}
