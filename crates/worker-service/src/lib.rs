//! Downstream execution service core.
//!
//! The worker receives delegated jobs from the dispatcher across a process
//! boundary. Its handlers adopt the trace identity carried on the inbound
//! call, execute a simulated job under its own spans and metrics, and
//! return envelopes that echo the adopted trace id so the round trip is
//! externally observable.
//!
//! The hosting layer (out of scope here) owns the listening socket; it
//! extracts the carrier from request metadata, invokes a handler, and
//! forwards the envelope.

pub mod config;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod processing;

use std::sync::Arc;

use common::sim::Sampler;
use common::telemetry::metrics::MetricsRegistry;
use common::telemetry::span::SpanTracker;

use config::Config;
use observability::metrics::WorkerMetrics;
use processing::ProcessingService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,
    /// Span tracker for this process.
    pub tracker: Arc<SpanTracker>,
    /// Process-wide metrics registry.
    pub registry: Arc<MetricsRegistry>,
    /// Job execution service.
    pub processing: Arc<ProcessingService>,
}

impl AppState {
    /// Wire up worker state from configuration and an injectable sampler.
    #[must_use]
    pub fn new(config: Config, sampler: Arc<dyn Sampler>) -> Self {
        let registry = Arc::new(MetricsRegistry::new());
        let tracker = Arc::new(SpanTracker::new());
        let metrics = WorkerMetrics::register(&registry);
        let processing = Arc::new(ProcessingService::new(
            metrics,
            sampler,
            config.failure_probability,
        ));
        Self {
            config,
            tracker,
            registry,
            processing,
        }
    }
}
