//! Front-facing dispatcher service core.
//!
//! The dispatcher orchestrates simulated request handling per endpoint
//! kind, instruments every request with spans, metrics, and correlation
//! scopes, and delegates to the downstream worker across a process
//! boundary with trace identity carried in-band.
//!
//! The hosting layer (out of scope here) owns the listening socket; it
//! builds a [`common::telemetry::RequestContext`] per inbound request,
//! invokes a handler, and forwards the typed envelope, converting any
//! error into [`models::ErrorEnvelope`].

pub mod config;
pub mod handlers;
pub mod loadgen;
pub mod models;
pub mod observability;
pub mod services;

use std::sync::Arc;

use common::error::Result;
use common::sim::Sampler;
use common::telemetry::metrics::MetricsRegistry;
use common::telemetry::span::SpanTracker;

use config::Config;
use observability::metrics::DispatcherMetrics;
use services::worker_client::{HttpWorkerClient, WorkerClient};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,
    /// Span tracker for this process.
    pub tracker: Arc<SpanTracker>,
    /// Process-wide metrics registry.
    pub registry: Arc<MetricsRegistry>,
    /// Dispatcher metric handles.
    pub metrics: DispatcherMetrics,
    /// Delay and fault sampler.
    pub sampler: Arc<dyn Sampler>,
    /// Worker client for dispatcher->worker delegation.
    pub worker: Arc<dyn WorkerClient>,
}

impl AppState {
    /// Wire up dispatcher state with an injectable sampler and worker
    /// client (tests pass deterministic ones).
    #[must_use]
    pub fn new(config: Config, sampler: Arc<dyn Sampler>, worker: Arc<dyn WorkerClient>) -> Self {
        let registry = Arc::new(MetricsRegistry::new());
        let metrics = DispatcherMetrics::register(&registry);
        Self {
            config,
            tracker: Arc::new(SpanTracker::new()),
            registry,
            metrics,
            sampler,
            worker,
        }
    }

    /// Production wiring: HTTP worker client against the configured
    /// downstream address.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the HTTP client cannot be built.
    pub fn with_http_worker(config: Config, sampler: Arc<dyn Sampler>) -> Result<Self> {
        let worker = Arc::new(HttpWorkerClient::new(&config)?);
        Ok(Self::new(config, sampler, worker))
    }
}
