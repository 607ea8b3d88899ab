//! Wired dispatcher + worker fixture for end-to-end tests.

use std::sync::Arc;

use common::sim::fixed::FixedSampler;
use common::sim::Sampler;
use dispatcher_service::config::Config as DispatcherConfig;
use dispatcher_service::AppState as DispatcherState;
use worker_service::config::Config as WorkerConfig;
use worker_service::AppState as WorkerState;

use crate::in_process::InProcessWorkerClient;

/// A dispatcher wired to a real worker core through the in-process
/// boundary. Both sides keep their own tracker and registry, exactly like
/// two separate processes would.
pub struct TestDispatcher {
    pub dispatcher: DispatcherState,
    pub worker: WorkerState,
}

impl TestDispatcher {
    /// Fixture with fully deterministic samplers on both sides.
    #[must_use]
    pub fn new() -> Self {
        Self::with_samplers(
            Arc::new(FixedSampler::new()),
            Arc::new(FixedSampler::new()),
        )
    }

    /// Fixture with caller-chosen samplers (e.g. a failing worker draw).
    #[must_use]
    pub fn with_samplers(
        dispatcher_sampler: Arc<dyn Sampler>,
        worker_sampler: Arc<dyn Sampler>,
    ) -> Self {
        let worker = WorkerState::new(WorkerConfig::default(), worker_sampler);
        let client = Arc::new(InProcessWorkerClient::new(worker.clone()));
        let dispatcher = DispatcherState::new(test_config(), dispatcher_sampler, client);
        Self { dispatcher, worker }
    }
}

impl Default for TestDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatcher config for tests; the in-process boundary never dials the
/// address.
fn test_config() -> DispatcherConfig {
    DispatcherConfig {
        worker_url: "http://worker.test.invalid:8081".to_string(),
        request_timeout: std::time::Duration::from_millis(10_000),
    }
}
