//! In-process boundary between dispatcher and worker.
//!
//! Stands in for the hosting layers on both sides of the network hop. The
//! carrier is injected into a plain string map on the dispatcher side and
//! extracted from it on the worker side. The two cores share no trace
//! state, so any identity that survives the crossing did it the same way
//! it would over real request metadata.

use std::collections::HashMap;

use async_trait::async_trait;

use common::error::{BeaconError, Result};
use common::telemetry::propagation::TraceContext;
use common::telemetry::RequestContext;
use dispatcher_service::services::WorkerClient;
use worker_service::{handlers, AppState as WorkerState};

/// [`WorkerClient`] that invokes a real worker core through serialized
/// metadata only.
pub struct InProcessWorkerClient {
    worker: WorkerState,
}

impl InProcessWorkerClient {
    #[must_use]
    pub fn new(worker: WorkerState) -> Self {
        Self { worker }
    }

    /// What the worker-side hosting layer would do: extract the carrier
    /// from metadata and build the request context around it.
    fn inbound_request(metadata: &HashMap<String, String>) -> RequestContext {
        match TraceContext::extract(metadata) {
            Some(inbound) => RequestContext::new().with_inbound(inbound),
            None => RequestContext::new(),
        }
    }

    /// What the dispatcher-side hosting layer would do: render the carrier
    /// into request metadata.
    fn outbound_metadata(ctx: &TraceContext) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        ctx.inject(&mut metadata);
        metadata
    }
}

#[async_trait]
impl WorkerClient for InProcessWorkerClient {
    async fn process(&self, ctx: &TraceContext) -> Result<String> {
        let metadata = Self::outbound_metadata(ctx);
        let mut req = Self::inbound_request(&metadata);
        match handlers::process(&self.worker, &mut req).await {
            Ok(response) => Ok(response.result),
            // The worker ran and reported failure: remote, not transport.
            Err(err) => Err(BeaconError::Remote(err.to_string())),
        }
    }

    async fn process_slow(&self, ctx: &TraceContext) -> Result<String> {
        let metadata = Self::outbound_metadata(ctx);
        let mut req = Self::inbound_request(&metadata);
        match handlers::process_slow(&self.worker, &mut req).await {
            Ok(response) => Ok(response.result),
            Err(err) => Err(BeaconError::Remote(err.to_string())),
        }
    }

    async fn process_error(&self, ctx: &TraceContext) -> Result<String> {
        let metadata = Self::outbound_metadata(ctx);
        let mut req = Self::inbound_request(&metadata);
        match handlers::process_error(&self.worker, &mut req).await {
            Ok(response) => Ok(response.result),
            Err(err) => Err(BeaconError::Remote(err.to_string())),
        }
    }
}
