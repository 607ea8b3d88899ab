//! Worker request handlers.
//!
//! Each handler adopts the trace identity the hosting layer extracted from
//! inbound request metadata (`RequestContext::inbound`), opens the request
//! root span under it, and scopes the correlation context to the endpoint.
//! Adopting the carried identifiers, never minting a new trace when one
//! arrives, is what joins the worker's spans onto the dispatcher's trace.

use common::error::Result;
use common::telemetry::RequestContext;

use crate::models::{HealthResponse, ProcessResponse, ProcessSlowResponse};
use crate::AppState;

/// Standard processing endpoint.
///
/// # Errors
///
/// `Cancelled` when an external deadline interrupts the job.
pub async fn process(state: &AppState, req: &mut RequestContext) -> Result<ProcessResponse> {
    let root = state.tracker.root_span("process-request", req.inbound.as_ref());
    let trace_id = root.trace_id();

    req.correlation.enter_scope([("endpoint", "/process")]);
    tracing::info!(
        context = %req.correlation,
        trace_id = %trace_id,
        "Received process request from upstream service"
    );

    let outcome = state.processing.process_job(&root, &req.cancel).await;
    let response = match outcome {
        Ok(job) => {
            tracing::info!(
                context = %req.correlation,
                trace_id = %trace_id,
                result = %job.result,
                "Returning response to caller"
            );
            root.end();
            Ok(ProcessResponse {
                status: "success".to_string(),
                result: job.result,
                trace_id: trace_id.to_string(),
            })
        }
        Err(err) => {
            tracing::error!(
                context = %req.correlation,
                trace_id = %trace_id,
                error = %err,
                "Job execution failed"
            );
            root.fail(&err);
            Err(err)
        }
    };
    req.correlation.exit_scope();
    response
}

/// Heavy processing endpoint; reports the measured duration.
///
/// # Errors
///
/// `Cancelled` when an external deadline interrupts the job.
pub async fn process_slow(
    state: &AppState,
    req: &mut RequestContext,
) -> Result<ProcessSlowResponse> {
    let root = state.tracker.root_span("process-slow-request", req.inbound.as_ref());
    let trace_id = root.trace_id();

    req.correlation.enter_scope([("endpoint", "/process-slow")]);
    tracing::info!(context = %req.correlation, trace_id = %trace_id, "Received slow process request");
    tracing::warn!(context = %req.correlation, "This request will take a while to complete");

    let outcome = state.processing.process_slow_job(&root, &req.cancel).await;
    let response = match outcome {
        Ok(job) => {
            let duration_ms = u64::try_from(job.elapsed.as_millis()).unwrap_or(u64::MAX);
            tracing::info!(
                context = %req.correlation,
                trace_id = %trace_id,
                duration_ms,
                result = %job.result,
                "Slow job completed"
            );
            root.end();
            Ok(ProcessSlowResponse {
                status: "success".to_string(),
                result: job.result,
                duration_ms,
                trace_id: trace_id.to_string(),
            })
        }
        Err(err) => {
            tracing::error!(
                context = %req.correlation,
                trace_id = %trace_id,
                error = %err,
                "Slow job failed"
            );
            root.fail(&err);
            Err(err)
        }
    };
    req.correlation.exit_scope();
    response
}

/// Flaky processing endpoint: fails with the configured probability.
///
/// # Errors
///
/// `Application` on the simulated failure draw; `Cancelled` on deadline.
pub async fn process_error(
    state: &AppState,
    req: &mut RequestContext,
) -> Result<ProcessResponse> {
    let root = state.tracker.root_span("process-error-request", req.inbound.as_ref());
    let trace_id = root.trace_id();

    req.correlation.enter_scope([("endpoint", "/process-error")]);
    tracing::info!(
        context = %req.correlation,
        trace_id = %trace_id,
        "Received process request with possible error"
    );

    let outcome = state.processing.process_flaky_job(&req.cancel).await;
    let response = match outcome {
        Ok(job) => {
            tracing::info!(
                context = %req.correlation,
                trace_id = %trace_id,
                "Process completed successfully (no error this time)"
            );
            root.end();
            Ok(ProcessResponse {
                status: "success".to_string(),
                result: job.result,
                trace_id: trace_id.to_string(),
            })
        }
        Err(err) => {
            tracing::error!(
                context = %req.correlation,
                trace_id = %trace_id,
                error = %err,
                "Process failed with error"
            );
            root.fail(&err);
            Err(err)
        }
    };
    req.correlation.exit_scope();
    response
}

/// Liveness probe. Checks nothing; never fails.
pub async fn health() -> HealthResponse {
    HealthResponse::up()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::sim::fixed::FixedSampler;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(crate::config::Config::default(), Arc::new(FixedSampler::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_adopts_inbound_trace_identity() {
        let state = state();
        let upstream: common::telemetry::propagation::TraceContext =
            common::telemetry::propagation::TraceContext::from_traceparent(
                "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
            )
            .unwrap();
        let mut req = common::telemetry::RequestContext::new().with_inbound(upstream);

        let response = process(&state, &mut req).await.unwrap();
        assert_eq!(response.trace_id, "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(response.status, "success");

        let root = state.tracker.span_named("process-request").unwrap();
        assert_eq!(root.trace_id.to_string(), response.trace_id);
        assert_eq!(
            root.parent_span_id.map(|p| p.to_string()),
            Some("b7ad6b7169203331".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_without_inbound_mints_new_trace() {
        let state = state();
        let mut req = common::telemetry::RequestContext::new();
        let response = process(&state, &mut req).await.unwrap();
        assert_eq!(response.trace_id.len(), 32);
    }

    #[tokio::test]
    async fn test_health_is_up() {
        assert_eq!(health().await.status, "UP");
    }
}
