//! Request orchestrator: one operation per endpoint kind.
//!
//! Every kind follows the same instrumentation contract (active-request
//! gauge held for exactly the request's lifetime, total-request counter,
//! duration timer, and a root span) with guards doing the releasing so no
//! exit path (success, error, cancellation) can leak an increment or leave
//! a span open. The handlers never touch a global: the request's
//! correlation context and cancellation token arrive in an explicit
//! [`RequestContext`], and span parentage flows through the span handles
//! themselves.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use common::error::{BeaconError, Result};
use common::sim::{self, FAST_DELAY_MS, SLOW_DELAY_MS};
use common::telemetry::span::ActiveSpan;
use common::telemetry::RequestContext;

use crate::models::{DelegateResponse, DelegateSlowResponse, EndpointResponse, HealthResponse};
use crate::AppState;

/// Fast endpoint: a single short simulated delay.
///
/// # Errors
///
/// `Cancelled` when an external deadline interrupts the delay.
pub async fn fast(state: &AppState, req: &mut RequestContext) -> Result<EndpointResponse> {
    let _active = state.metrics.active_requests.track();
    let _timing = state.metrics.request_duration.start();
    state.metrics.requests_total.increment();

    let mut root = state.tracker.root_span("fast-request", req.inbound.as_ref());
    root.set_attribute("endpoint", "fast");

    tracing::info!(context = %req.correlation, "Processing fast request");
    let delay = state.sampler.delay_ms(FAST_DELAY_MS);
    if let Err(err) = sim::pause(delay, &req.cancel).await {
        root.fail(&err);
        return Err(err);
    }
    tracing::info!(context = %req.correlation, "Fast request completed");
    root.end();

    Ok(EndpointResponse {
        status: "success".to_string(),
        endpoint: "fast".to_string(),
        latency_ms: millis(delay),
    })
}

/// Slow endpoint: one internal processing span wrapping two sequential,
/// independently timed sub-stages that split the drawn delay in half.
///
/// # Errors
///
/// `Cancelled` when an external deadline interrupts either stage.
pub async fn slow(state: &AppState, req: &mut RequestContext) -> Result<EndpointResponse> {
    let _active = state.metrics.active_requests.track();
    let _timing = state.metrics.request_duration.start();
    state.metrics.requests_total.increment();

    let mut root = state.tracker.root_span("slow-request", req.inbound.as_ref());
    root.set_attribute("endpoint", "slow");

    let total = state.sampler.delay_ms(SLOW_DELAY_MS);
    tracing::info!(
        context = %req.correlation,
        delay_ms = millis(total),
        "Processing slow request - this will take a while"
    );

    let mut processing = root.child("slow-processing");
    processing.set_attribute("processing.delay_ms", millis(total));
    processing.set_attribute("processing.type", "simulated");

    let half = total / 2;
    for stage_name in ["stage-one-processing", "stage-two-processing"] {
        if let Err(err) = run_stage(&processing, stage_name, half, &req.cancel).await {
            processing.fail(&err);
            root.fail(&err);
            return Err(err);
        }
    }

    processing.add_event("processing-completed");
    processing.end();

    tracing::info!(
        context = %req.correlation,
        delay_ms = millis(total),
        "Slow request completed"
    );
    root.end();

    Ok(EndpointResponse {
        status: "success".to_string(),
        endpoint: "slow".to_string(),
        latency_ms: millis(total),
    })
}

/// One sub-stage of the slow path, under its own span.
async fn run_stage(
    parent: &ActiveSpan,
    name: &str,
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut stage = parent.child(name);
    stage.set_attribute("stage.delay_ms", millis(delay));
    tracing::info!(stage = name, "Executing processing stage");
    match sim::pause(delay, cancel).await {
        Ok(()) => {
            stage.end();
            Ok(())
        }
        Err(err) => {
            stage.fail(&err);
            Err(err)
        }
    }
}

/// Error endpoint: deterministically raises an application error and marks
/// the request span accordingly. No randomness; this path exists to
/// exercise failure handling.
///
/// # Errors
///
/// Always `Application`.
pub async fn error(state: &AppState, req: &mut RequestContext) -> Result<EndpointResponse> {
    let _active = state.metrics.active_requests.track();
    let _timing = state.metrics.request_duration.start();
    state.metrics.requests_total.increment();

    let mut root = state.tracker.root_span("error-request", req.inbound.as_ref());
    root.set_attribute("endpoint", "error");
    root.set_attribute("error.simulated", true);

    tracing::error!(context = %req.correlation, "Simulating error condition");
    let err = BeaconError::Application("Simulated error for observability demo".to_string());
    root.fail(&err);
    Err(err)
}

/// Delegate endpoint: prepare under a correlation scope, then one boundary
/// call to the worker's standard endpoint with trace identity carried
/// in-band.
///
/// # Errors
///
/// `Remote` when the worker reports failure, `Transport` when the call
/// cannot complete, `Cancelled` on deadline.
pub async fn external_call(
    state: &AppState,
    req: &mut RequestContext,
) -> Result<DelegateResponse> {
    let _active = state.metrics.active_requests.track();
    let _timing = state.metrics.request_duration.start();
    state.metrics.requests_total.increment();

    let request_id = new_request_id();
    req.correlation.enter_scope([
        ("request_id", request_id.clone()),
        ("endpoint", "/external-call".to_string()),
        ("operation", "worker-integration".to_string()),
    ]);
    let outcome = delegate(state, req, &request_id, Delegation::Standard).await;
    req.correlation.exit_scope();

    let (worker_response, duration_ms) = outcome?;
    Ok(DelegateResponse {
        status: "success".to_string(),
        endpoint: "external-call".to_string(),
        request_id,
        worker_response,
        duration_ms,
    })
}

/// Slow delegate endpoint: same contract against the worker's heavy
/// endpoint.
///
/// # Errors
///
/// `Remote` when the worker reports failure, `Transport` when the call
/// cannot complete, `Cancelled` on deadline.
pub async fn external_call_slow(
    state: &AppState,
    req: &mut RequestContext,
) -> Result<DelegateSlowResponse> {
    let _active = state.metrics.active_requests.track();
    let _timing = state.metrics.request_duration.start();
    state.metrics.requests_total.increment();

    let request_id = new_request_id();
    req.correlation.enter_scope([
        ("request_id", request_id.clone()),
        ("endpoint", "/external-call-slow".to_string()),
        ("operation", "worker-integration".to_string()),
    ]);
    let outcome = delegate(state, req, &request_id, Delegation::Slow).await;
    req.correlation.exit_scope();

    let (worker_response, _duration_ms) = outcome?;
    Ok(DelegateSlowResponse {
        status: "success".to_string(),
        endpoint: "external-call-slow".to_string(),
        worker_response,
    })
}

/// Which worker endpoint a delegation targets.
#[derive(Debug, Clone, Copy)]
enum Delegation {
    Standard,
    Slow,
}

/// Shared delegate body: prepare span, then exactly one boundary call.
///
/// The prepare span closes before the call starts, so the worker's spans
/// can only begin after it ended. The call itself races the request's
/// cancellation token; the worker client future is dropped on cancel.
async fn delegate(
    state: &AppState,
    req: &RequestContext,
    request_id: &str,
    target: Delegation,
) -> Result<(String, u64)> {
    let root = state
        .tracker
        .root_span(
            match target {
                Delegation::Standard => "external-call-request",
                Delegation::Slow => "external-call-slow-request",
            },
            req.inbound.as_ref(),
        );

    let mut prep = root.child("prepare-worker-call");
    prep.set_attribute("request.id", request_id);
    tracing::info!(context = %req.correlation, "Preparing external call to worker service");
    tracing::debug!(context = %req.correlation, "Validating request parameters");
    prep.add_event("validation-complete");
    prep.end();

    tracing::info!(context = %req.correlation, "Invoking worker service");
    let carrier = root.context();
    let started = Instant::now();
    let call = async {
        match target {
            Delegation::Standard => state.worker.process(&carrier).await,
            Delegation::Slow => state.worker.process_slow(&carrier).await,
        }
    };
    let outcome = tokio::select! {
        result = call => result,
        () = req.cancel.cancelled() => {
            Err(BeaconError::Cancelled("boundary call interrupted".to_string()))
        }
    };

    match outcome {
        Ok(worker_response) => {
            let duration_ms = millis(started.elapsed());
            tracing::info!(
                context = %req.correlation,
                duration_ms,
                result = %worker_response,
                "Worker call completed"
            );
            root.end();
            Ok((worker_response, duration_ms))
        }
        Err(err) => {
            tracing::error!(context = %req.correlation, error = %err, "Worker call failed");
            root.fail(&err);
            Err(err)
        }
    }
}

/// Liveness probe. Checks nothing; never fails.
pub async fn health() -> HealthResponse {
    HealthResponse::up()
}

/// 8-character request token.
fn new_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_is_eight_chars() {
        let id = new_request_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
    }
}
