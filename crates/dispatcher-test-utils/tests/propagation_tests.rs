//! End-to-end trace propagation tests across the dispatcher->worker
//! boundary. The two cores share no trace state; identity crosses only as
//! a serialized `traceparent` string, so these tests prove the real
//! contract: the id minted at the dispatcher is the id observed at the
//! worker.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use common::error::BeaconError;
use common::sim::fixed::FixedSampler;
use common::telemetry::propagation::TraceContext;
use common::telemetry::RequestContext;
use dispatcher_service::services::WorkerClient;
use dispatcher_service::{handlers, loadgen};
use dispatcher_test_utils::{InProcessWorkerClient, TestDispatcher};

#[tokio::test(start_paused = true)]
async fn test_trace_id_survives_the_boundary_unchanged() {
    let fixture = TestDispatcher::new();
    let mut req = RequestContext::new();

    let response = handlers::external_call(&fixture.dispatcher, &mut req)
        .await
        .unwrap();
    assert!(response.worker_response.starts_with("processed_in_"));

    let dispatcher_root = fixture
        .dispatcher
        .tracker
        .span_named("external-call-request")
        .unwrap();
    let worker_root = fixture.worker.tracker.span_named("process-request").unwrap();

    // Same trace on both sides of the hop, parent-child linked.
    assert_eq!(worker_root.trace_id, dispatcher_root.trace_id);
    assert_eq!(worker_root.parent_span_id, Some(dispatcher_root.span_id));

    // The worker's own child span stays on the same trace.
    let job = fixture.worker.tracker.span_named("worker-job-execution").unwrap();
    assert_eq!(job.trace_id, dispatcher_root.trace_id);
    assert_eq!(job.parent_span_id, Some(worker_root.span_id));
}

#[tokio::test(start_paused = true)]
async fn test_prepare_span_fully_closes_before_worker_spans_begin() {
    let fixture = TestDispatcher::new();
    let mut req = RequestContext::new();
    handlers::external_call(&fixture.dispatcher, &mut req)
        .await
        .unwrap();

    let prep_spans = fixture.dispatcher.tracker.spans_named("prepare-worker-call");
    assert_eq!(prep_spans.len(), 1, "exactly one prepare span");
    let prep = &prep_spans[0];
    assert!(!prep.is_error());

    let worker_root = fixture.worker.tracker.span_named("process-request").unwrap();
    assert!(
        prep.ended_at <= worker_root.started_at,
        "prepare span must close before the worker's spans begin"
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_delegation_round_trip() {
    let fixture = TestDispatcher::new();
    let mut req = RequestContext::new();
    let response = handlers::external_call_slow(&fixture.dispatcher, &mut req)
        .await
        .unwrap();
    assert!(response.worker_response.starts_with("slow_processed_in_"));

    let dispatcher_root = fixture
        .dispatcher
        .tracker
        .span_named("external-call-slow-request")
        .unwrap();
    let worker_root = fixture.worker.tracker.span_named("process-slow-request").unwrap();
    assert_eq!(worker_root.trace_id, dispatcher_root.trace_id);
}

#[tokio::test(start_paused = true)]
async fn test_worker_failure_crosses_back_as_remote_and_marks_both_sides() {
    let fixture = TestDispatcher::with_samplers(
        Arc::new(FixedSampler::new()),
        Arc::new(FixedSampler::new().with_failures(true)),
    );

    // Drive the flaky worker endpoint straight through the boundary.
    let client = InProcessWorkerClient::new(fixture.worker.clone());
    let root = fixture.dispatcher.tracker.root_span("probe", None);
    let err = client.process_error(&root.context()).await.unwrap_err();
    root.fail(&err);

    assert!(matches!(err, BeaconError::Remote(_)));
    assert!(err.to_string().contains("Simulated worker error"));

    let worker_root = fixture.worker.tracker.span_named("process-error-request").unwrap();
    assert!(worker_root.is_error());
    assert_eq!(
        worker_root.trace_id,
        fixture.dispatcher.tracker.span_named("probe").unwrap().trace_id
    );
}

#[tokio::test(start_paused = true)]
async fn test_carrier_without_inbound_context_makes_worker_mint_its_own_trace() {
    let fixture = TestDispatcher::new();
    // A hosting layer that drops the metadata: the worker must mint a new
    // trace rather than fail.
    let mut req = RequestContext::new();
    let response = worker_service::handlers::process(&fixture.worker, &mut req)
        .await
        .unwrap();
    assert_eq!(response.trace_id.len(), 32);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_mid_boundary_call_leaks_nothing_on_either_side() {
    let fixture = TestDispatcher::new();
    let cancel = CancellationToken::new();
    let mut req = RequestContext::new().with_cancel(cancel.clone());

    let err = {
        let pending = handlers::external_call(&fixture.dispatcher, &mut req);
        tokio::pin!(pending);
        // Run up to the worker's simulated delay, then cancel the request.
        assert!(futures::poll!(pending.as_mut()).is_pending());
        cancel.cancel();
        pending.await.unwrap_err()
    };
    assert!(matches!(err, BeaconError::Cancelled(_)));

    // Dispatcher side: gauge released, spans closed, scope torn down.
    assert_eq!(fixture.dispatcher.metrics.active_requests.get(), 0);
    assert!(req.correlation.is_empty());
    // Worker side: the dropped handler future still released its gauge
    // and closed its spans on the way down.
    let worker_gauge = fixture
        .worker
        .registry
        .gauge("worker_active_jobs", &[("service", "worker-service")]);
    assert_eq!(worker_gauge.get(), 0);
    assert!(fixture.worker.tracker.finished_spans().iter().all(|s| {
        s.ended_at >= s.started_at
    }));
}

#[tokio::test(start_paused = true)]
async fn test_loadgen_drives_real_delegations_and_tallies_sum() {
    let fixture = TestDispatcher::new();
    let req = RequestContext::new();
    let report = loadgen::run(&fixture.dispatcher, &req, 8).await;
    assert_eq!(
        report.fast + report.slow + report.errors + report.external,
        report.total
    );
    assert_eq!(report.external, 2, "delegations succeeded via the worker");

    // Every delegation produced worker-side spans on the dispatcher's traces.
    let worker_roots = fixture.worker.tracker.spans_named("process-request");
    assert_eq!(worker_roots.len(), 2);

    let dispatcher_roots = fixture
        .dispatcher
        .tracker
        .spans_named("external-call-request");
    for (worker_root, dispatcher_root) in worker_roots.iter().zip(dispatcher_roots.iter()) {
        assert_eq!(worker_root.trace_id, dispatcher_root.trace_id);
    }
}

#[tokio::test(start_paused = true)]
async fn test_traceparent_is_the_only_thing_the_boundary_needs() {
    // Belt-and-braces on the contract itself: a context rendered to the
    // wire format and re-extracted is the same identity.
    let fixture = TestDispatcher::new();
    let root = fixture.dispatcher.tracker.root_span("probe", None);
    let carrier = root.context();

    let mut metadata = std::collections::HashMap::new();
    carrier.inject(&mut metadata);
    let extracted = TraceContext::extract(&metadata).unwrap();
    assert_eq!(extracted, carrier);
    root.end();
}
