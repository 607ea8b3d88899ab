//! Worker core integration tests: span topology, metrics lifecycle,
//! failure-rate convergence, and cancellation hygiene.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use common::error::BeaconError;
use common::sim::fixed::FixedSampler;
use common::sim::{SeededSampler, DEFAULT_FAILURE_PROBABILITY};
use common::telemetry::span::SpanStatus;
use common::telemetry::RequestContext;
use worker_service::config::Config;
use worker_service::{handlers, AppState};

fn fixed_state() -> AppState {
    AppState::new(Config::default(), Arc::new(FixedSampler::new()))
}

#[tokio::test(start_paused = true)]
async fn test_process_produces_closed_job_span_under_request_root() {
    let state = fixed_state();
    let mut req = RequestContext::new();

    let response = handlers::process(&state, &mut req).await.unwrap();
    assert!(response.result.starts_with("processed_in_"));

    let spans = state.tracker.finished_spans();
    assert_eq!(spans.len(), 2);

    let job = state.tracker.span_named("worker-job-execution").unwrap();
    let root = state.tracker.span_named("process-request").unwrap();
    assert_eq!(job.parent_span_id, Some(root.span_id));
    assert_eq!(job.trace_id, root.trace_id);
    assert_eq!(job.status, SpanStatus::Ok);
    assert_eq!(job.attributes.get("job.type"), Some(&"standard".into()));
    assert_eq!(job.events.len(), 1);
    assert_eq!(job.events[0].name, "job-completed");

    // Parent closes after the child, and both are internally ordered.
    assert!(root.ended_at >= job.ended_at);
    assert!(job.ended_at >= job.started_at);
}

#[tokio::test(start_paused = true)]
async fn test_active_jobs_gauge_returns_to_zero_on_success_and_failure() {
    let state = fixed_state();
    let gauge = state
        .registry
        .gauge("worker_active_jobs", &[("service", "worker-service")]);

    let mut req = RequestContext::new();
    handlers::process(&state, &mut req).await.unwrap();
    assert_eq!(gauge.get(), 0);

    // Deterministically failing flaky path.
    let failing = AppState::new(
        Config::default(),
        Arc::new(FixedSampler::new().with_failures(true)),
    );
    let failing_gauge = failing
        .registry
        .gauge("worker_active_jobs", &[("service", "worker-service")]);
    let mut req = RequestContext::new();
    let err = handlers::process_error(&failing, &mut req).await.unwrap_err();
    assert!(matches!(err, BeaconError::Application(_)));
    assert_eq!(failing_gauge.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_jobs_processed_counts_only_successes() {
    let state = fixed_state();
    let counter = state
        .registry
        .counter("worker_jobs_processed_total", &[("service", "worker-service")]);

    let mut req = RequestContext::new();
    handlers::process(&state, &mut req).await.unwrap();
    handlers::process_slow(&state, &mut req).await.unwrap();
    assert_eq!(counter.get(), 2);

    let failing = AppState::new(
        Config::default(),
        Arc::new(FixedSampler::new().with_failures(true)),
    );
    let failing_counter = failing
        .registry
        .counter("worker_jobs_processed_total", &[("service", "worker-service")]);
    let mut req = RequestContext::new();
    let _ = handlers::process_error(&failing, &mut req).await;
    assert_eq!(failing_counter.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_process_slow_reports_measured_duration() {
    let state = fixed_state();
    let mut req = RequestContext::new();
    let response = handlers::process_slow(&state, &mut req).await.unwrap();
    assert!(response.result.starts_with("slow_processed_in_"));
    // FixedSampler draws the bottom of [3000, 8000).
    assert!(response.duration_ms >= 3000);
}

#[tokio::test(start_paused = true)]
async fn test_flaky_failure_rate_converges_to_configured_probability() {
    let state = AppState::new(Config::default(), Arc::new(SeededSampler::new(11)));
    let mut failures = 0u32;
    let draws = 2000u32;
    for _ in 0..draws {
        let mut req = RequestContext::new();
        if handlers::process_error(&state, &mut req).await.is_err() {
            failures += 1;
        }
    }
    let rate = f64::from(failures) / f64::from(draws);
    assert!(
        (rate - DEFAULT_FAILURE_PROBABILITY).abs() < 0.03,
        "rate {rate} strayed from 0.30"
    );
}

#[tokio::test(start_paused = true)]
async fn test_flaky_error_marks_request_span_status_error() {
    let state = AppState::new(
        Config::default(),
        Arc::new(FixedSampler::new().with_failures(true)),
    );
    let mut req = RequestContext::new();
    let err = handlers::process_error(&state, &mut req).await.unwrap_err();
    assert!(matches!(err, BeaconError::Application(_)));

    let root = state.tracker.span_named("process-error-request").unwrap();
    assert!(root.is_error());
    assert!(root.events.iter().any(|e| e.name == "exception"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_releases_gauge_and_closes_spans() {
    let state = fixed_state();
    let gauge = state
        .registry
        .gauge("worker_active_jobs", &[("service", "worker-service")]);

    let cancel = CancellationToken::new();
    let mut req = RequestContext::new().with_cancel(cancel.clone());

    let pending = handlers::process(&state, &mut req);
    tokio::pin!(pending);
    // Let the job start, then pull the plug mid-delay.
    assert!(futures::poll!(pending.as_mut()).is_pending());
    cancel.cancel();
    let err = pending.await.unwrap_err();
    assert!(matches!(err, BeaconError::Cancelled(_)));

    assert_eq!(gauge.get(), 0, "gauge leaked an increment");
    let spans = state.tracker.finished_spans();
    assert_eq!(spans.len(), 2, "a span was left open");
    assert!(spans.iter().all(|s| s.is_error()));
}

#[tokio::test(start_paused = true)]
async fn test_correlation_scope_is_torn_down_after_each_request() {
    let state = fixed_state();
    let mut req = RequestContext::new();
    handlers::process(&state, &mut req).await.unwrap();
    assert!(req.correlation.is_empty());

    let failing = AppState::new(
        Config::default(),
        Arc::new(FixedSampler::new().with_failures(true)),
    );
    let _ = handlers::process_error(&failing, &mut req).await;
    assert!(req.correlation.is_empty(), "scope leaked past an error exit");
}
