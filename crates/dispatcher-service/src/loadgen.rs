//! Synthetic load generation.
//!
//! Draws independent uniform choices over the endpoint kinds and invokes
//! the orchestrator for each, with a fresh correlation context per
//! iteration. Failures are handled symmetrically for every kind: any
//! iteration failure is counted in `errors` and nothing else, a success
//! counts toward its kind, so the four tallies always sum to the requested
//! total. An iteration's failure never propagates out of the generator.

use common::telemetry::RequestContext;

use crate::handlers;
use crate::models::LoadReport;
use crate::AppState;

/// Endpoint kinds the generator draws from, uniformly.
const KINDS: usize = 4;

/// Run `count` synthetic requests and report the tallies.
///
/// `cancel` (from the enclosing request context) flows into each
/// iteration, so cancelling the load request interrupts the in-flight
/// iteration; interrupted iterations count as errors like any other
/// failure.
pub async fn run(state: &AppState, req: &RequestContext, count: u32) -> LoadReport {
    tracing::info!(context = %req.correlation, count, "Generating requests for load testing");

    let (mut fast, mut slow, mut errors, mut external) = (0u32, 0u32, 0u32, 0u32);
    for _ in 0..count {
        // Fresh per-iteration context; only the cancellation lineage is
        // shared with the enclosing request.
        let mut iteration = RequestContext::new().with_cancel(req.cancel.child_token());
        let drawn = state.sampler.choice(KINDS);
        let outcome = match drawn {
            0 => handlers::fast(state, &mut iteration).await.map(drop),
            1 => handlers::slow(state, &mut iteration).await.map(drop),
            2 => handlers::error(state, &mut iteration).await.map(drop),
            _ => handlers::external_call(state, &mut iteration).await.map(drop),
        };
        match outcome {
            Ok(()) => match drawn {
                0 => fast += 1,
                1 => slow += 1,
                // The error kind cannot succeed; kept for exhaustiveness.
                2 => errors += 1,
                _ => external += 1,
            },
            Err(err) => {
                tracing::warn!(
                    context = %req.correlation,
                    error = %err,
                    "Request failed during load generation"
                );
                errors += 1;
            }
        }
    }

    tracing::info!(
        context = %req.correlation,
        fast,
        slow,
        errors,
        external,
        "Load generation completed"
    );
    LoadReport::completed(count, fast, slow, errors, external)
}
