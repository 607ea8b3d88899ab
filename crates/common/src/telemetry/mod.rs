//! Telemetry substrate shared by the dispatcher and the worker.
//!
//! Everything request-scoped here is an explicit value threaded through
//! calls: there is no global current span and no thread-bound log context.
//! A handler receives a [`RequestContext`], creates spans through an
//! `Arc<SpanTracker>`, and reads/writes metrics through cheap-clone handles
//! from a [`metrics::MetricsRegistry`].

pub mod correlation;
pub mod logging;
pub mod metrics;
pub mod propagation;
pub mod span;

use correlation::CorrelationContext;
use propagation::TraceContext;
use tokio_util::sync::CancellationToken;

/// Per-request context threaded explicitly through every instrumented call.
///
/// Owns the request's correlation map and cancellation token, plus the
/// trace identity carried in by the hosting layer, if any. One value exists
/// per logical request; nothing in it is shared between requests, so a
/// dropped request cannot leak correlation keys or trace identity into a
/// neighbour served by the same worker thread.
#[derive(Debug, Default)]
pub struct RequestContext {
    /// Request-scoped key/value annotations merged into log emissions.
    pub correlation: CorrelationContext,
    /// Fires when an external deadline or shutdown interrupts the request.
    pub cancel: CancellationToken,
    /// Trace identity extracted from inbound request metadata, if present.
    pub inbound: Option<TraceContext>,
}

impl RequestContext {
    /// Fresh context for a request with no inbound trace identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a cancellation token supplied by the hosting layer.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Adopt trace identity carried in on the inbound call.
    #[must_use]
    pub fn with_inbound(mut self, inbound: TraceContext) -> Self {
        self.inbound = Some(inbound);
        self
    }
}
