//! Hierarchical trace spans with explicit, owned scopes.
//!
//! A [`SpanTracker`] mints identifiers and collects finished spans; an
//! [`ActiveSpan`] is the owned handle for one in-flight operation. There is
//! deliberately no ambient "current span": nested code gets its parent by
//! being handed the parent's handle and calling [`ActiveSpan::child`], so
//! independent concurrent requests each own an independent chain.
//!
//! Every span ends exactly once. `end` and `fail` consume the handle; if a
//! handle is dropped without either (early return, cancelled future), the
//! `Drop` impl closes the span with an error status so no exit path can
//! leave a dangling open span.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::metrics::lock_mutex;
use super::propagation::TraceContext;

/// Span identifier, rendered as 16 lowercase hex chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(IdParseError);
        }
        u64::from_str_radix(s, 16).map(SpanId).map_err(|_| IdParseError)
    }
}

/// Trace identifier, rendered as 32 lowercase hex chars. Shared by every
/// span of one logical request, including across the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Derive the trace id for a brand-new trace from its root span id.
    ///
    /// The root span's id becomes the trace id (widened to 16 bytes), so a
    /// trace is attributable to the root that started it.
    #[must_use]
    pub fn from_root(root: SpanId) -> Self {
        let lo = u128::from(root.as_u64());
        TraceId((lo << 64) | lo)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for TraceId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(IdParseError);
        }
        u128::from_str_radix(s, 16)
            .map(TraceId)
            .map_err(|_| IdParseError)
    }
}

/// Identifier was not the expected fixed-width hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParseError;

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("malformed trace/span identifier")
    }
}

impl std::error::Error for IdParseError {}

/// Kind of span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Entry span of a request within one process.
    Root,
    /// Nested operation inside a request.
    Internal,
}

impl SpanKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SpanKind::Root => "root",
            SpanKind::Internal => "internal",
        }
    }
}

/// Final status of a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanStatus {
    /// Operation completed successfully.
    Ok,
    /// Operation failed; the message comes from the recorded error.
    Error(String),
}

impl SpanStatus {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SpanStatus::Ok => "ok",
            SpanStatus::Error(_) => "error",
        }
    }
}

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        AttrValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Timestamped event appended to a span before it ends.
#[derive(Debug, Clone)]
pub struct SpanEvent {
    pub name: String,
    pub at: Instant,
}

/// Immutable record of a completed span, held in the tracker's export
/// buffer for inspection.
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub name: String,
    pub kind: SpanKind,
    /// Monotonic start, for ordering and duration math.
    pub started_at: Instant,
    /// Monotonic end; always `>= started_at`.
    pub ended_at: Instant,
    /// Wall-clock start stamp, for export and logs only.
    pub started_at_utc: DateTime<Utc>,
    pub attributes: BTreeMap<String, AttrValue>,
    pub events: Vec<SpanEvent>,
    pub status: SpanStatus,
}

impl FinishedSpan {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.ended_at.duration_since(self.started_at)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.status, SpanStatus::Error(_))
    }
}

/// Lock-free span identifier generator.
///
/// A per-process random seed mixed with an atomic counter through a
/// splitmix64 finalizer: unique within the process, unsynchronized across
/// callers, and distinct across processes with overwhelming probability,
/// which is what makes cross-boundary ids safe to join on.
#[derive(Debug)]
pub struct IdGenerator {
    seed: u64,
    counter: AtomicU64,
}

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        let (hi, lo) = uuid::Uuid::new_v4().as_u64_pair();
        Self {
            seed: hi ^ lo,
            counter: AtomicU64::new(0),
        }
    }

    /// Next span id; never zero (zero reads as "absent" on the wire).
    #[must_use]
    pub fn next_id(&self) -> SpanId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mixed = splitmix64(self.seed.wrapping_add(n));
        SpanId(mixed.max(1))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Creates spans and collects finished ones.
///
/// Shared behind an `Arc`; the only lock is a short push onto the export
/// buffer, never held across an await.
#[derive(Debug, Default)]
pub struct SpanTracker {
    ids: IdGenerator,
    finished: Mutex<Vec<FinishedSpan>>,
}

impl SpanTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the root span for a request.
    ///
    /// With `inherited` identity (continuing from an inbound call) the
    /// carried trace id is adopted and the carried span id becomes the
    /// parent; otherwise this mints a new trace whose id derives from the
    /// root span's own id.
    #[must_use]
    pub fn root_span(
        self: &Arc<Self>,
        name: impl Into<String>,
        inherited: Option<&TraceContext>,
    ) -> ActiveSpan {
        let span_id = self.ids.next_id();
        let (trace_id, parent) = match inherited {
            Some(ctx) => (ctx.trace_id, ctx.parent_span_id),
            None => (TraceId::from_root(span_id), None),
        };
        ActiveSpan::open(
            Arc::clone(self),
            trace_id,
            span_id,
            parent,
            name.into(),
            SpanKind::Root,
        )
    }

    /// Snapshot of all finished spans, oldest first.
    #[must_use]
    pub fn finished_spans(&self) -> Vec<FinishedSpan> {
        lock_mutex(&self.finished).clone()
    }

    /// Finished spans with the given name, oldest first.
    #[must_use]
    pub fn spans_named(&self, name: &str) -> Vec<FinishedSpan> {
        lock_mutex(&self.finished)
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    /// First finished span with the given name, if any.
    #[must_use]
    pub fn span_named(&self, name: &str) -> Option<FinishedSpan> {
        lock_mutex(&self.finished)
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    /// Drain the export buffer, handing ownership to the caller.
    #[must_use]
    pub fn drain_finished(&self) -> Vec<FinishedSpan> {
        std::mem::take(&mut *lock_mutex(&self.finished))
    }

    fn record(&self, span: FinishedSpan) {
        let parent = span
            .parent_span_id
            .map(|p| p.to_string())
            .unwrap_or_default();
        tracing::debug!(
            target: "beacon::spans",
            trace_id = %span.trace_id,
            span_id = %span.span_id,
            parent_span_id = %parent,
            name = %span.name,
            kind = span.kind.label(),
            status = span.status.label(),
            duration_ms = u64::try_from(span.duration().as_millis()).unwrap_or(u64::MAX),
            "span completed"
        );
        lock_mutex(&self.finished).push(span);
    }

    fn next_id(&self) -> SpanId {
        self.ids.next_id()
    }
}

/// Mutable per-span state; present until the span ends.
#[derive(Debug)]
struct OpenParts {
    name: String,
    kind: SpanKind,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
    attributes: BTreeMap<String, AttrValue>,
    events: Vec<SpanEvent>,
}

/// Owned handle for one in-flight span.
///
/// Mutated only by its owning scope. `end`/`fail` consume the handle;
/// dropping it unended closes the span with an error status.
#[derive(Debug)]
pub struct ActiveSpan {
    tracker: Arc<SpanTracker>,
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    open: Option<OpenParts>,
}

impl ActiveSpan {
    fn open(
        tracker: Arc<SpanTracker>,
        trace_id: TraceId,
        span_id: SpanId,
        parent_span_id: Option<SpanId>,
        name: String,
        kind: SpanKind,
    ) -> Self {
        Self {
            tracker,
            trace_id,
            span_id,
            parent_span_id,
            open: Some(OpenParts {
                name,
                kind,
                started_at: Instant::now(),
                started_at_utc: Utc::now(),
                attributes: BTreeMap::new(),
                events: Vec::new(),
            }),
        }
    }

    /// Open a child span: same trace, this span as parent.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> ActiveSpan {
        ActiveSpan::open(
            Arc::clone(&self.tracker),
            self.trace_id,
            self.tracker.next_id(),
            Some(self.span_id),
            name.into(),
            SpanKind::Internal,
        )
    }

    #[must_use]
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    #[must_use]
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// Identity to carry on an outbound call: this span becomes the parent
    /// on the far side of the boundary.
    #[must_use]
    pub fn context(&self) -> TraceContext {
        TraceContext {
            trace_id: self.trace_id,
            parent_span_id: Some(self.span_id),
        }
    }

    /// Attach an attribute. Last write per key wins; ignored after end.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        if let Some(open) = self.open.as_mut() {
            open.attributes.insert(key.into(), value.into());
        }
    }

    /// Append a timestamped event. Ignored after end.
    pub fn add_event(&mut self, name: impl Into<String>) {
        if let Some(open) = self.open.as_mut() {
            open.events.push(SpanEvent {
                name: name.into(),
                at: Instant::now(),
            });
        }
    }

    /// End successfully.
    pub fn end(mut self) {
        self.finish(SpanStatus::Ok);
    }

    /// Record the error (status + `exception` event) and end.
    pub fn fail(mut self, error: &impl fmt::Display) {
        let message = error.to_string();
        self.add_event("exception");
        self.finish(SpanStatus::Error(message));
    }

    fn finish(&mut self, status: SpanStatus) {
        let Some(open) = self.open.take() else {
            return;
        };
        self.tracker.record(FinishedSpan {
            trace_id: self.trace_id,
            span_id: self.span_id,
            parent_span_id: self.parent_span_id,
            name: open.name,
            kind: open.kind,
            started_at: open.started_at,
            ended_at: Instant::now(),
            started_at_utc: open.started_at_utc,
            attributes: open.attributes,
            events: open.events,
            status,
        });
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        // Backstop for cancellation and early returns: a span that was
        // never explicitly ended still closes, as an error.
        if self.open.is_some() {
            self.finish(SpanStatus::Error("span dropped before end".to_string()));
        }
    }
}
