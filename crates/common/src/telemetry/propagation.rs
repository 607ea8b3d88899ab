//! Trace identity propagation across the service boundary.
//!
//! The carrier is a W3C-style `traceparent` value
//! (`00-{trace_id}-{span_id}-01`) injected into and extracted from string
//! request metadata. The receiving side adopts the carried trace id and
//! parent span id rather than minting a new trace; that contract, over
//! nothing but strings, is what keeps one logical request joined across
//! two processes that share no memory.

use std::collections::HashMap;

use super::span::{SpanId, TraceId};

/// Metadata key the carrier travels under.
pub const TRACEPARENT_KEY: &str = "traceparent";

const SUPPORTED_VERSION: &str = "00";
const ABSENT_SPAN_ID: &str = "0000000000000000";

/// Trace identity carried across a boundary call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    /// Identifier shared by every span of the logical request.
    pub trace_id: TraceId,
    /// Span on the calling side that becomes the parent on the far side.
    pub parent_span_id: Option<SpanId>,
}

impl TraceContext {
    /// Render as a `traceparent` value.
    #[must_use]
    pub fn to_traceparent(&self) -> String {
        let parent = self
            .parent_span_id
            .map_or_else(|| ABSENT_SPAN_ID.to_string(), |id| id.to_string());
        format!("{SUPPORTED_VERSION}-{}-{parent}-01", self.trace_id)
    }

    /// Parse a `traceparent` value; `None` for anything malformed.
    ///
    /// Only version `00` is accepted. An all-zero span field reads as an
    /// absent parent.
    #[must_use]
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.split('-');
        let version = parts.next()?;
        let trace = parts.next()?;
        let parent = parts.next()?;
        let _flags = parts.next()?;
        if parts.next().is_some() || version != SUPPORTED_VERSION {
            return None;
        }
        let trace_id: TraceId = trace.parse().ok()?;
        let parent_span_id = if parent == ABSENT_SPAN_ID {
            None
        } else {
            Some(parent.parse::<SpanId>().ok()?)
        };
        Some(Self {
            trace_id,
            parent_span_id,
        })
    }

    /// Inject the carrier into outbound request metadata.
    pub fn inject(&self, metadata: &mut HashMap<String, String>) {
        metadata.insert(TRACEPARENT_KEY.to_string(), self.to_traceparent());
    }

    /// Extract a carrier from inbound request metadata, if present and
    /// well-formed.
    #[must_use]
    pub fn extract(metadata: &HashMap<String, String>) -> Option<Self> {
        metadata
            .get(TRACEPARENT_KEY)
            .and_then(|value| Self::from_traceparent(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TraceContext {
        TraceContext {
            trace_id: "0af7651916cd43dd8448eb211c80319c".parse().unwrap(),
            parent_span_id: Some("b7ad6b7169203331".parse().unwrap()),
        }
    }

    #[test]
    fn test_traceparent_render() {
        assert_eq!(
            context().to_traceparent(),
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
        );
    }

    #[test]
    fn test_traceparent_round_trip() {
        let ctx = context();
        let parsed = TraceContext::from_traceparent(&ctx.to_traceparent()).unwrap();
        assert_eq!(parsed, ctx);
    }

    #[test]
    fn test_absent_parent_round_trips_as_zeros() {
        let ctx = TraceContext {
            trace_id: context().trace_id,
            parent_span_id: None,
        };
        let rendered = ctx.to_traceparent();
        assert!(rendered.contains("-0000000000000000-"));
        assert_eq!(TraceContext::from_traceparent(&rendered), Some(ctx));
    }

    #[test]
    fn test_malformed_traceparent_is_rejected() {
        for bad in [
            "",
            "00",
            "01-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01", // wrong version
            "00-too-short-01",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b716920333-01", // 15-char span
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01-extra",
            "00-zzf7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01", // not hex
        ] {
            assert_eq!(TraceContext::from_traceparent(bad), None, "{bad}");
        }
    }

    #[test]
    fn test_inject_extract_over_string_metadata() {
        let ctx = context();
        let mut metadata = HashMap::new();
        ctx.inject(&mut metadata);
        assert_eq!(TraceContext::extract(&metadata), Some(ctx));
    }

    #[test]
    fn test_extract_missing_key_is_none() {
        assert_eq!(TraceContext::extract(&HashMap::new()), None);
    }
}
