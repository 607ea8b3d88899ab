//! Response envelopes the hosting layer forwards verbatim.

use serde::{Deserialize, Serialize};

use common::error::BeaconError;

/// Envelope for `/process` and `/process-error`.
///
/// Every worker envelope echoes the trace id the request arrived under so
/// callers can verify propagation end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub status: String,
    pub result: String,
    pub trace_id: String,
}

/// Envelope for `/process-slow`, which also reports the measured duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSlowResponse {
    pub status: String,
    pub result: String,
    pub duration_ms: u64,
    pub trace_id: String,
}

/// Envelope for `/health`. Never fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    #[must_use]
    pub fn up() -> Self {
        Self {
            status: "UP".to_string(),
        }
    }
}

/// Uniform error envelope the hosting layer returns for any handler error.
/// The dispatcher's worker client parses exactly this shape back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub status: String,
    pub message: String,
}

impl From<&BeaconError> for ErrorEnvelope {
    fn from(err: &BeaconError) -> Self {
        Self {
            status: "error".to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_response_serialization() {
        let response = ProcessResponse {
            status: "success".to_string(),
            result: "processed_in_231ms".to_string(),
            trace_id: "0af7651916cd43dd8448eb211c80319c".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"result\":\"processed_in_231ms\""));
        assert!(json.contains("\"trace_id\":\"0af7651916cd43dd8448eb211c80319c\""));
    }

    #[test]
    fn test_health_response_is_up() {
        let json = serde_json::to_string(&HealthResponse::up()).unwrap();
        assert_eq!(json, "{\"status\":\"UP\"}");
    }

    #[test]
    fn test_error_envelope_from_beacon_error() {
        let err = BeaconError::Application("Simulated worker error".to_string());
        let envelope = ErrorEnvelope::from(&err);
        assert_eq!(envelope.status, "error");
        assert_eq!(envelope.message, "Application error: Simulated worker error");
    }
}
