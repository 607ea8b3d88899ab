//! Response envelopes the hosting layer forwards verbatim.

use serde::{Deserialize, Serialize};

use common::error::BeaconError;

/// Envelope for the local simulated endpoints (`/fast`, `/slow`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointResponse {
    pub status: String,
    pub endpoint: String,
    /// Simulated processing latency actually spent, in milliseconds.
    pub latency_ms: u64,
}

/// Envelope for `/external-call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateResponse {
    pub status: String,
    pub endpoint: String,
    /// 8-character request token, also installed in the correlation scope.
    pub request_id: String,
    pub worker_response: String,
    /// Measured round-trip time of the worker call, in milliseconds.
    pub duration_ms: u64,
}

/// Envelope for `/external-call-slow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateSlowResponse {
    pub status: String,
    pub endpoint: String,
    pub worker_response: String,
}

/// Envelope for `POST /load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub status: String,
    pub total: u32,
    pub fast: u32,
    pub slow: u32,
    pub errors: u32,
    pub external: u32,
}

impl LoadReport {
    #[must_use]
    pub fn completed(total: u32, fast: u32, slow: u32, errors: u32, external: u32) -> Self {
        Self {
            status: "completed".to_string(),
            total,
            fast,
            slow,
            errors,
            external,
        }
    }
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
