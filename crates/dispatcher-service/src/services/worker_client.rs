//! Cross-boundary worker invocation.
//!
//! One outbound call per operation, carrying the current trace identity
//! in-band as a `traceparent` header. Failures stay distinguishable:
//! [`BeaconError::Transport`] when the call could not complete,
//! [`BeaconError::Remote`] when the worker reported an application-level
//! failure. There are no automatic retries: a retry would graft a second
//! call onto the trace and the topology would stop being truthful.

use async_trait::async_trait;
use serde::Deserialize;

use common::error::{BeaconError, Result};
use common::telemetry::propagation::{TraceContext, TRACEPARENT_KEY};

use crate::config::Config;

/// Client for dispatcher->worker delegation.
///
/// Implementations carry `ctx` to the worker in request metadata and
/// return the worker's result string.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Invoke the worker's standard processing endpoint.
    async fn process(&self, ctx: &TraceContext) -> Result<String>;

    /// Invoke the worker's heavy processing endpoint.
    async fn process_slow(&self, ctx: &TraceContext) -> Result<String>;

    /// Invoke the worker's flaky endpoint.
    async fn process_error(&self, ctx: &TraceContext) -> Result<String>;
}

/// Worker success envelope, as far as the dispatcher cares about it.
#[derive(Debug, Deserialize)]
struct WorkerReply {
    result: String,
}

/// Worker error envelope.
#[derive(Debug, Deserialize)]
struct WorkerErrorReply {
    message: String,
}

/// Production worker client over HTTP.
pub struct HttpWorkerClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWorkerClient {
    /// Build the client against the configured worker address.
    ///
    /// # Errors
    ///
    /// `Configuration` when the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BeaconError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.worker_url.clone(),
        })
    }

    async fn call(&self, path: &str, ctx: &TraceContext) -> Result<String> {
        let url = format!("{}{path}", self.base_url);
        tracing::info!(%url, trace_id = %ctx.trace_id, "Calling worker service");

        let response = self
            .client
            .get(&url)
            .header(TRACEPARENT_KEY, ctx.to_traceparent())
            .send()
            .await
            .map_err(|e| BeaconError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let reply: WorkerReply = response
                .json()
                .await
                .map_err(|e| BeaconError::Transport(e.to_string()))?;
            return Ok(reply.result);
        }

        // Non-2xx means the worker ran and reported failure; keep its
        // message when the envelope parses, fall back to the status line.
        let message = response
            .json::<WorkerErrorReply>()
            .await
            .map_or_else(|_| format!("worker returned {status}"), |e| e.message);
        Err(BeaconError::Remote(message))
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn process(&self, ctx: &TraceContext) -> Result<String> {
        self.call("/process", ctx).await
    }

    async fn process_slow(&self, ctx: &TraceContext) -> Result<String> {
        self.call("/process-slow", ctx).await
    }

    async fn process_error(&self, ctx: &TraceContext) -> Result<String> {
        self.call("/process-error", ctx).await
    }
}

/// Scripted worker client for tests.
pub mod mock {
    use std::sync::Mutex;

    use super::{async_trait, BeaconError, Result, TraceContext, WorkerClient};

    /// What the mock does on every call.
    #[derive(Debug, Clone, Copy)]
    enum Script {
        Succeed,
        FailRemote,
        FailTransport,
    }

    /// Deterministic [`WorkerClient`] that records every carried trace
    /// context for assertions.
    pub struct MockWorkerClient {
        script: Script,
        seen: Mutex<Vec<TraceContext>>,
    }

    impl MockWorkerClient {
        /// Mock that answers every call with a canned result.
        #[must_use]
        pub fn succeeding() -> Self {
            Self::new(Script::Succeed)
        }

        /// Mock whose worker always reports an application failure.
        #[must_use]
        pub fn failing_remote() -> Self {
            Self::new(Script::FailRemote)
        }

        /// Mock whose calls never complete.
        #[must_use]
        pub fn failing_transport() -> Self {
            Self::new(Script::FailTransport)
        }

        fn new(script: Script) -> Self {
            Self {
                script,
                seen: Mutex::new(Vec::new()),
            }
        }

        /// Trace contexts carried on each call, in call order.
        #[must_use]
        pub fn carried(&self) -> Vec<TraceContext> {
            self.seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }

        fn answer(&self, ctx: &TraceContext, result: &str) -> Result<String> {
            self.seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(*ctx);
            match self.script {
                Script::Succeed => Ok(result.to_string()),
                Script::FailRemote => Err(BeaconError::Remote(
                    "Simulated worker error".to_string(),
                )),
                Script::FailTransport => Err(BeaconError::Transport(
                    "connection refused".to_string(),
                )),
            }
        }
    }

    #[async_trait]
    impl WorkerClient for MockWorkerClient {
        async fn process(&self, ctx: &TraceContext) -> Result<String> {
            self.answer(ctx, "processed_in_231ms")
        }

        async fn process_slow(&self, ctx: &TraceContext) -> Result<String> {
            self.answer(ctx, "slow_processed_in_4716ms")
        }

        async fn process_error(&self, ctx: &TraceContext) -> Result<String> {
            self.answer(ctx, "success_in_142ms")
        }
    }
}
