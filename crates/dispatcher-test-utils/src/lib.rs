//! # Dispatcher test utilities
//!
//! Shared fixtures for exercising the dispatcher against a real worker
//! core in one process:
//! - [`InProcessWorkerClient`]: a boundary whose only conduit is
//!   serialized string metadata, for propagation round-trip tests
//! - [`TestDispatcher`]: a wired dispatcher + worker pair with
//!   deterministic samplers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dispatcher_test_utils::TestDispatcher;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let fixture = TestDispatcher::new();
//!     let mut req = common::telemetry::RequestContext::new();
//!     let response = dispatcher_service::handlers::external_call(&fixture.dispatcher, &mut req)
//!         .await
//!         .unwrap();
//!     assert_eq!(response.request_id.len(), 8);
//! }
//! ```

pub mod harness;
pub mod in_process;

// Re-export commonly used items
pub use harness::TestDispatcher;
pub use in_process::InProcessWorkerClient;
