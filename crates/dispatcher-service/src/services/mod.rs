//! Service layer for the dispatcher.
//!
//! # Components
//!
//! - `worker_client` - client for dispatcher->worker delegation across the
//!   process boundary

pub mod worker_client;

// Worker client types exposed for external use
pub use worker_client::{HttpWorkerClient, WorkerClient};
// Mock worker client for testing (exposed for integration tests)
#[allow(unused_imports)]
pub use worker_client::mock::MockWorkerClient;
