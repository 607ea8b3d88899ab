//! Observability module for the dispatcher service.

pub mod metrics;
