//! HTTP API Module
//!
//! Provides metrics and monitoring endpoints for the DNS Seed.

mod routes;
mod metrics;

pub use routes::{run_api_server, ApiState};
pub use metrics::Metrics;
