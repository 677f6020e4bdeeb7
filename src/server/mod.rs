//! HTTP server.
//!
//! This module provides:
//! - REST API using axum (`/health`, `/embeddings`, `/metrics`)
//! - Request tracing and Prometheus metrics
//! - Graceful shutdown

mod app;
mod error;
pub mod metrics;
pub mod observability;
mod rest;

pub use app::{App, ServerConfig};
pub use metrics::init_metrics;
pub use observability::init_tracing;
pub use rest::create_rest_router;
