//! HTTP server for the QA pipeline
//!
//! Exposes `POST /qa` plus health, readiness and Prometheus metrics
//! endpoints over the shared pipeline state.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::{init_metrics, metrics_handler};
pub use state::AppState;
