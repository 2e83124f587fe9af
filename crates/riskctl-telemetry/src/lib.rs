//! Prometheus metrics and structured logging for riskctl.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus metrics for jobs, enforcement actions and broker errors
//! - `/metrics` endpoint served with axum

pub mod error;
pub mod logging;
pub mod metrics;
pub mod server;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use server::serve_metrics;
