//! Prometheus metrics and structured logging for tickwatch.
//!
//! - Prometheus metrics for stream health, tick flow and fired alerts
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
