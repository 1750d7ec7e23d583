//! Prometheus metrics and structured logging for pmlag.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus metrics for the stream, triggers and order outcomes
//! - Text exposition for a scrape endpoint

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{encode_metrics, Metrics};
