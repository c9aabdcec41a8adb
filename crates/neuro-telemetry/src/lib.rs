//! Prometheus metrics and structured logging for neurostream.
//!
//! - Prometheus metrics for producer ticks, anomalies, outbound drops and
//!   client connection lifecycle
//! - Structured logging with tracing (JSON in production, pretty otherwise)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
