//! Aegis Telemetry
//!
//! Structured logging setup and Prometheus metrics for the service.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, AegisMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::init_tracing;
