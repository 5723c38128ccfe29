//! Aegis API - HTTP service for the SRE copilot
//!
//! Serves the chat endpoint, dashboard gauges, the watchtower event feed,
//! liveness and Prometheus metrics. [`serve`] also runs the trend monitor
//! for the lifetime of the server.

pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_router;
pub use server::{build, serve};
pub use state::{AppState, EventBuffer, TierDispatchers};
pub use telemetry::init_tracing;
