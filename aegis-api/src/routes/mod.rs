//! REST API Routes Module
//!
//! - `POST /chat` - run a prompt through the dispatcher
//! - `GET /metrics/snapshot` - dashboard gauges
//! - `GET /health` - liveness
//! - `GET /events` - buffered watchtower events
//! - `GET /metrics` - Prometheus exposition
//!
//! `/api/chat`, `/api/metrics` and `/api/events` are kept as aliases for
//! older dashboards.

pub mod chat;
pub mod events;
pub mod health;
pub mod snapshot;

use std::time::Duration;

use aegis_core::ApiConfig;
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use chat::create_router as chat_router;
pub use events::create_router as events_router;
pub use health::create_router as health_router;
pub use snapshot::create_router as snapshot_router;

/// Build CORS layer from configuration.
///
/// An empty origin list allows any origin.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!("CORS: allowing origins: {:?}", config.cors_origins);
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Create the complete service router.
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    Router::new()
        .merge(chat_router())
        .merge(snapshot_router())
        .merge(health_router())
        .merge(events_router())
        .route("/metrics", get(metrics_handler))
        .route("/api/chat", post(chat::chat))
        .route("/api/metrics", get(snapshot::snapshot))
        .route("/api/events", get(events::events))
        .layer(from_fn(observability_middleware))
        .layer(build_cors_layer(config))
        .with_state(state)
}

