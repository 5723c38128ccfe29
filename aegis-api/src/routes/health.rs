//! Liveness endpoint. Always answers while the process can serve requests.

use aegis_core::{HealthStatus, Liveness};
use axum::{extract::State, routing::get, Json, Router};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Liveness> {
    Json(Liveness {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
