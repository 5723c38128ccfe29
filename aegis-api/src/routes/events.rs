//! Watchtower event feed
//!
//! `GET /events` hands out whatever the trend monitor has buffered, at most
//! [`MAX_EVENTS_PER_POLL`] per call. Clients are expected to poll.

use aegis_watchtower::WatchEvent;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub const MAX_EVENTS_PER_POLL: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<WatchEvent>,
}

pub async fn events(State(state): State<AppState>) -> Json<EventsResponse> {
    let events = state
        .events
        .as_ref()
        .map(|buffer| buffer.drain(MAX_EVENTS_PER_POLL))
        .unwrap_or_default();
    Json(EventsResponse { events })
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/events", get(events))
}
