//! Dashboard gauges at `GET /metrics/snapshot`.

use aegis_core::with_deadline;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{Map, Value};

use crate::state::AppState;

/// Gauge name and the instant query that produces it.
pub const SNAPSHOT_QUERIES: &[(&str, &str)] = &[
    (
        "cpu",
        r#"100 - (avg(rate(node_cpu_seconds_total{mode="idle"}[5m])) * 100)"#,
    ),
    (
        "memory",
        "(1 - (node_memory_MemAvailable_bytes / node_memory_MemTotal_bytes)) * 100",
    ),
    (
        "disk",
        r#"(1 - (node_filesystem_avail_bytes{mountpoint="/"} / node_filesystem_size_bytes{mountpoint="/"})) * 100"#,
    ),
    ("rps", "sum(rate(http_requests_total[1m]))"),
    (
        "latency",
        "sum(rate(http_request_duration_seconds_sum[1m])) / sum(rate(http_request_duration_seconds_count[1m]))",
    ),
];

/// Query each gauge and report the ones that produced a finite number.
pub async fn snapshot(State(state): State<AppState>) -> Json<Value> {
    let now = chrono::Utc::now();
    let mut body = Map::new();
    body.insert("timestamp".to_string(), Value::from(now.timestamp()));

    let Some(backend) = state.metrics_backend.as_ref() else {
        return Json(Value::Object(body));
    };

    for &(name, expr) in SNAPSHOT_QUERIES {
        let result = with_deadline("snapshot query", state.call_timeout, backend.query(expr, now)).await;
        match result {
            Ok(value) => match value.first_value().filter(|v| v.is_finite()) {
                Some(v) => {
                    body.insert(name.to_string(), Value::from(v));
                }
                None => tracing::debug!(gauge = name, "Snapshot query returned no value"),
            },
            Err(e) => tracing::warn!(gauge = name, error = %e, "Snapshot query failed"),
        }
    }

    Json(Value::Object(body))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/metrics/snapshot", get(snapshot))
}
