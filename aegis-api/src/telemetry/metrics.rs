//! Prometheus Metrics Definitions
//!
//! Registered once in the default registry and exposed at `/metrics`.

use aegis_core::ActionKind;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_counter_vec,
    CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

use crate::state::AppState;

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance, initialized on first use.
pub static METRICS: Lazy<Result<AegisMetrics, prometheus::Error>> = Lazy::new(AegisMetrics::new);

/// Metrics handle, or `None` if registration failed.
pub fn metrics() -> Option<&'static AegisMetrics> {
    METRICS.as_ref().ok()
}

#[derive(Clone)]
pub struct AegisMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Final actions returned to callers - labels: kind
    pub actions_total: IntCounterVec,

    /// Requests denied by the quota gate
    pub quota_denials_total: IntCounter,

    /// Trend alerts raised by the watchtower
    pub trend_alerts_total: IntCounter,
}

impl AegisMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "aegis_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )?,
            http_request_duration_seconds: register_histogram_vec!(
                "aegis_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )?,
            actions_total: register_int_counter_vec!(
                "aegis_actions_total",
                "Actions returned to callers, by kind",
                &["kind"]
            )?,
            quota_denials_total: register_int_counter!(
                "aegis_quota_denials_total",
                "Requests denied because the daily quota was used up"
            )?,
            trend_alerts_total: register_int_counter!(
                "aegis_trend_alerts_total",
                "Rising-trend alerts raised by the watchtower"
            )?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_action(&self, kind: &ActionKind) {
        self.actions_total
            .with_label_values(&[kind.metric_label()])
            .inc();
    }

    pub fn record_quota_denial(&self) {
        self.quota_denials_total.inc();
    }

    /// Bring the alert counter up to the monitor's running total.
    pub fn sync_trend_alerts(&self, total: u64) {
        let current = self.trend_alerts_total.get();
        if total > current {
            self.trend_alerts_total.inc_by(total - current);
        }
    }
}

/// Handler for GET /metrics.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    if let (Some(metrics), Some(monitor)) = (metrics(), state.monitor.as_ref()) {
        metrics.sync_trend_alerts(monitor.snapshot().alerts);
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_action_collapses_unknown_kinds() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e))?;
        let before = metrics.actions_total.with_label_values(&["UNKNOWN"]).get();
        metrics.record_action(&ActionKind::parse("PANIC"));
        metrics.record_action(&ActionKind::parse(""));
        let after = metrics.actions_total.with_label_values(&["UNKNOWN"]).get();
        assert!(after >= before + 2);
        Ok(())
    }

    #[test]
    fn test_sync_trend_alerts_never_goes_backwards() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e))?;
        let base = metrics.trend_alerts_total.get();
        metrics.sync_trend_alerts(base + 3);
        assert_eq!(metrics.trend_alerts_total.get(), base + 3);
        metrics.sync_trend_alerts(base + 1);
        assert_eq!(metrics.trend_alerts_total.get(), base + 3);
        Ok(())
    }
}
