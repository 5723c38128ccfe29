//! Service bootstrap: wire the backends, start the trend monitor and serve
//! HTTP until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;

use aegis_billing::QuotaGate;
use aegis_core::AegisConfig;
use aegis_dispatch::AuditLog;
use aegis_llm::embedding_from_config;
use aegis_memory::IncidentStore;
use aegis_metrics::{MetricsBackend, PrometheusClient};
use aegis_watchtower::{event_channel, MonitorSnapshot, TrendMonitor};
use tokio::sync::watch;

use crate::error::{ApiError, ApiResult};
use crate::routes::create_router;
use crate::state::{AppState, TierDispatchers};

/// Build application state from configuration. Returns the state together
/// with the trend monitor that feeds its event buffer.
pub fn build(config: &AegisConfig) -> ApiResult<(AppState, TrendMonitor)> {
    let call_timeout = config.deadline.call_timeout;
    let metrics: Arc<dyn MetricsBackend> = Arc::new(PrometheusClient::new(
        &config.metrics.prometheus_url,
        call_timeout,
    )?);
    let audit = Arc::new(AuditLog::new(config.data.audit_log_path()));
    let dispatchers =
        TierDispatchers::from_config(config, Some(Arc::clone(&metrics)), Some(audit))?;
    let quota = QuotaGate::new(config.data.quota_path(), config.quota);
    let memory = IncidentStore::load(&config.data.incidents_path())?;
    let embedder = embedding_from_config(&config.llm, call_timeout)?;
    if embedder.is_none() && !memory.is_empty() {
        tracing::info!("No embedding model configured, incident retrieval disabled");
    }

    let (events_tx, events_rx) = event_channel(config.watchtower.event_buffer);
    let monitor = TrendMonitor::new(Arc::clone(&metrics), config.watchtower.clone(), events_tx)
        .with_call_timeout(call_timeout);

    let state = AppState::new(dispatchers, quota)
        .with_metrics_backend(metrics)
        .with_memory(memory, embedder)
        .with_events(events_rx)
        .with_monitor(monitor.metrics())
        .with_call_timeout(call_timeout);

    Ok((state, monitor))
}

/// Serve HTTP and run the trend monitor until `shutdown` resolves.
///
/// Returns the monitor's final counters.
pub async fn serve<F>(config: AegisConfig, shutdown: F) -> ApiResult<MonitorSnapshot>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (state, monitor) = build(&config)?;
    let app = create_router(state, &config.api);

    let (stop_tx, stop_rx) = watch::channel(false);
    let monitor_handle = tokio::spawn(monitor.run(stop_rx));

    let addr = config.api.bind;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "Starting Aegis API server");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
        })
        .await;

    // The monitor stops either way; report the server error after it has.
    let _ = stop_tx.send(true);
    let snapshot = monitor_handle
        .await
        .map_err(|e| ApiError::internal_error(format!("Trend monitor task failed: {}", e)))?;

    served.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
    Ok(snapshot)
}
