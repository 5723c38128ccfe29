//! Aegis API Server Entry Point

use aegis_api::{init_tracing, serve, ApiError, ApiResult};
use aegis_core::AegisConfig;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = AegisConfig::from_env()
        .map_err(|e| ApiError::internal_error(format!("Invalid configuration: {}", e)))?;
    init_tracing(&config.telemetry)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    let snapshot = serve(config, shutdown).await?;
    tracing::info!(
        ticks = snapshot.ticks,
        alerts = snapshot.alerts,
        "Aegis API stopped"
    );
    Ok(())
}
