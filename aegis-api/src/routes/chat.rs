//! Chat endpoint
//!
//! `POST /chat` runs one prompt through the quota gate, optional incident
//! retrieval and the dispatcher, and answers with the final action.

use std::sync::Arc;

use aegis_billing::QuotaGate;
use aegis_core::{ActionRequest, ActionResult};
use aegis_memory::{enrich_request, DEFAULT_MEMORY_K};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics::metrics;

/// Run quota file I/O on the blocking pool.
async fn with_quota<T, F>(quota: &Arc<QuotaGate>, op: F) -> ApiResult<T>
where
    F: FnOnce(&QuotaGate) -> T + Send + 'static,
    T: Send + 'static,
{
    let quota = Arc::clone(quota);
    tokio::task::spawn_blocking(move || op(&quota))
        .await
        .map_err(|e| ApiError::internal_error(format!("Quota task failed: {}", e)))
}

/// Handle a chat request.
#[tracing::instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> ApiResult<Json<ActionResult>> {
    let Json(request) = body.map_err(|e| ApiError::invalid_input(e.body_text()))?;
    if request.user_prompt.trim().is_empty() {
        return Err(ApiError::invalid_input("UserPrompt must not be empty"));
    }

    let admitted = match with_quota(&state.quota, |q| q.try_admit()).await?? {
        Ok(admitted) => admitted,
        Err(denied) => {
            tracing::info!(error = %denied, "Chat request denied by quota");
            if let Some(m) = metrics() {
                m.record_quota_denial();
            }
            return Err(denied.into());
        }
    };

    let request = match &state.embedder {
        Some(embedder) => {
            enrich_request(&state.memory, embedder.as_ref(), request, DEFAULT_MEMORY_K).await
        }
        None => request,
    };

    let outcome = match state
        .dispatchers
        .for_tier(admitted.tier)
        .dispatch(&request)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // Failed requests are not counted against the quota.
            if let Err(refund) = with_quota(&state.quota, |q| q.refund()).await? {
                tracing::warn!(error = %refund, "Failed to refund quota slot");
            }
            return Err(e.into());
        }
    };

    if let Some(error) = outcome.execution.error() {
        tracing::warn!(error = %error, "Answering with unexecuted query");
    }
    if let Some(m) = metrics() {
        m.record_action(&outcome.result.kind);
    }

    Ok(Json(outcome.result))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}
