//! Command implementations.

use std::sync::Arc;

use aegis_billing::QuotaGate;
use aegis_core::{AegisConfig, ActionKind, ActionRequest, HealthStatus};
use aegis_dispatch::{AuditLog, DispatchOutcome, Dispatcher, DispatcherConfig, Execution};
use aegis_llm::{embedding_from_config, inference_for_tier, EmbeddingProvider};
use aegis_memory::{enrich_request, IncidentStore, DEFAULT_MEMORY_K};
use aegis_metrics::{check_connectivity, MetricsBackend, PrometheusClient};

use crate::error::{CliError, CliResult};

/// Context tag attached to prompts asked from the terminal.
pub const CLI_CONTEXT: &str = "CLI";

fn prometheus(config: &AegisConfig) -> CliResult<Arc<dyn MetricsBackend>> {
    Ok(Arc::new(PrometheusClient::new(
        &config.metrics.prometheus_url,
        config.deadline.call_timeout,
    )?))
}

/// `aegis ask`: admit, dispatch, print.
pub async fn ask(config: AegisConfig, question: String, dry_run: bool) -> CliResult<()> {
    let quota = QuotaGate::new(config.data.quota_path(), config.quota);
    // Early denial before any backend is built; `run_ask` admits atomically.
    let state = quota.load_state()?;
    quota.check(&state)?;

    let call_timeout = config.deadline.call_timeout;
    let inference = inference_for_tier(&config.llm, state.tier, call_timeout)?;
    let dispatcher = Dispatcher::new(
        inference,
        DispatcherConfig {
            call_timeout,
            execute_queries: !dry_run,
        },
    )
    .with_metrics(prometheus(&config)?)
    .with_audit(Arc::new(AuditLog::new(config.data.audit_log_path())));

    let memory = IncidentStore::load(&config.data.incidents_path())?;
    let embedder = embedding_from_config(&config.llm, call_timeout)?;

    let request = ActionRequest::new(question).with_context(CLI_CONTEXT);
    let outcome = run_ask(&dispatcher, &quota, &memory, embedder.as_deref(), request).await?;
    for line in render_outcome(&outcome) {
        println!("{}", line);
    }
    Ok(())
}

/// Take a quota slot, then dispatch. The slot is given back if dispatch
/// fails.
pub async fn run_ask(
    dispatcher: &Dispatcher,
    quota: &QuotaGate,
    memory: &IncidentStore,
    embedder: Option<&dyn EmbeddingProvider>,
    request: ActionRequest,
) -> CliResult<DispatchOutcome> {
    quota.try_admit()??;

    let request = match embedder {
        Some(embedder) => enrich_request(memory, embedder, request, DEFAULT_MEMORY_K).await,
        None => request,
    };

    match dispatcher.dispatch(&request).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            if let Err(refund) = quota.refund() {
                tracing::warn!(error = %refund, "Failed to refund quota slot");
            }
            Err(e.into())
        }
    }
}

/// Terminal lines describing every stage of `outcome`.
pub fn render_outcome(outcome: &DispatchOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "Action: {} (confidence {:.2})",
        outcome.classified.kind, outcome.classified.confidence
    )];

    match &outcome.execution {
        Execution::NotRequired => {}
        Execution::Disabled { query } => lines.push(format!("Query not executed: {}", query)),
        Execution::Executed { value, .. } => lines.push(format!("Result: {}", value)),
        Execution::Failed { error, .. } => lines.push(format!("Query failed: {}", error)),
    }
    if let Some(error) = &outcome.explanation_error {
        lines.push(format!("Explanation unavailable: {}", error));
    }

    let result = &outcome.result;
    lines.push(match &result.kind {
        ActionKind::Query => format!("Query: {}", result.payload),
        ActionKind::Explain => format!("Explanation: {}", result.payload),
        ActionKind::Fix => format!("Suggested fix: {}", result.payload),
        ActionKind::Unknown(kind) => format!("Unknown action: {}", kind),
    });
    lines
}

/// `aegis check`: query `up` against the metrics backend.
pub async fn check(config: AegisConfig) -> CliResult<()> {
    let backend = prometheus(&config)?;
    let health = check_connectivity(backend.as_ref()).await;
    match health.status {
        HealthStatus::Healthy => {
            println!(
                "Connected to {} ({}ms)",
                config.metrics.prometheus_url,
                health.response_time_ms.unwrap_or_default()
            );
            Ok(())
        }
        _ => Err(CliError::Unreachable(
            health.message.unwrap_or_else(|| config.metrics.prometheus_url.clone()),
        )),
    }
}

/// `aegis watch`: serve until Ctrl-C.
pub async fn watch(config: AegisConfig) -> CliResult<()> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };
    let snapshot = aegis_api::serve(config, shutdown).await?;
    println!(
        "Watch stopped after {} ticks ({} skipped), {} alerts",
        snapshot.ticks, snapshot.ticks_skipped, snapshot.alerts
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_billing::today;
    use aegis_core::{ActionResult, AegisError, MetricValue, QuotaPolicy, Tier, TimeSeriesPoint};
    use aegis_llm::MockInferenceBackend;
    use aegis_metrics::MockMetricsBackend;
    use aegis_test_utils::fixtures::quota_state;

    fn outcome(classified: ActionResult, execution: Execution, result: ActionResult) -> DispatchOutcome {
        DispatchOutcome {
            classified,
            execution,
            explanation_error: None,
            result,
        }
    }

    #[test]
    fn test_render_executed_query() {
        let out = outcome(
            ActionResult::query("up", 0.9),
            Execution::Executed {
                query: "up".to_string(),
                value: MetricValue::Scalar(TimeSeriesPoint::new(100.0, 1.0)),
            },
            ActionResult::explain("All targets are up.", 0.8),
        );
        let lines = render_outcome(&out);
        assert_eq!(lines[0], "Action: QUERY (confidence 0.90)");
        assert!(lines[1].starts_with("Result: "));
        assert_eq!(lines[2], "Explanation: All targets are up.");
    }

    #[test]
    fn test_render_failed_query_keeps_classification() {
        let out = outcome(
            ActionResult::query("up", 0.9),
            Execution::Failed {
                query: "up".to_string(),
                error: AegisError::Timeout {
                    operation: "metrics query".to_string(),
                    after_ms: 30000,
                },
            },
            ActionResult::query("up", 0.9),
        );
        let lines = render_outcome(&out);
        assert_eq!(lines[1], "Query failed: metrics query timed out after 30000ms");
        assert_eq!(lines[2], "Query: up");
    }

    #[test]
    fn test_render_unknown_action() {
        let unknown = ActionResult::new(ActionKind::parse("PANIC"), "", 0.1);
        let lines = render_outcome(&outcome(unknown.clone(), Execution::NotRequired, unknown));
        assert_eq!(lines.last().map(String::as_str), Some("Unknown action: PANIC"));
    }

    #[test]
    fn test_render_dry_run() {
        let query = ActionResult::query("rate(errors[5m])", 0.7);
        let lines = render_outcome(&outcome(
            query.clone(),
            Execution::Disabled {
                query: "rate(errors[5m])".to_string(),
            },
            query,
        ));
        assert_eq!(lines[1], "Query not executed: rate(errors[5m])");
    }

    #[tokio::test]
    async fn test_run_ask_counts_admitted_query() {
        let dir = tempfile::tempdir().unwrap();
        let quota = QuotaGate::new(dir.path().join("quota.json"), QuotaPolicy::default());
        quota.save(&quota_state(Tier::Free, 4, today())).unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(MockInferenceBackend::new().then_return(ActionResult::fix("restart", 0.9))),
            DispatcherConfig::default(),
        )
        .with_metrics(Arc::new(MockMetricsBackend::new()));

        let outcome = run_ask(
            &dispatcher,
            &quota,
            &IncidentStore::default(),
            None,
            ActionRequest::new("nginx is down"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.result.kind, ActionKind::Fix);
        assert_eq!(quota.load_state().unwrap().query_count, 5);
    }

    #[tokio::test]
    async fn test_run_ask_refunds_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let quota = QuotaGate::new(dir.path().join("quota.json"), QuotaPolicy::default());
        let dispatcher = Dispatcher::new(
            Arc::new(MockInferenceBackend::new()),
            DispatcherConfig::default(),
        );

        let result = run_ask(
            &dispatcher,
            &quota,
            &IncidentStore::default(),
            None,
            ActionRequest::new("anything"),
        )
        .await;

        assert!(matches!(result, Err(CliError::Aegis(_))));
        assert_eq!(quota.load_state().unwrap().query_count, 0);
    }

    #[tokio::test]
    async fn test_run_ask_denies_exhausted_account() {
        let dir = tempfile::tempdir().unwrap();
        let quota = QuotaGate::new(dir.path().join("quota.json"), QuotaPolicy::default());
        quota.save(&quota_state(Tier::Free, 10, today())).unwrap();
        let inference = Arc::new(MockInferenceBackend::new().then_return(ActionResult::fix("restart", 0.9)));
        let dispatcher = Dispatcher::new(inference.clone(), DispatcherConfig::default());

        let result = run_ask(
            &dispatcher,
            &quota,
            &IncidentStore::default(),
            None,
            ActionRequest::new("nginx is down"),
        )
        .await;

        assert!(matches!(result, Err(CliError::QuotaExceeded(_))));
        assert_eq!(inference.call_count(), 0);
        assert_eq!(quota.load_state().unwrap().query_count, 10);
    }
}
