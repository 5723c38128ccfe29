//! Aegis Dispatch - the action pipeline
//!
//! A request moves through three typed stages:
//!
//! 1. **Classify**: ask the inference backend for an [`ActionResult`].
//! 2. **Execute**: for `QUERY`, run the payload against the metrics backend.
//! 3. **Explain**: if execution succeeded, ask for a follow-up explanation
//!    and let an `EXPLAIN` answer supersede the raw query.
//!
//! Only a classification failure aborts the pipeline. Execution and
//! explanation failures are reported in the [`DispatchOutcome`] and the
//! caller gets the unexecuted classification.

use aegis_core::{
    with_deadline, AegisError, AegisResult, ActionKind, ActionRequest, ActionResult, MetricValue,
};
use aegis_llm::InferenceBackend;
use aegis_metrics::MetricsBackend;
use std::sync::Arc;
use std::time::Duration;

pub mod audit;

pub use audit::{format_entry, AuditLog};

/// Context attached to the follow-up explanation request.
pub const EVALUATION_CONTEXT: &str = "Evaluation Phase";

/// Dispatcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Deadline for each external call.
    pub call_timeout: Duration,
    /// When false (dry run), QUERY payloads are never executed.
    pub execute_queries: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            execute_queries: true,
        }
    }
}

/// What happened to the classified action's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// The action was not a QUERY.
    NotRequired,
    /// QUERY execution is switched off (dry run or no metrics backend).
    Disabled { query: String },
    Executed { query: String, value: MetricValue },
    Failed { query: String, error: AegisError },
}

impl Execution {
    pub fn error(&self) -> Option<&AegisError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Every stage's result for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// First-stage classification.
    pub classified: ActionResult,
    pub execution: Execution,
    /// Set when the follow-up explanation call failed.
    pub explanation_error: Option<AegisError>,
    /// What the caller should present.
    pub result: ActionResult,
}

impl DispatchOutcome {
    /// Whether the follow-up explanation replaced the classification.
    pub fn was_explained(&self) -> bool {
        self.result != self.classified
    }
}

/// Build the follow-up request that asks for an explanation of `value`.
pub fn follow_up_request(original: &ActionRequest, query: &str, value: &MetricValue) -> ActionRequest {
    let mut history = original.history.clone();
    history.push(format!("Action: QUERY, Payload: {}", query));
    ActionRequest {
        user_prompt: format!(
            "The query result was: {}. Explain this briefly to the user who asked: {}",
            value, original.user_prompt
        ),
        context: EVALUATION_CONTEXT.to_string(),
        history,
    }
}

/// Orchestrates classification, execution and explanation.
///
/// Holds no per-request state; concurrent calls are independent.
#[derive(Clone)]
pub struct Dispatcher {
    inference: Arc<dyn InferenceBackend>,
    metrics: Option<Arc<dyn MetricsBackend>>,
    audit: Option<Arc<AuditLog>>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(inference: Arc<dyn InferenceBackend>, config: DispatcherConfig) -> Self {
        Self {
            inference,
            metrics: None,
            audit: None,
            config,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsBackend>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> DispatcherConfig {
        self.config
    }

    /// Run the pipeline and return the result to present.
    pub async fn handle(&self, request: &ActionRequest) -> AegisResult<ActionResult> {
        self.dispatch(request).await.map(|outcome| outcome.result)
    }

    /// Run the pipeline and report every stage.
    #[tracing::instrument(skip(self, request), fields(backend = self.inference.name()))]
    pub async fn dispatch(&self, request: &ActionRequest) -> AegisResult<DispatchOutcome> {
        let classified = self.classify(request).await?;
        let execution = self.execute(&classified).await;

        let (result, explanation_error) = match &execution {
            Execution::Executed { query, value } => self.explain(request, &classified, query, value).await,
            _ => (classified.clone(), None),
        };

        if !result.kind.is_known() {
            tracing::warn!(kind = %result.kind, "Backend returned an unknown action");
        }

        Ok(DispatchOutcome {
            classified,
            execution,
            explanation_error,
            result,
        })
    }

    async fn classify(&self, request: &ActionRequest) -> AegisResult<ActionResult> {
        let classified = with_deadline(
            "inference classify",
            self.config.call_timeout,
            self.inference.classify(request),
        )
        .await?;

        tracing::info!(
            kind = %classified.kind,
            confidence = classified.confidence,
            "Request classified"
        );
        if let Some(audit) = &self.audit {
            let audit = Arc::clone(audit);
            let entry = classified.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || audit.record(&entry)).await {
                tracing::warn!(error = %e, "Audit log task failed");
            }
        }
        Ok(classified)
    }

    async fn execute(&self, classified: &ActionResult) -> Execution {
        if classified.kind != ActionKind::Query {
            return Execution::NotRequired;
        }
        let query = classified.payload.clone();

        let metrics = match &self.metrics {
            Some(metrics) if self.config.execute_queries => metrics,
            _ => return Execution::Disabled { query },
        };

        let result = with_deadline(
            "metrics query",
            self.config.call_timeout,
            metrics.query(&query, chrono::Utc::now()),
        )
        .await;

        match result {
            Ok(value) => Execution::Executed { query, value },
            Err(error) => {
                tracing::warn!(query = %query, error = %error, "Query execution failed");
                Execution::Failed { query, error }
            }
        }
    }

    async fn explain(
        &self,
        request: &ActionRequest,
        classified: &ActionResult,
        query: &str,
        value: &MetricValue,
    ) -> (ActionResult, Option<AegisError>) {
        let follow_up = follow_up_request(request, query, value);
        let explained = with_deadline(
            "inference explain",
            self.config.call_timeout,
            self.inference.classify(&follow_up),
        )
        .await;

        match explained {
            Ok(r2) if r2.kind == ActionKind::Explain => (r2, None),
            Ok(r2) => {
                tracing::debug!(kind = %r2.kind, "Follow-up was not an explanation, keeping query");
                (classified.clone(), None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Follow-up explanation failed");
                (classified.clone(), Some(e))
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("inference", &self.inference.name())
            .field("metrics", &self.metrics.is_some())
            .field("audit", &self.audit.as_ref().map(|a| a.path().to_path_buf()))
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::{LabeledSample, TimeSeriesPoint};

    #[test]
    fn test_follow_up_request_shape() {
        let original = ActionRequest::new("how busy is the api?")
            .with_context("Web Console")
            .with_history(vec!["earlier".to_string()]);
        let value = MetricValue::Vector(vec![LabeledSample {
            labels: [("job".to_string(), "api".to_string())].into_iter().collect(),
            point: TimeSeriesPoint::new(100.0, 42.0),
        }]);

        let follow_up = follow_up_request(&original, "sum(rate(http_requests_total[1m]))", &value);
        assert_eq!(
            follow_up.user_prompt,
            "The query result was: {job=\"api\"} => 42 @[100.000]. Explain this briefly to the user who asked: how busy is the api?"
        );
        assert_eq!(follow_up.context, EVALUATION_CONTEXT);
        assert_eq!(
            follow_up.history,
            vec![
                "earlier".to_string(),
                "Action: QUERY, Payload: sum(rate(http_requests_total[1m]))".to_string()
            ]
        );
    }

    #[test]
    fn test_execution_error_accessor() {
        let failed = Execution::Failed {
            query: "up".to_string(),
            error: AegisError::Timeout {
                operation: "metrics query".to_string(),
                after_ms: 10,
            },
        };
        assert!(failed.error().unwrap().is_timeout());
        assert!(Execution::NotRequired.error().is_none());
    }
}
