//! Action dispatch protocol types.
//!
//! A front end builds an [`ActionRequest`]; the inference backend answers
//! with an [`ActionResult`] whose [`ActionKind`] decides what happens next.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ACTION KIND
// ============================================================================

/// Classified intent of a user request.
///
/// Unrecognised values are kept verbatim in [`ActionKind::Unknown`] so the
/// caller can report exactly what the backend produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    /// Payload is a metrics query to execute.
    Query,
    /// Payload is prose explaining a result or concept.
    Explain,
    /// Payload is a remediation command.
    Fix,
    /// Anything else, including the empty string.
    Unknown(String),
}

impl ActionKind {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Query => "QUERY",
            Self::Explain => "EXPLAIN",
            Self::Fix => "FIX",
            Self::Unknown(raw) => raw,
        }
    }

    /// Parse the wire representation. Matching is exact.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "QUERY" => Self::Query,
            "EXPLAIN" => Self::Explain,
            "FIX" => Self::Fix,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether this is one of the three actionable kinds.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Low-cardinality label for metrics (unknown values collapse to one label).
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::Explain => "EXPLAIN",
            Self::Fix => "FIX",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// REQUEST / RESULT
// ============================================================================

/// A natural-language request from a front end.
///
/// Serialized with the same keys the web console sends (`UserPrompt`,
/// `Context`, `History`); camelCase and snake_case spellings are accepted
/// on input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionRequest {
    #[serde(alias = "userPrompt", alias = "user_prompt")]
    pub user_prompt: String,
    #[serde(default, alias = "context")]
    pub context: String,
    #[serde(default, alias = "history")]
    pub history: Vec<String>,
}

impl ActionRequest {
    /// Create a request with empty context and history.
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            context: String::new(),
            history: Vec::new(),
        }
    }

    /// Set the free-text context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the conversation history.
    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }
}

/// Typed answer from the inference backend.
///
/// `confidence` is advisory: nothing branches on it, but it must survive
/// serialization unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(rename = "action")]
    pub kind: ActionKind,
    pub payload: String,
    #[serde(default)]
    pub confidence: f64,
}

impl ActionResult {
    pub fn new(kind: ActionKind, payload: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            payload: payload.into(),
            confidence,
        }
    }

    pub fn query(payload: impl Into<String>, confidence: f64) -> Self {
        Self::new(ActionKind::Query, payload, confidence)
    }

    pub fn explain(payload: impl Into<String>, confidence: f64) -> Self {
        Self::new(ActionKind::Explain, payload, confidence)
    }

    pub fn fix(payload: impl Into<String>, confidence: f64) -> Self {
        Self::new(ActionKind::Fix, payload, confidence)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_parse_known() {
        assert_eq!(ActionKind::parse("QUERY"), ActionKind::Query);
        assert_eq!(ActionKind::parse("EXPLAIN"), ActionKind::Explain);
        assert_eq!(ActionKind::parse("FIX"), ActionKind::Fix);
    }

    #[test]
    fn test_action_kind_parse_is_exact() {
        assert_eq!(
            ActionKind::parse("query"),
            ActionKind::Unknown("query".to_string())
        );
        assert_eq!(ActionKind::parse(""), ActionKind::Unknown(String::new()));
        assert!(!ActionKind::parse("RESTART").is_known());
    }

    #[test]
    fn test_unknown_kind_keeps_raw_value() {
        let kind = ActionKind::parse("ROLLBACK");
        assert_eq!(kind.as_str(), "ROLLBACK");
        assert_eq!(kind.metric_label(), "UNKNOWN");
        assert_eq!(String::from(kind), "ROLLBACK");
    }

    #[test]
    fn test_action_result_wire_format() -> Result<(), serde_json::Error> {
        let result = ActionResult::query("up", 0.95);
        let json = serde_json::to_value(&result)?;
        assert_eq!(json["action"], "QUERY");
        assert_eq!(json["payload"], "up");
        assert_eq!(json["confidence"], 0.95);
        Ok(())
    }

    #[test]
    fn test_action_result_missing_confidence_defaults_to_zero() -> Result<(), serde_json::Error> {
        let result: ActionResult =
            serde_json::from_str(r#"{"action":"FIX","payload":"kubectl rollout restart deploy/api"}"#)?;
        assert_eq!(result.kind, ActionKind::Fix);
        assert_eq!(result.confidence, 0.0);
        Ok(())
    }

    #[test]
    fn test_action_result_requires_payload() {
        let parsed = serde_json::from_str::<ActionResult>(r#"{"action":"FIX"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_action_result_rejects_non_string_payload() {
        let parsed = serde_json::from_str::<ActionResult>(r#"{"action":"EXPLAIN","payload":{"a":1}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_action_request_accepts_console_keys() -> Result<(), serde_json::Error> {
        let req: ActionRequest = serde_json::from_str(
            r#"{"UserPrompt":"why is p99 high?","Context":"Web Console","History":["a"]}"#,
        )?;
        assert_eq!(req.user_prompt, "why is p99 high?");
        assert_eq!(req.context, "Web Console");
        assert_eq!(req.history, vec!["a".to_string()]);
        Ok(())
    }

    #[test]
    fn test_action_request_accepts_snake_case_and_defaults() -> Result<(), serde_json::Error> {
        let req: ActionRequest = serde_json::from_str(r#"{"user_prompt":"cpu?"}"#)?;
        assert_eq!(req, ActionRequest::new("cpu?"));
        Ok(())
    }
}
