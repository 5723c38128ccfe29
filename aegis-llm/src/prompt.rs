//! Prompt rendering and structured-output parsing.

use aegis_core::{AegisResult, ActionRequest, ActionResult, InferenceError};

/// System prompt sent with every classification request.
pub const SYSTEM_PROMPT: &str = r#"You are Aegis, an SRE copilot. You monitor, diagnose and fix infrastructure issues.

Output rules:
1. Return strictly valid JSON, with no markdown fences around it.
2. "payload" MUST be a string. Escape quotes and newlines.

Actions:
- "QUERY": the user needs data. Payload is a PromQL expression only. Use range vectors for rates, e.g. rate(http_requests_total[5m]).
- "EXPLAIN": the user needs analysis of a result, a concept or a root cause. Payload is concise Markdown.
- "FIX": the user needs remediation. Payload is a single executable command (kubectl, docker, ...).

Examples:
User: "Get CPU usage"
{"action": "QUERY", "payload": "100 - (avg by (instance) (rate(node_cpu_seconds_total{mode='idle'}[5m])) * 100)", "confidence": 0.95}

User: "Restart the payments deployment"
{"action": "FIX", "payload": "kubectl rollout restart deployment/payments", "confidence": 0.9}

Response schema:
{"action": "QUERY" | "EXPLAIN" | "FIX", "payload": "string", "confidence": 0.0 to 1.0}"#;

/// Render the user message for `request`.
///
/// History entries are space-separated inside brackets.
pub fn render_user_message(request: &ActionRequest) -> String {
    format!(
        "User: {}\nContext: {}\nHistory: [{}]",
        request.user_prompt,
        request.context,
        request.history.join(" ")
    )
}

/// Parse model output into an [`ActionResult`].
///
/// The content must be a JSON object with string `action` and `payload`
/// fields; anything else is an `InvalidResponse` carrying the raw content.
pub fn parse_action_result(provider: &str, content: &str) -> AegisResult<ActionResult> {
    let invalid = |reason: String| InferenceError::InvalidResponse {
        provider: provider.to_string(),
        reason: format!("{} | raw: {}", reason, content),
    };

    let value: serde_json::Value = serde_json::from_str(content.trim())
        .map_err(|e| invalid(format!("malformed action JSON: {}", e)))?;
    if !value.is_object() {
        return Err(invalid("action JSON is not an object".to_string()).into());
    }
    serde_json::from_value(value)
        .map_err(|e| invalid(format!("action JSON does not match schema: {}", e)).into())
}
