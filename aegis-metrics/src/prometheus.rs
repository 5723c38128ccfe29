//! Prometheus HTTP API client

use crate::decode::decode_body;
use crate::MetricsBackend;
use aegis_core::{timeout_error, AegisResult, MetricValue, MetricsError, QueryRange, Timestamp};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Client for `GET /api/v1/query` and `GET /api/v1/query_range`.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl PrometheusClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AegisResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            MetricsError::RequestFailed {
                status: 0,
                message: format!("HTTP client setup failed: {}", e),
            }
        })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> AegisResult<MetricValue> {
        let url = format!("{}/api/v1/{}", self.base_url, path);
        let operation = format!("prometheus {}", path);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    timeout_error(&operation, self.timeout)
                } else {
                    MetricsError::RequestFailed {
                        status: 0,
                        message: e.to_string(),
                    }
                    .into()
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                timeout_error(&operation, self.timeout)
            } else {
                MetricsError::InvalidResponse {
                    reason: e.to_string(),
                }
                .into()
            }
        })?;

        // Query errors come back as 400/422 with an error envelope; prefer
        // the envelope's message over the bare status.
        match (status.is_success(), decode_body(&body)) {
            (_, Err(err @ MetricsError::QueryFailed { .. })) => Err(err.into()),
            (true, result) => result.map_err(Into::into),
            (false, _) => Err(MetricsError::RequestFailed {
                status: status.as_u16(),
                message: truncate(&body, 256),
            }
            .into()),
        }
    }
}

fn format_ts(ts: &Timestamp) -> String {
    format!("{:.3}", ts.timestamp_millis() as f64 / 1000.0)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[async_trait]
impl MetricsBackend for PrometheusClient {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn query(&self, expr: &str, at: Timestamp) -> AegisResult<MetricValue> {
        self.get("query", &[("query", expr.to_string()), ("time", format_ts(&at))])
            .await
    }

    #[tracing::instrument(skip(self, range), level = "debug")]
    async fn query_range(&self, expr: &str, range: &QueryRange) -> AegisResult<MetricValue> {
        self.get(
            "query_range",
            &[
                ("query", expr.to_string()),
                ("start", format_ts(&range.start)),
                ("end", format_ts(&range.end)),
                ("step", format!("{}", range.step.as_secs_f64())),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_ts_millis() {
        let ts = chrono::Utc.timestamp_millis_opt(1_700_000_000_250).unwrap();
        assert_eq!(format_ts(&ts), "1700000000.250");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
