//! Aegis Metrics - metrics backend capability
//!
//! [`MetricsBackend`] executes instant and range queries against a metrics
//! store. [`PrometheusClient`] speaks the Prometheus HTTP API;
//! [`MockMetricsBackend`] answers from a script for tests.

use aegis_core::{
    with_deadline, AegisError, AegisResult, HealthCheck, MetricValue, MetricsError, QueryRange,
    Timestamp,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub mod decode;
pub mod prometheus;

pub use decode::{decode_body, parse_sample_value};
pub use prometheus::PrometheusClient;

/// Expression used for the connectivity check.
pub const CONNECTIVITY_QUERY: &str = "up";
/// Deadline for the connectivity check.
pub const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes queries against a metrics store.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Evaluate `expr` at instant `at`.
    async fn query(&self, expr: &str, at: Timestamp) -> AegisResult<MetricValue>;

    /// Evaluate `expr` over `range`. A well-behaved backend returns a matrix.
    async fn query_range(&self, expr: &str, range: &QueryRange) -> AegisResult<MetricValue>;
}

/// Run the `up` query against `backend` and report reachability.
pub async fn check_connectivity(backend: &dyn MetricsBackend) -> HealthCheck {
    let started = Instant::now();
    let result = with_deadline(
        "metrics connectivity check",
        CONNECTIVITY_TIMEOUT,
        backend.query(CONNECTIVITY_QUERY, chrono::Utc::now()),
    )
    .await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(_) => HealthCheck::healthy("metrics").with_response_time(elapsed_ms),
        Err(e) => HealthCheck::unhealthy("metrics", e.to_string()).with_response_time(elapsed_ms),
    }
}

// ============================================================================
// MOCK BACKEND FOR TESTING
// ============================================================================

/// A recorded call to a [`MockMetricsBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsCall {
    Query { expr: String, at: Timestamp },
    QueryRange { expr: String, range: QueryRange },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unscripted(kind: &str) -> AegisError {
    MetricsError::RequestFailed {
        status: 503,
        message: format!("no scripted {} response", kind),
    }
    .into()
}

/// Scripted metrics backend.
///
/// Instant queries are answered from per-expression fixtures first, then
/// from a FIFO script. Range queries are answered from their own FIFO
/// script. Unscripted calls fail with `RequestFailed`.
#[derive(Debug, Default)]
pub struct MockMetricsBackend {
    fixtures: Mutex<HashMap<String, AegisResult<MetricValue>>>,
    queries: Mutex<VecDeque<AegisResult<MetricValue>>>,
    ranges: Mutex<VecDeque<AegisResult<MetricValue>>>,
    calls: Mutex<Vec<MetricsCall>>,
    delay: Option<Duration>,
}

impl MockMetricsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `expr` with `result`.
    pub fn with_fixture(self, expr: impl Into<String>, result: AegisResult<MetricValue>) -> Self {
        lock(&self.fixtures).insert(expr.into(), result);
        self
    }

    /// Queue an answer for the next instant query without a fixture.
    pub fn then_query(self, result: AegisResult<MetricValue>) -> Self {
        lock(&self.queries).push_back(result);
        self
    }

    /// Queue an answer for the next range query.
    pub fn then_range(self, result: AegisResult<MetricValue>) -> Self {
        lock(&self.ranges).push_back(result);
        self
    }

    /// Queue a range answer while the backend is shared.
    pub fn push_range(&self, result: AegisResult<MetricValue>) {
        lock(&self.ranges).push_back(result);
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<MetricsCall> {
        lock(&self.calls).clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MetricsBackend for MockMetricsBackend {
    async fn query(&self, expr: &str, at: Timestamp) -> AegisResult<MetricValue> {
        lock(&self.calls).push(MetricsCall::Query {
            expr: expr.to_string(),
            at,
        });
        self.pause().await;
        let fixture = lock(&self.fixtures).get(expr).cloned();
        match fixture {
            Some(result) => result,
            None => {
                let next = lock(&self.queries).pop_front();
                next.unwrap_or_else(|| Err(unscripted("query")))
            }
        }
    }

    async fn query_range(&self, expr: &str, range: &QueryRange) -> AegisResult<MetricValue> {
        lock(&self.calls).push(MetricsCall::QueryRange {
            expr: expr.to_string(),
            range: *range,
        });
        self.pause().await;
        let next = lock(&self.ranges).pop_front();
        next.unwrap_or_else(|| Err(unscripted("range")))
    }
}
