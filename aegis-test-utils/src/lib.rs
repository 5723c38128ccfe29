//! Aegis Test Utilities
//!
//! Shared test infrastructure for the Aegis workspace:
//! - Proptest generators for the core types
//! - Fixtures for metrics results, incidents and quota state
//! - Assertions for Aegis error variants
//!
//! Scripted backends live next to their traits (`aegis_llm::MockInferenceBackend`,
//! `aegis_metrics::MockMetricsBackend`).

pub use aegis_core::{
    ActionKind, ActionRequest, ActionResult, AegisError, AegisResult, IncidentRecord, LabelSet,
    LabeledSample, MetricValue, QuotaState, Series, Tier, TimeSeriesPoint, Timestamp,
};

fn label_set(labels: &[(&str, &str)]) -> LabelSet {
    labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Aegis core types.

    use super::*;
    use proptest::prelude::*;

    /// Any action kind, including unrecognised ones.
    pub fn arb_action_kind() -> impl Strategy<Value = ActionKind> {
        prop_oneof![
            Just(ActionKind::Query),
            Just(ActionKind::Explain),
            Just(ActionKind::Fix),
            "[A-Z]{0,8}".prop_map(|raw| ActionKind::parse(&raw)),
        ]
    }

    pub fn arb_action_result() -> impl Strategy<Value = ActionResult> {
        (arb_action_kind(), ".{0,80}", 0.0f64..=1.0)
            .prop_map(|(kind, payload, confidence)| ActionResult::new(kind, payload, confidence))
    }

    pub fn arb_action_request() -> impl Strategy<Value = ActionRequest> {
        (
            ".{1,80}",
            ".{0,40}",
            prop::collection::vec(".{0,20}", 0..4),
        )
            .prop_map(|(prompt, context, history)| {
                ActionRequest::new(prompt)
                    .with_context(context)
                    .with_history(history)
            })
    }

    /// Embedding with finite components in [-1, 1].
    pub fn arb_embedding(dimensions: usize) -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-1.0f32..1.0, dimensions)
    }

    pub fn arb_incident(dimensions: usize) -> impl Strategy<Value = IncidentRecord> {
        ("[a-z0-9-]{1,12}", ".{1,40}", ".{0,80}", ".{0,80}", arb_embedding(dimensions)).prop_map(
            |(id, title, summary, solution, embedding)| {
                IncidentRecord::new(id, title, summary, solution, embedding)
            },
        )
    }

    /// Samples with strictly increasing timestamps.
    pub fn arb_points(max_len: usize) -> impl Strategy<Value = Vec<TimeSeriesPoint>> {
        (
            1_600_000_000.0f64..1_900_000_000.0,
            1u32..120,
            prop::collection::vec(-1e6f64..1e6, 0..max_len),
        )
            .prop_map(|(start, step, values)| {
                values
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| TimeSeriesPoint::new(start + (i as f64) * f64::from(step), v))
                    .collect()
            })
    }

    pub fn arb_tier() -> impl Strategy<Value = Tier> {
        prop_oneof![Just(Tier::Free), Just(Tier::Pro)]
    }

    /// Quota state dated within 2020-2030.
    pub fn arb_quota_state() -> impl Strategy<Value = QuotaState> {
        (arb_tier(), 0u64..1000, 0u64..1_000_000, 0i64..3650).prop_map(
            |(tier, query_count, token_usage, offset)| {
                let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
                QuotaState {
                    tier,
                    query_count,
                    token_usage,
                    last_reset: base + chrono::Duration::days(offset),
                }
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made values for common scenarios.

    use super::*;
    use chrono::NaiveDate;

    /// A fixed calendar day for quota tests.
    pub fn day(year: i32, month: u32, date: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, date).unwrap_or_default()
    }

    pub fn quota_state(tier: Tier, query_count: u64, last_reset: NaiveDate) -> QuotaState {
        QuotaState {
            tier,
            query_count,
            token_usage: 0,
            last_reset,
        }
    }

    /// A series from explicit `(timestamp, value)` pairs.
    pub fn series(labels: &[(&str, &str)], points: &[(f64, f64)]) -> Series {
        Series {
            labels: label_set(labels),
            points: points
                .iter()
                .map(|&(t, v)| TimeSeriesPoint::new(t, v))
                .collect(),
        }
    }

    /// `n` samples `step` seconds apart on the line `intercept + gradient * t`.
    pub fn linear_series(labels: &[(&str, &str)], n: usize, step: f64, intercept: f64, gradient: f64) -> Series {
        let start = 1_700_000_000.0;
        Series {
            labels: label_set(labels),
            points: (0..n)
                .map(|i| {
                    let x = i as f64 * step;
                    TimeSeriesPoint::new(start + x, intercept + gradient * x)
                })
                .collect(),
        }
    }

    pub fn matrix(series: Vec<Series>) -> MetricValue {
        MetricValue::Matrix(series)
    }

    /// A one-sample instant vector.
    pub fn gauge(labels: &[(&str, &str)], value: f64) -> MetricValue {
        MetricValue::Vector(vec![LabeledSample {
            labels: label_set(labels),
            point: TimeSeriesPoint::new(1_700_000_000.0, value),
        }])
    }

    /// Unit vector along `axis`.
    pub fn unit_embedding(dimensions: usize, axis: usize) -> Vec<f32> {
        let mut data = vec![0.0f32; dimensions];
        if axis < dimensions {
            data[axis] = 1.0;
        }
        data
    }

    pub fn incident(id: &str, title: &str, embedding: Vec<f32>) -> IncidentRecord {
        IncidentRecord::new(
            id,
            title,
            format!("{} summary", title),
            format!("{} fix", title),
            embedding,
        )
    }

    /// Three incidents on orthogonal axes of a 4-dimensional space.
    pub fn incident_set() -> Vec<IncidentRecord> {
        vec![
            incident("inc-1", "Disk full on db-1", unit_embedding(4, 0)),
            incident("inc-2", "API latency spike", unit_embedding(4, 1)),
            incident("inc-3", "OOM kill loop", unit_embedding(4, 2)),
        ]
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on Aegis error variants.

    use super::*;
    use aegis_core::{InferenceError, MetricsError, QuotaError, VectorError};

    #[track_caller]
    pub fn assert_inference_error<T: std::fmt::Debug>(result: &AegisResult<T>) {
        match result {
            Err(AegisError::Inference(_)) => {}
            other => panic!("Expected Inference error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_invalid_response<T: std::fmt::Debug>(result: &AegisResult<T>) {
        match result {
            Err(AegisError::Inference(InferenceError::InvalidResponse { .. })) => {}
            other => panic!("Expected InvalidResponse, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_metrics_error<T: std::fmt::Debug>(result: &AegisResult<T>) {
        match result {
            Err(AegisError::Metrics(_)) => {}
            other => panic!("Expected Metrics error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_unexpected_result<T: std::fmt::Debug>(result: &AegisResult<T>, expected: &str) {
        match result {
            Err(AegisError::Metrics(MetricsError::UnexpectedResult { expected: e, .. })) => {
                assert_eq!(e, expected, "Wrong expected result type");
            }
            other => panic!("Expected UnexpectedResult({}), got: {:?}", expected, other),
        }
    }

    #[track_caller]
    pub fn assert_timeout<T: std::fmt::Debug>(result: &AegisResult<T>, operation: &str) {
        match result {
            Err(AegisError::Timeout { operation: op, .. }) => {
                assert_eq!(op, operation, "Wrong operation in Timeout error");
            }
            other => panic!("Expected Timeout for {}, got: {:?}", operation, other),
        }
    }

    #[track_caller]
    pub fn assert_dimension_mismatch<T: std::fmt::Debug>(
        result: &Result<T, VectorError>,
        expected: usize,
        got: usize,
    ) {
        match result {
            Err(VectorError::DimensionMismatch { expected: e, got: g }) => {
                assert_eq!(*e, expected, "Wrong expected dimension");
                assert_eq!(*g, got, "Wrong got dimension");
            }
            other => panic!("Expected DimensionMismatch({}, {}), got: {:?}", expected, got, other),
        }
    }

    #[track_caller]
    pub fn assert_quota_exceeded<T: std::fmt::Debug>(result: &Result<T, QuotaError>, used: u64, limit: u64) {
        match result {
            Err(QuotaError::Exceeded { used: u, limit: l, .. }) => {
                assert_eq!((*u, *l), (used, limit), "Wrong quota counters");
            }
            other => panic!("Expected quota exceeded at {}/{}, got: {:?}", used, limit, other),
        }
    }

    /// Assert that a similarity score is within `[min, max]`.
    #[track_caller]
    pub fn assert_similarity_in_range(similarity: f32, min: f32, max: f32) {
        assert!(
            similarity >= min && similarity <= max,
            "Similarity {} not in range [{}, {}]",
            similarity,
            min,
            max
        );
    }
}
