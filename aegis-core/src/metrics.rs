//! Metrics query result types.
//!
//! These mirror the Prometheus result model: an instant query yields a
//! scalar or a vector of labeled samples, a range query yields a matrix of
//! labeled series.

use crate::{MetricsError, Timestamp};
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Label set identifying a series. Ordered so rendering is stable.
pub type LabelSet = BTreeMap<String, String>;

/// One `(timestamp, value)` sample. Timestamps are Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: f64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A sample tagged with the labels of its series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub labels: LabelSet,
    pub point: TimeSeriesPoint,
}

/// A labeled series of samples ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub labels: LabelSet,
    pub points: Vec<TimeSeriesPoint>,
}

/// Typed result of a metrics query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result_type", content = "result", rename_all = "lowercase")]
pub enum MetricValue {
    Scalar(TimeSeriesPoint),
    Vector(Vec<LabeledSample>),
    Matrix(Vec<Series>),
}

impl MetricValue {
    /// Result type name as used by the Prometheus API.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Vector(_) => "vector",
            Self::Matrix(_) => "matrix",
        }
    }

    /// Unwrap a matrix result, rejecting any other shape.
    pub fn into_matrix(self) -> Result<Vec<Series>, MetricsError> {
        match self {
            Self::Matrix(series) => Ok(series),
            other => Err(MetricsError::UnexpectedResult {
                expected: "matrix".to_string(),
                got: other.kind().to_string(),
            }),
        }
    }

    /// A single gauge reading: the scalar, or the first sample of a vector.
    pub fn first_value(&self) -> Option<f64> {
        match self {
            Self::Scalar(point) => Some(point.value),
            Self::Vector(samples) => samples.first().map(|s| s.point.value),
            Self::Matrix(_) => None,
        }
    }
}

fn write_labels(f: &mut fmt::Formatter<'_>, labels: &LabelSet) -> fmt::Result {
    if let Some(name) = labels.get("__name__") {
        f.write_str(name)?;
    }
    let rest: Vec<String> = labels
        .iter()
        .filter(|(k, _)| k.as_str() != "__name__")
        .map(|(k, v)| format!("{}={:?}", k, v))
        .collect();
    if !rest.is_empty() || !labels.contains_key("__name__") {
        write!(f, "{{{}}}", rest.join(", "))?;
    }
    Ok(())
}

fn write_point(f: &mut fmt::Formatter<'_>, point: &TimeSeriesPoint) -> fmt::Result {
    write!(f, "{} @[{:.3}]", point.value, point.timestamp)
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(point) => {
                f.write_str("scalar: ")?;
                write_point(f, point)
            }
            Self::Vector(samples) => {
                for (i, sample) in samples.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write_labels(f, &sample.labels)?;
                    f.write_str(" => ")?;
                    write_point(f, &sample.point)?;
                }
                Ok(())
            }
            Self::Matrix(series) => {
                for (i, s) in series.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write_labels(f, &s.labels)?;
                    f.write_str(" =>")?;
                    for point in &s.points {
                        f.write_str("\n")?;
                        write_point(f, point)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Time window and resolution of a range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRange {
    pub start: Timestamp,
    pub end: Timestamp,
    pub step: Duration,
}

impl QueryRange {
    /// The window `[end - window, end]` sampled every `step`.
    pub fn trailing(end: Timestamp, window: Duration, step: Duration) -> Self {
        let window = ChronoDuration::from_std(window).unwrap_or(ChronoDuration::zero());
        Self {
            start: end - window,
            end,
            step,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
