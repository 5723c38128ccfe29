//! Aegis Core - shared types
//!
//! Data types, errors and configuration used by every other Aegis crate.
//! No I/O happens here apart from reading the environment in
//! [`AegisConfig::from_env`].

use chrono::{DateTime, Utc};

mod action;
mod config;
mod deadline;
mod embedding;
mod error;
mod health;
mod incident;
mod metrics;
mod quota;

pub use action::{ActionKind, ActionRequest, ActionResult};
pub use config::{
    AegisConfig, ApiConfig, DataConfig, DeadlineConfig, LlmConfig, MetricsConfig, QuotaPolicy,
    TelemetryConfig, WatchtowerConfig, DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL,
    DEFAULT_PROMETHEUS_URL, DEFAULT_WATCH_QUERY,
};
pub use deadline::{timeout_error, with_deadline};
pub use embedding::{cosine_similarity, validate_vector};
pub use error::{
    AegisError, AegisResult, ConfigError, InferenceError, MetricsError, QuotaError,
    StorageError, VectorError,
};
pub use health::{HealthCheck, HealthStatus, Liveness};
pub use incident::IncidentRecord;
pub use metrics::{LabelSet, LabeledSample, MetricValue, QueryRange, Series, TimeSeriesPoint};
pub use quota::{QuotaState, Tier};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
