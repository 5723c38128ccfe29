//! Error types for Aegis operations

use crate::Tier;
use thiserror::Error;

/// Inference backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    #[error("No inference provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Embedding failed: {reason}")]
    EmbeddingFailed { reason: String },
}

/// Metrics backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("Metrics request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Query failed ({error_type}): {message}")]
    QueryFailed { error_type: String, message: String },

    #[error("Unexpected result type: expected {expected}, got {got}")]
    UnexpectedResult { expected: String, got: String },

    #[error("Invalid metrics response: {reason}")]
    InvalidResponse { reason: String },
}

/// Vector operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },
}

/// Quota errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("Daily quota exceeded for {tier} tier: {used}/{limit} queries used")]
    Exceeded { tier: Tier, used: u64, limit: u64 },
}

/// File-backed storage errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Serialization error on {path}: {reason}")]
    Serialization { path: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Aegis errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AegisError {
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },
}

impl AegisError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias for Aegis operations.
pub type AegisResult<T> = Result<T, AegisError>;

// =============================================================================
// TESTS
// =============================================================================
