//! Error Types for the Aegis API
//!
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use aegis_core::{AegisError, InferenceError, QuotaError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to one HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request body is missing, malformed or empty
    InvalidInput,

    /// FREE tier daily quota is used up
    QuotaExceeded,

    /// The inference backend failed or returned unusable output
    InferenceFailed,

    /// The metrics backend failed or returned an unexpected shape
    MetricsFailed,

    /// An external call exceeded its deadline
    Timeout,

    /// Anything else
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InferenceFailed | ErrorCode::MetricsFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::QuotaExceeded => "Quota exceeded. Upgrade to Pro for unlimited access.",
            ErrorCode::InferenceFailed => "Inference backend failed",
            ErrorCode::MetricsFailed => "Metrics backend failed",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn quota_exceeded(err: &QuotaError) -> Self {
        let QuotaError::Exceeded { tier, used, limit } = err;
        Self::from_code(ErrorCode::QuotaExceeded).with_details(serde_json::json!({
            "tier": tier,
            "used": used,
            "limit": limit,
        }))
    }

    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InferenceFailed, message)
    }

    pub fn metrics_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MetricsFailed, message)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<AegisError> for ApiError {
    fn from(err: AegisError) -> Self {
        match err {
            AegisError::Inference(InferenceError::RateLimited {
                provider,
                retry_after_ms,
            }) => ApiError::inference_failed(format!("Rate limited by {}", provider))
                .with_details(serde_json::json!({ "retry_after_ms": retry_after_ms })),
            AegisError::Inference(e) => ApiError::inference_failed(e.to_string()),
            AegisError::Metrics(e) => ApiError::metrics_failed(e.to_string()),
            AegisError::Quota(e) => ApiError::quota_exceeded(&e),
            AegisError::Timeout { operation, .. } => ApiError::timeout(&operation),
            other => {
                // Storage, config and vector failures are server-side faults;
                // log the detail and keep the response generic.
                tracing::error!(error = %other, "Internal error");
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

impl From<QuotaError> for ApiError {
    fn from(err: QuotaError) -> Self {
        ApiError::quota_exceeded(&err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
