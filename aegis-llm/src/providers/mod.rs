//! Inference and embedding provider implementations.

pub mod openai;

pub use openai::{OpenAIChatBackend, OpenAIClient, OpenAIEmbeddingProvider};

use aegis_core::{AegisError, InferenceError};

pub(crate) fn request_failed(provider: &str, status: u16, message: impl Into<String>) -> AegisError {
    AegisError::Inference(InferenceError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: u64) -> AegisError {
    AegisError::Inference(InferenceError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> AegisError {
    AegisError::Inference(InferenceError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}
