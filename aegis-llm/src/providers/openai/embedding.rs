//! Embeddings endpoint provider

use super::client::OpenAIClient;
use super::types::{EmbeddingRequest, EmbeddingResponse};
use crate::providers::invalid_response;
use crate::EmbeddingProvider;
use aegis_core::{AegisError, AegisResult, InferenceError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Embedding provider backed by `POST {base}/embeddings`.
///
/// The dimension count is learned from the first successful response.
pub struct OpenAIEmbeddingProvider {
    client: OpenAIClient,
    model: String,
    dimensions: AtomicUsize,
}

impl OpenAIEmbeddingProvider {
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            dimensions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> AegisResult<Vec<f32>> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: vec![text.to_string()],
        };

        let response: EmbeddingResponse = self
            .client
            .request("embeddings", &request)
            .await
            .map_err(|e| match e {
                AegisError::Inference(InferenceError::RequestFailed { message, .. }) => {
                    AegisError::Inference(InferenceError::EmbeddingFailed { reason: message })
                }
                other => other,
            })?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| invalid_response("openai", "no embedding data in response"))?;

        self.dimensions.store(embedding.len(), Ordering::Relaxed);
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions.load(Ordering::Relaxed)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAIEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIEmbeddingProvider")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions())
            .finish()
    }
}
