//! Aegis LLM - inference and embedding capabilities
//!
//! Provider-agnostic traits for turning a request into a typed action and
//! for embedding text. Concrete OpenAI-compatible implementations live in
//! [`providers`]; scripted mocks are provided for tests.

use aegis_core::{
    AegisError, AegisResult, ActionRequest, ActionResult, InferenceError, LlmConfig, Tier,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub mod prompt;
pub mod providers;

pub use prompt::{parse_action_result, render_user_message, SYSTEM_PROMPT};
pub use providers::{OpenAIChatBackend, OpenAIClient, OpenAIEmbeddingProvider};

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Classifies a natural-language request into a typed action.
///
/// Implementations must be thread-safe. A call is made once; retrying is
/// left to the caller.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Classify `request`.
    ///
    /// # Errors
    /// * `AegisError::Inference` if the backend is unreachable or its output
    ///   does not parse as an action.
    /// * `AegisError::Timeout` if the call exceeds its deadline.
    async fn classify(&self, request: &ActionRequest) -> AegisResult<ActionResult>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

/// Produces embedding vectors for text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> AegisResult<Vec<f32>>;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Model identifier (e.g. "text-embedding-3-small").
    fn model_id(&self) -> &str;
}

// ============================================================================
// CONSTRUCTION FROM CONFIG
// ============================================================================

/// Build the inference backend serving accounts of `tier`.
///
/// Fails with `ProviderNotConfigured` when no API key is set.
pub fn inference_for_tier(
    config: &LlmConfig,
    tier: Tier,
    call_timeout: Duration,
) -> AegisResult<Arc<dyn InferenceBackend>> {
    let api_key = config
        .api_key
        .as_deref()
        .ok_or(AegisError::Inference(InferenceError::ProviderNotConfigured))?;
    let client = OpenAIClient::new(api_key, &config.base_url, call_timeout)?;
    Ok(Arc::new(OpenAIChatBackend::new(
        client,
        config.model_for(tier),
        config.temperature,
    )))
}

/// Build the embedding provider, if an embedding model is configured.
pub fn embedding_from_config(
    config: &LlmConfig,
    call_timeout: Duration,
) -> AegisResult<Option<Arc<dyn EmbeddingProvider>>> {
    let (Some(api_key), Some(model)) = (config.api_key.as_deref(), config.embedding_model.as_deref())
    else {
        return Ok(None);
    };
    let client = OpenAIClient::new(api_key, &config.base_url, call_timeout)?;
    Ok(Some(Arc::new(OpenAIEmbeddingProvider::new(client, model))))
}

// ============================================================================
// MOCK PROVIDERS FOR TESTING
// ============================================================================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scripted inference backend.
///
/// Answers each `classify` call with the next scripted outcome and records
/// the request it was given. An exhausted script yields `InvalidResponse`.
#[derive(Debug, Default)]
pub struct MockInferenceBackend {
    script: Mutex<VecDeque<AegisResult<ActionResult>>>,
    calls: Mutex<Vec<ActionRequest>>,
    delay: Option<Duration>,
}

impl MockInferenceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful classification.
    pub fn then_return(self, result: ActionResult) -> Self {
        lock(&self.script).push_back(Ok(result));
        self
    }

    /// Queue a failure.
    pub fn then_fail(self, error: impl Into<AegisError>) -> Self {
        lock(&self.script).push_back(Err(error.into()));
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in order.
    pub fn calls(&self) -> Vec<ActionRequest> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    async fn classify(&self, request: &ActionRequest) -> AegisResult<ActionResult> {
        lock(&self.calls).push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = lock(&self.script).pop_front();
        next.unwrap_or_else(|| {
            Err(InferenceError::InvalidResponse {
                provider: "mock".to_string(),
                reason: "script exhausted".to_string(),
            }
            .into())
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Deterministic embedding provider for testing.
///
/// Hashes text bytes into a fixed number of buckets and normalises the
/// result, so equal texts embed identically.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    model_id: String,
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
        }
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut data = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return data;
        }

        for (i, byte) in text.bytes().enumerate() {
            data[i % self.dimensions] += (byte as f32) / 255.0;
        }

        let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut data {
                *x /= norm;
            }
        }
        data
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> AegisResult<Vec<f32>> {
        Ok(self.generate_embedding(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// TESTS
// ============================================================================
