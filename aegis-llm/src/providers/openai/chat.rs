//! Chat-completions inference backend

use super::client::OpenAIClient;
use super::types::{ChatRequest, ChatResponse, Message, ResponseFormat};
use crate::prompt::{parse_action_result, render_user_message, SYSTEM_PROMPT};
use crate::providers::invalid_response;
use crate::InferenceBackend;
use aegis_core::{AegisResult, ActionRequest, ActionResult};
use async_trait::async_trait;

/// Classifies requests with a JSON-mode chat completion.
#[derive(Debug, Clone)]
pub struct OpenAIChatBackend {
    client: OpenAIClient,
    model: String,
    temperature: f32,
}

impl OpenAIChatBackend {
    pub fn new(client: OpenAIClient, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &ActionRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(render_user_message(request)),
            ],
            temperature: self.temperature,
            response_format: ResponseFormat::json_object(),
        }
    }
}

#[async_trait]
impl InferenceBackend for OpenAIChatBackend {
    #[tracing::instrument(skip(self, request), fields(model = %self.model))]
    async fn classify(&self, request: &ActionRequest) -> AegisResult<ActionResult> {
        let body = self.build_request(request);
        let response: ChatResponse = self.client.request("chat/completions", &body).await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                total_tokens = usage.total_tokens,
                "Chat completion usage"
            );
        }

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| invalid_response(self.name(), "empty response from provider"))?;

        parse_action_result(self.name(), &content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
