//! OpenAI chat completion model

use super::client::OpenAiClient;
use super::types::{ChatRequest, ChatResponse, WireMessage};
use crate::providers::invalid_response;
use async_trait::async_trait;
use parley_core::{ChatMessage, ModelClient, ParleyResult};
use std::sync::Arc;

/// `ModelClient` over the chat completions endpoint.
pub struct OpenAiChatModel {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiChatModel {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    async fn complete(&self, messages: Vec<WireMessage>) -> ParleyResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response: ChatResponse = self.client.request("chat/completions", &request).await?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                total_tokens = usage.total_tokens,
                "Chat completion finished"
            );
        }

        first_reply(response)
    }
}

/// Text of the first choice; a null content is an empty reply.
fn first_reply(response: ChatResponse) -> ParleyResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| invalid_response("openai", "No completion in response"))
}

pub(crate) fn to_wire(message: &ChatMessage) -> WireMessage {
    WireMessage {
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
        name: message.sender.clone(),
    }
}

#[async_trait]
impl ModelClient for OpenAiChatModel {
    async fn call(&self, prompt: &str) -> ParleyResult<String> {
        self.complete(vec![WireMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
            name: None,
        }])
        .await
    }

    async fn call_with_history(&self, messages: &[ChatMessage]) -> ParleyResult<String> {
        self.complete(messages.iter().map(to_wire).collect()).await
    }
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}
