//! OpenAI embedding provider implementation

use super::client::OpenAiClient;
use super::types::{EmbeddingRequest, EmbeddingResponse};
use crate::providers::invalid_response;
use async_trait::async_trait;
use parley_core::{EmbeddingProvider, EmbeddingVector, ParleyResult};
use std::sync::Arc;

/// Embedding provider using text-embedding-3-small or a custom model.
pub struct OpenAiEmbeddingProvider {
    client: Arc<OpenAiClient>,
    model: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn with_default_model(client: Arc<OpenAiClient>) -> Self {
        Self::new(client, "text-embedding-3-small")
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> ParleyResult<EmbeddingVector> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: vec![text.to_string()],
        };

        let response: EmbeddingResponse = self.client.request("embeddings", &request).await?;

        let data = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| invalid_response("openai", "No embedding data in response"))?;

        Ok(EmbeddingVector::new(data.embedding, self.model.clone()))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingProvider")
            .field("model", &self.model)
            .finish()
    }
}
