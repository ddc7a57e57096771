//! Collaborator interfaces the core consumes but never implements.
//!
//! Failures surface as `LlmError` / `ToolError`; the core does not retry them.

use crate::{ActionParams, ChatMessage, EmbeddingVector, ParleyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text generation surface of a language model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Single prompt completion.
    async fn call(&self, prompt: &str) -> ParleyResult<String>;

    /// Completion over an ordered message history.
    async fn call_with_history(&self, messages: &[ChatMessage]) -> ParleyResult<String>;
}

/// Embedding surface of a language model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> ParleyResult<EmbeddingVector>;

    /// Identifier of the embedding model (e.g. "text-embedding-3-small").
    fn model_id(&self) -> &str;
}

/// Description of a tool exposed by a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

/// Tool discovery and invocation. Used by tool actions, never by the engine.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    async fn list_tools(&self) -> ParleyResult<Vec<ToolSpec>>;

    async fn call_tool(&self, name: &str, params: &ActionParams) -> ParleyResult<Value>;
}
