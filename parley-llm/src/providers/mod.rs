//! LLM provider implementations
//!
//! Concrete `ModelClient` and `EmbeddingProvider` implementations.

pub mod openai;

pub use openai::{OpenAiChatModel, OpenAiClient, OpenAiEmbeddingProvider};

use parley_core::{LlmError, ParleyError};

pub(crate) fn request_failed(
    provider: &str,
    status: i32,
    message: impl Into<String>,
) -> ParleyError {
    LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    }
    .into()
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> ParleyError {
    LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    }
    .into()
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> ParleyError {
    LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    }
    .into()
}
