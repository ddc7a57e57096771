//! OpenAI-compatible provider
//!
//! Chat completions and embeddings over one shared, rate-limited HTTP client.

pub mod chat;
pub mod client;
pub mod embedding;
pub mod types;

pub use chat::OpenAiChatModel;
pub use client::OpenAiClient;
pub use embedding::OpenAiEmbeddingProvider;
