//! PARLEY LLM - Model and Embedding Collaborators
//!
//! Concrete implementations of the `ModelClient` and `EmbeddingProvider`
//! traits declared in `parley-core`, plus a registry and an embedding cache.
//! Providers must be registered explicitly; nothing is auto-discovered.

pub mod providers;

pub use providers::{OpenAiChatModel, OpenAiClient, OpenAiEmbeddingProvider};

use async_trait::async_trait;
use parley_core::{
    compute_content_hash, ConfigError, ContentHash, EmbeddingProvider, EmbeddingVector, LlmError,
    ModelClient, ParleyError, ParleyResult, ProviderConfig,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// PROVIDER REGISTRY
// ============================================================================

/// Registry for the model and embedding collaborators of one process.
///
/// ```ignore
/// let mut registry = ProviderRegistry::new();
/// registry.register_model(Arc::new(my_model));
/// let reply = registry.model()?.call("hello").await?;
/// ```
pub struct ProviderRegistry {
    model: Option<Arc<dyn ModelClient>>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            model: None,
            embedding: None,
        }
    }

    /// Build OpenAI-compatible providers from configuration.
    ///
    /// The API key is read from the environment variable named by
    /// `api_key_env`. The embedding provider is only registered when an
    /// embedding model is configured; embeddings are cached.
    pub fn from_config(config: &ProviderConfig) -> ParleyResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ParleyError::Config(ConfigError::InvalidValue {
                field: "provider.api_key_env",
                reason: format!("environment variable {} is not set", config.api_key_env),
            })
        })?;

        let client = Arc::new(
            OpenAiClient::new(api_key, config.requests_per_minute).with_base_url(&config.base_url),
        );

        let mut registry = Self::new();
        registry.register_model(Arc::new(OpenAiChatModel::new(
            Arc::clone(&client),
            &config.chat_model,
        )));
        if let Some(model) = &config.embedding_model {
            let provider = OpenAiEmbeddingProvider::new(Arc::clone(&client), model);
            registry.register_embedding(Arc::new(CachedEmbeddingProvider::new(provider, 4096)));
        }
        tracing::info!(
            base_url = %config.base_url,
            chat_model = %config.chat_model,
            embeddings = registry.has_embedding(),
            "Model providers configured"
        );
        Ok(registry)
    }

    /// Replaces any previously registered model.
    pub fn register_model(&mut self, model: Arc<dyn ModelClient>) {
        self.model = Some(model);
    }

    /// Replaces any previously registered embedding provider.
    pub fn register_embedding(&mut self, provider: Arc<dyn EmbeddingProvider>) {
        self.embedding = Some(provider);
    }

    pub fn model(&self) -> ParleyResult<Arc<dyn ModelClient>> {
        self.model
            .clone()
            .ok_or(ParleyError::Llm(LlmError::ProviderNotConfigured))
    }

    pub fn embedding(&self) -> ParleyResult<Arc<dyn EmbeddingProvider>> {
        self.embedding
            .clone()
            .ok_or(ParleyError::Llm(LlmError::ProviderNotConfigured))
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("model", &self.model.is_some())
            .field("embedding", &self.embedding.is_some())
            .finish()
    }
}

// ============================================================================
// EMBEDDING CACHE
// ============================================================================

/// Content-hash keyed embedding cache. Thread-safe via RwLock.
pub struct EmbeddingCache {
    cache: RwLock<HashMap<ContentHash, EmbeddingVector>>,
    max_size: usize,
}

impl EmbeddingCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            max_size,
        }
    }

    /// Key for `text` embedded by `model_id`.
    pub fn key(model_id: &str, text: &str) -> ContentHash {
        let mut content = Vec::with_capacity(model_id.len() + text.len() + 1);
        content.extend_from_slice(model_id.as_bytes());
        content.push(0);
        content.extend_from_slice(text.as_bytes());
        compute_content_hash(&content)
    }

    pub fn get(&self, hash: &ContentHash) -> Option<EmbeddingVector> {
        self.cache.read().ok()?.get(hash).cloned()
    }

    /// Insert an embedding. A full cache ignores new entries.
    pub fn insert(&self, hash: ContentHash, embedding: EmbeddingVector) {
        if let Ok(mut cache) = self.cache.write() {
            if cache.len() < self.max_size || cache.contains_key(&hash) {
                cache.insert(hash, embedding);
            }
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("max_size", &self.max_size)
            .field("current_size", &self.len())
            .finish()
    }
}

/// Embedding provider that answers repeated texts from an `EmbeddingCache`.
///
/// Action descriptions are embedded on every selection, so wrapping the
/// embedding selector's provider in this avoids re-embedding them each turn.
pub struct CachedEmbeddingProvider<P> {
    inner: P,
    cache: EmbeddingCache,
}

impl<P: EmbeddingProvider> CachedEmbeddingProvider<P> {
    pub fn new(inner: P, max_size: usize) -> Self {
        Self {
            inner,
            cache: EmbeddingCache::new(max_size),
        }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbeddingProvider<P> {
    async fn embed(&self, text: &str) -> ParleyResult<EmbeddingVector> {
        let key = EmbeddingCache::key(self.inner.model_id(), text);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let embedding = self.inner.embed(text).await?;
        self.cache.insert(key, embedding.clone());
        Ok(embedding)
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// TESTS
// ============================================================================
