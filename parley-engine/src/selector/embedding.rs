use super::{trivial_choice, ActionSelector, Selection};
use async_trait::async_trait;
use parley_core::{
    ActionContext, ActionSpace, ConfigurationError, EmbeddingProvider, ParleyResult,
};
use std::sync::Arc;

/// Chooses the candidate whose description is most similar to the latest
/// user message. Ties keep the earlier candidate.
///
/// Without a user message there is nothing to compare against and the
/// first candidate is chosen.
pub struct EmbeddingSelector {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingSelector {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl ActionSelector for EmbeddingSelector {
    async fn select(&self, space: &ActionSpace, ctx: &ActionContext) -> ParleyResult<Selection> {
        if let Some(selection) = trivial_choice(space)? {
            return Ok(selection);
        }

        let Some(query) = ctx.conversation.latest_user_message() else {
            tracing::debug!("No user message to embed, choosing first candidate");
            let first = space.first().cloned().ok_or(ConfigurationError::EmptyActionSpace)?;
            return Ok(Selection::new(first));
        };
        let query = self.embedder.embed(&query.content).await?;

        let mut best = None;
        let mut best_score = f32::NEG_INFINITY;
        for action in space.iter() {
            let candidate = self.embedder.embed(action.description()).await?;
            let score = query.cosine_similarity(&candidate)?;
            tracing::trace!(action = %action.key(), score, "Scored candidate");
            if best.is_none() || score > best_score {
                best = Some(action);
                best_score = score;
            }
        }

        let action = best.cloned().ok_or(ConfigurationError::EmptyActionSpace)?;
        tracing::debug!(action = %action.key(), score = best_score, "Embedding selection");
        Ok(Selection::new(action))
    }
}

impl std::fmt::Debug for EmbeddingSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingSelector")
            .field("model_id", &self.embedder.model_id())
            .finish()
    }
}
