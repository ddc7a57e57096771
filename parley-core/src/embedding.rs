//! Embedding vector operations

use crate::{ParleyResult, VectorError};
use serde::{Deserialize, Serialize};

/// Embedding vector with dynamic dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub data: Vec<f32>,
    /// Identifier of the model that produced this embedding.
    pub model_id: String,
}

impl EmbeddingVector {
    pub fn new(data: Vec<f32>, model_id: impl Into<String>) -> Self {
        Self {
            data,
            model_id: model_id.into(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.data.len()
    }

    /// Cosine similarity `dot(u,v) / (|u||v|)`. A zero vector scores 0.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> ParleyResult<f32> {
        if self.dimensions() != other.dimensions() {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimensions(),
                got: other.dimensions(),
            }
            .into());
        }

        let dot: f32 = self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum();
        let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm(&self.data) * norm(&other.data);
        if denom == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / denom)
    }
}

// =============================================================================
// TESTS
// =============================================================================
