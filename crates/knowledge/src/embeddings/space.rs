//! Identity of the embedding function behind an index.

use super::provider::EmbeddingProvider;
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The `(provider, model, dimensions)` triple an index was built with.
///
/// Vectors from different spaces are not comparable, so an index refuses
/// entries from any space other than the one it recorded at build time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingSpace {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl EmbeddingSpace {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            dimensions,
        }
    }

    /// The space produced by `provider`.
    pub fn of(provider: &dyn EmbeddingProvider) -> Self {
        Self::new(
            provider.provider_name(),
            provider.model_name(),
            provider.dimensions(),
        )
    }

    /// Fail with `AppError::Embedding` unless `other` is the same space.
    pub fn validate_consistency(&self, other: &Self) -> AppResult<()> {
        if self.provider != other.provider {
            return Err(AppError::Embedding(format!(
                "Provider mismatch: index uses '{}', got '{}'",
                self.provider, other.provider
            )));
        }

        if self.model != other.model {
            return Err(AppError::Embedding(format!(
                "Model mismatch: index uses '{}', got '{}'",
                self.model, other.model
            )));
        }

        if self.dimensions != other.dimensions {
            return Err(AppError::Embedding(format!(
                "Dimension mismatch: index uses {}, got {}",
                self.dimensions, other.dimensions
            )));
        }

        Ok(())
    }

    /// Fail unless `vector` has this space's dimensionality.
    pub fn check_vector(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.dimensions {
            return Err(AppError::Embedding(format!(
                "Dimension mismatch: index uses {}, got a {}-dimensional vector",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}d)", self.provider, self.model, self.dimensions)
    }
}
