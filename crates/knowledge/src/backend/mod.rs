//! Vector backend abstraction.
//!
//! A backend stores embedded documents for one [`EmbeddingSpace`] and answers
//! nearest-neighbour queries by cosine similarity. Which backend is used is
//! decided once, at construction, through [`BackendKind`].

pub mod memory;
pub mod sqlite;

use crate::embeddings::EmbeddingSpace;
use crate::types::Document;
use docqa_core::{AppError, AppResult};
use std::path::PathBuf;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// A document with its embedding, ready to be indexed.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub document: Document,
    pub embedding: Vec<f32>,
}

/// A query hit.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub document: Document,
    pub embedding: Vec<f32>,
    pub score: f32,
}

/// Trait for vector index backends.
///
/// Implementations only ever grow: entries are appended, never replaced.
pub trait VectorBackend: Send + Sync {
    /// Backend name (e.g., "memory", "sqlite").
    fn name(&self) -> &str;

    /// Embedding space recorded when the backend was built.
    fn space(&self) -> &EmbeddingSpace;

    /// Append entries embedded in `space`.
    ///
    /// Fails with `AppError::Embedding` if `space` differs from the recorded
    /// one or any vector has the wrong dimensionality; nothing is written then.
    fn add_documents(&mut self, space: &EmbeddingSpace, entries: Vec<IndexEntry>)
        -> AppResult<()>;

    /// Return up to `limit` entries ordered by descending cosine similarity.
    fn query(&self, embedding: &[f32], limit: usize) -> AppResult<Vec<ScoredEntry>>;

    /// Number of indexed documents.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which backend a store builds when the first batch arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Sqlite { path: PathBuf },
}

impl BackendKind {
    /// Resolve a configured backend name.
    pub fn from_name(name: &str, path: PathBuf) -> AppResult<Self> {
        match name.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite { path }),
            other => Err(AppError::Config(format!(
                "Unknown store backend: {}. Supported: memory, sqlite",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite { .. } => "sqlite",
        }
    }

    /// Build a new backend holding `entries`.
    pub fn build(
        &self,
        space: &EmbeddingSpace,
        entries: Vec<IndexEntry>,
    ) -> AppResult<Box<dyn VectorBackend>> {
        let mut backend: Box<dyn VectorBackend> = match self {
            Self::Memory => Box::new(MemoryBackend::new(space.clone())),
            Self::Sqlite { path } => Box::new(SqliteBackend::create(path, space)?),
        };
        backend.add_documents(space, entries)?;
        Ok(backend)
    }

    /// Reopen a persisted, non-empty index. Memory backends never persist.
    pub fn open_existing(&self, space: &EmbeddingSpace) -> AppResult<Option<Box<dyn VectorBackend>>> {
        match self {
            Self::Memory => Ok(None),
            Self::Sqlite { path } => Ok(SqliteBackend::open_existing(path, space)?
                .map(|backend| Box::new(backend) as Box<dyn VectorBackend>)),
        }
    }
}

/// Validate a batch against the recorded space before writing it.
pub(crate) fn check_batch(
    recorded: &EmbeddingSpace,
    incoming: &EmbeddingSpace,
    entries: &[IndexEntry],
) -> AppResult<()> {
    recorded.validate_consistency(incoming)?;
    entries
        .iter()
        .try_for_each(|entry| recorded.check_vector(&entry.embedding))
}

/// Rank scored entries by descending score and keep the best `limit`.
pub(crate) fn top_k(mut scored: Vec<ScoredEntry>, limit: usize) -> Vec<ScoredEntry> {
    // Stable sort keeps insertion order among equal scores
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentMetadata;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_backend_kind_from_name() {
        assert_eq!(
            BackendKind::from_name("memory", PathBuf::new()).unwrap(),
            BackendKind::Memory
        );
        assert_eq!(
            BackendKind::from_name("SQLite", PathBuf::from("x.sqlite"))
                .unwrap()
                .name(),
            "sqlite"
        );
        assert!(BackendKind::from_name("chroma", PathBuf::new()).is_err());
    }

    #[test]
    fn test_build_memory_backend() {
        let space = EmbeddingSpace::new("test", "unit", 2);
        let entries = vec![IndexEntry {
            document: Document::new("x", DocumentMetadata::new("s")),
            embedding: vec![1.0, 0.0],
        }];

        let backend = BackendKind::Memory.build(&space, entries).unwrap();
        assert_eq!(backend.name(), "memory");
        assert_eq!(backend.len(), 1);
        assert!(BackendKind::Memory.open_existing(&space).unwrap().is_none());
    }
}
