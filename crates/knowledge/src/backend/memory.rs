//! In-process vector backend.

use super::{check_batch, cosine_similarity, top_k, IndexEntry, ScoredEntry, VectorBackend};
use crate::embeddings::EmbeddingSpace;
use docqa_core::AppResult;

/// Keeps every entry in a `Vec` and scans it on each query.
#[derive(Debug)]
pub struct MemoryBackend {
    space: EmbeddingSpace,
    entries: Vec<IndexEntry>,
}

impl MemoryBackend {
    pub fn new(space: EmbeddingSpace) -> Self {
        Self {
            space,
            entries: Vec::new(),
        }
    }
}

impl VectorBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    fn add_documents(
        &mut self,
        space: &EmbeddingSpace,
        entries: Vec<IndexEntry>,
    ) -> AppResult<()> {
        check_batch(&self.space, space, &entries)?;
        self.entries.extend(entries);
        Ok(())
    }

    fn query(&self, embedding: &[f32], limit: usize) -> AppResult<Vec<ScoredEntry>> {
        let scored = self
            .entries
            .iter()
            .map(|entry| ScoredEntry {
                document: entry.document.clone(),
                embedding: entry.embedding.clone(),
                score: cosine_similarity(embedding, &entry.embedding),
            })
            .collect();

        Ok(top_k(scored, limit))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Document, DocumentMetadata};
    use docqa_core::AppError;

    fn space() -> EmbeddingSpace {
        EmbeddingSpace::new("test", "unit", 3)
    }

    fn entry(text: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            document: Document::new(text, DocumentMetadata::new("test")),
            embedding,
        }
    }

    #[test]
    fn test_query_orders_by_similarity() {
        let mut backend = MemoryBackend::new(space());
        backend
            .add_documents(
                &space(),
                vec![
                    entry("x", vec![1.0, 0.0, 0.0]),
                    entry("y", vec![0.0, 1.0, 0.0]),
                    entry("xy", vec![0.7, 0.7, 0.0]),
                ],
            )
            .unwrap();

        let hits = backend.query(&[1.0, 0.1, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.page_content(), "x");
        assert_eq!(hits[1].document.page_content(), "xy");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_query_limit_larger_than_index() {
        let mut backend = MemoryBackend::new(space());
        backend
            .add_documents(&space(), vec![entry("only", vec![0.0, 0.0, 1.0])])
            .unwrap();

        assert_eq!(backend.query(&[0.0, 0.0, 1.0], 10).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_other_space() {
        let mut backend = MemoryBackend::new(space());
        let other = EmbeddingSpace::new("ollama", "nomic-embed-text", 3);

        let err = backend
            .add_documents(&other, vec![entry("x", vec![1.0, 0.0, 0.0])])
            .unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
        assert!(backend.is_empty());
    }

    #[test]
    fn test_rejects_wrong_dimensions_atomically() {
        let mut backend = MemoryBackend::new(space());
        let result = backend.add_documents(
            &space(),
            vec![entry("ok", vec![1.0, 0.0, 0.0]), entry("bad", vec![1.0])],
        );

        assert!(result.is_err());
        assert_eq!(backend.len(), 0);
    }
}
