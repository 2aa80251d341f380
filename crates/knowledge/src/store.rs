//! The vector store: embedding, indexing and retrieval over a shared index.
//!
//! The index starts absent and is built by the first [`VectorStore::update_db`]
//! call; later calls append. It lives behind a `tokio::sync::RwLock` so a
//! single writer can update it while any number of [`Retriever`]s read.

use crate::backend::{cosine_similarity, BackendKind, IndexEntry, ScoredEntry, VectorBackend};
use crate::embeddings::{EmbeddingProvider, EmbeddingSpace};
use crate::types::{Document, RetrievalQuery, SearchKwargs, SearchType};
use docqa_core::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::RwLock;

type SharedIndex = Arc<RwLock<Option<Box<dyn VectorBackend>>>>;

/// Embeds documents and keeps them searchable.
pub struct VectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    backend: BackendKind,
    space: EmbeddingSpace,
    index: SharedIndex,
}

impl VectorStore {
    /// Create a store with no index; the first `update_db` builds one.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, backend: BackendKind) -> Self {
        let space = EmbeddingSpace::of(embedder.as_ref());
        Self {
            embedder,
            backend,
            space,
            index: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a store, reopening a persisted index when the backend has one.
    ///
    /// Fails with `AppError::Embedding` if the persisted index was built in a
    /// different embedding space.
    pub fn open(embedder: Arc<dyn EmbeddingProvider>, backend: BackendKind) -> AppResult<Self> {
        let store = Self::new(embedder, backend);
        let existing = store.backend.open_existing(&store.space)?;
        Ok(Self {
            index: Arc::new(RwLock::new(existing)),
            ..store
        })
    }

    pub fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    pub fn backend_kind(&self) -> &BackendKind {
        &self.backend
    }

    /// Number of indexed documents (0 before the first update).
    pub async fn len(&self) -> usize {
        self.index.read().await.as_ref().map_or(0, |b| b.len())
    }

    pub async fn is_built(&self) -> bool {
        self.index.read().await.is_some()
    }

    /// Embed and index `documents`, building the index on first use.
    ///
    /// Returns the number of documents added. An empty batch fails with
    /// `AppError::InvalidInput` and leaves the index untouched.
    #[tracing::instrument(skip(self, documents), fields(batch = documents.len()))]
    pub async fn update_db(&self, documents: Vec<Document>) -> AppResult<usize> {
        if documents.is_empty() {
            return Err(AppError::InvalidInput(
                "Cannot update the database with an empty document list".to_string(),
            ));
        }

        let texts: Vec<String> = documents
            .iter()
            .map(|d| d.page_content().to_string())
            .collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(AppError::Embedding(format!(
                "Provider returned {} embeddings for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        let entries: Vec<IndexEntry> = documents
            .into_iter()
            .zip(embeddings)
            .map(|(document, embedding)| IndexEntry {
                document,
                embedding,
            })
            .collect();
        let added = entries.len();

        let mut guard = Arc::clone(&self.index).write_owned().await;
        let kind = self.backend.clone();
        let space = self.space.clone();
        let total = blocking(move || {
            match guard.as_mut() {
                Some(backend) => backend.add_documents(&space, entries)?,
                None => {
                    tracing::info!(backend = kind.name(), space = %space, "Building index");
                    *guard = Some(kind.build(&space, entries)?);
                }
            }
            Ok(guard.as_ref().map_or(0, |b| b.len()))
        })
        .await?;

        tracing::info!(added, total, "Updated vector store");
        Ok(added)
    }

    /// A retriever over the current index, or `None` before the first update.
    ///
    /// `k` defaults to 10.
    pub async fn get_retriever(&self, search_type: SearchType, k: Option<usize>) -> Option<Retriever> {
        let kwargs = SearchKwargs::default().with_k(k.unwrap_or(crate::types::DEFAULT_K));
        self.get_retriever_with(search_type, kwargs).await
    }

    /// Like [`get_retriever`](Self::get_retriever) with full search parameters.
    pub async fn get_retriever_with(
        &self,
        search_type: SearchType,
        kwargs: SearchKwargs,
    ) -> Option<Retriever> {
        if !self.is_built().await {
            return None;
        }

        Some(Retriever {
            index: Arc::clone(&self.index),
            embedder: Arc::clone(&self.embedder),
            search_type,
            kwargs,
        })
    }

    /// Run a one-off query against the index.
    pub async fn search(&self, query: &RetrievalQuery) -> AppResult<Vec<Document>> {
        Ok(self
            .search_with_scores(query)
            .await?
            .into_iter()
            .map(|(document, _)| document)
            .collect())
    }

    /// Run a one-off query and keep the similarity scores.
    pub async fn search_with_scores(&self, query: &RetrievalQuery) -> AppResult<Vec<(Document, f32)>> {
        run_query(
            &self.index,
            self.embedder.as_ref(),
            &query.question,
            query.search_type,
            &query.kwargs,
        )
        .await
    }
}

/// A query function bound to a store's index.
///
/// Retrievers share the index with the store, so documents appended after
/// the retriever was created are visible to it.
#[derive(Clone)]
pub struct Retriever {
    index: SharedIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    search_type: SearchType,
    kwargs: SearchKwargs,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("search_type", &self.search_type)
            .field("kwargs", &self.kwargs)
            .finish()
    }
}

impl Retriever {
    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    pub fn kwargs(&self) -> &SearchKwargs {
        &self.kwargs
    }

    /// Return up to `k` documents relevant to `question`.
    pub async fn invoke(&self, question: &str) -> AppResult<Vec<Document>> {
        Ok(self
            .invoke_with_scores(question)
            .await?
            .into_iter()
            .map(|(document, _)| document)
            .collect())
    }

    pub async fn invoke_with_scores(&self, question: &str) -> AppResult<Vec<(Document, f32)>> {
        run_query(
            &self.index,
            self.embedder.as_ref(),
            question,
            self.search_type,
            &self.kwargs,
        )
        .await
    }
}

async fn run_query(
    index: &SharedIndex,
    embedder: &dyn EmbeddingProvider,
    question: &str,
    search_type: SearchType,
    kwargs: &SearchKwargs,
) -> AppResult<Vec<(Document, f32)>> {
    kwargs.validate(search_type)?;

    let query_embedding = embedder.embed(question).await?;

    let guard = Arc::clone(index).read_owned().await;
    let kwargs = *kwargs;
    let hits = blocking(move || {
        let backend = guard
            .as_ref()
            .ok_or_else(|| AppError::NotReady("No documents have been ingested yet".to_string()))?;

        Ok(match search_type {
            SearchType::Similarity => backend.query(&query_embedding, kwargs.k)?,
            SearchType::SimilarityScoreThreshold => {
                let threshold = kwargs.score_threshold.unwrap_or(f32::MIN);
                backend
                    .query(&query_embedding, kwargs.k)?
                    .into_iter()
                    .filter(|hit| hit.score >= threshold)
                    .collect()
            }
            SearchType::Mmr => {
                let candidates = backend.query(&query_embedding, kwargs.fetch_k.max(kwargs.k))?;
                mmr_select(candidates, kwargs.k, kwargs.lambda_mult)
            }
        })
    })
    .await?;

    tracing::debug!(
        search_type = %search_type,
        k = kwargs.k,
        hits = hits.len(),
        "Retrieved documents"
    );

    Ok(hits.into_iter().map(|hit| (hit.document, hit.score)).collect())
}

/// Run backend work on the blocking pool; the SQLite backend does file I/O
/// and every query scores the whole table.
async fn blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Storage(format!("Index task failed: {}", e)))?
}

/// Greedy maximal marginal relevance over pre-scored candidates.
///
/// Each step picks the candidate maximising
/// `lambda * sim(query, c) - (1 - lambda) * max(sim(c, selected))`.
fn mmr_select(candidates: Vec<ScoredEntry>, k: usize, lambda_mult: f32) -> Vec<ScoredEntry> {
    let mut remaining = candidates;
    let mut selected: Vec<ScoredEntry> = Vec::with_capacity(k.min(remaining.len()));

    while selected.len() < k && !remaining.is_empty() {
        let mut best_index = 0;
        let mut best_value = f32::NEG_INFINITY;

        for (i, candidate) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|s| cosine_similarity(&candidate.embedding, &s.embedding))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };

            let value = lambda_mult * candidate.score - (1.0 - lambda_mult) * redundancy;
            if value > best_value {
                best_value = value;
                best_index = i;
            }
        }

        selected.push(remaining.remove(best_index));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::types::DocumentMetadata;
    use tempfile::TempDir;

    fn store() -> VectorStore {
        VectorStore::new(Arc::new(TrigramProvider::new(256)), BackendKind::Memory)
    }

    fn doc(text: &str) -> Document {
        Document::new(text, DocumentMetadata::new("test.txt"))
    }

    fn corpus() -> Vec<Document> {
        vec![
            doc("The sky is blue."),
            doc("Grass is green in spring."),
            doc("Rust guarantees memory safety without garbage collection."),
            doc("Bananas are yellow when ripe."),
        ]
    }

    #[tokio::test]
    async fn test_update_then_exact_match() {
        let store = store();
        assert_eq!(store.update_db(corpus()).await.unwrap(), 4);

        let retriever = store.get_retriever(SearchType::Similarity, Some(1)).await.unwrap();
        let docs = retriever
            .invoke("Rust guarantees memory safety without garbage collection.")
            .await
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].page_content(),
            "Rust guarantees memory safety without garbage collection."
        );
    }

    #[tokio::test]
    async fn test_empty_update_rejected_without_state_change() {
        let store = store();
        let err = store.update_db(Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(!store.is_built().await);

        store.update_db(vec![doc("one")]).await.unwrap();
        assert!(store.update_db(Vec::new()).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_no_retriever_before_ingestion() {
        let store = store();
        assert!(store.get_retriever(SearchType::Similarity, None).await.is_none());

        let err = store.search(&RetrievalQuery::new("anything")).await.unwrap_err();
        assert!(matches!(err, AppError::NotReady(_)));
    }

    #[tokio::test]
    async fn test_result_count_bounded_by_k_and_len() {
        let store = store();
        store.update_db(corpus()).await.unwrap();

        let two = store.get_retriever(SearchType::Similarity, Some(2)).await.unwrap();
        assert_eq!(two.invoke("blue sky").await.unwrap().len(), 2);

        let many = store.get_retriever(SearchType::Similarity, None).await.unwrap();
        assert_eq!(many.kwargs().k, 10);
        assert_eq!(many.invoke("blue sky").await.unwrap().len(), 4);

        let mmr = store.get_retriever(SearchType::Mmr, Some(3)).await.unwrap();
        assert_eq!(mmr.invoke("blue sky").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retrievers_are_consistent() {
        let store = store();
        store.update_db(corpus()).await.unwrap();

        let a = store.get_retriever(SearchType::Similarity, Some(3)).await.unwrap();
        let b = store.get_retriever(SearchType::Similarity, Some(3)).await.unwrap();

        assert_eq!(
            a.invoke("green grass").await.unwrap(),
            b.invoke("green grass").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_append_keeps_existing_entries_and_is_visible() {
        let store = store();
        store.update_db(vec![doc("The sky is blue.")]).await.unwrap();
        let retriever = store.get_retriever(SearchType::Similarity, Some(5)).await.unwrap();

        store.update_db(vec![doc("Oceans are deep.")]).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(retriever.invoke("sky").await.unwrap().len(), 2);
    }

    async fn concurrent_updates_and_reads(store: VectorStore) {
        const WRITERS: usize = 8;
        const BATCH: usize = 5;

        let store = Arc::new(store);
        store.update_db(vec![doc("seed entry")]).await.unwrap();
        let retriever = store.get_retriever(SearchType::Similarity, Some(3)).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for writer in 0..WRITERS {
            let store = Arc::clone(&store);
            tasks.spawn(async move {
                let batch = (0..BATCH)
                    .map(|i| doc(&format!("writer {} recorded fact {}", writer, i)))
                    .collect();
                assert_eq!(store.update_db(batch).await.unwrap(), BATCH);
            });
            let retriever = retriever.clone();
            tasks.spawn(async move {
                for _ in 0..BATCH {
                    let hits = retriever.invoke("recorded fact").await.unwrap();
                    assert!(!hits.is_empty() && hits.len() <= 3);
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        let total = 1 + WRITERS * BATCH;
        assert_eq!(store.len().await, total);

        let all = store
            .search(&RetrievalQuery::new("recorded fact").with_kwargs(SearchKwargs::default().with_k(total)))
            .await
            .unwrap();
        let contents: std::collections::HashSet<String> =
            all.iter().map(|d| d.page_content().to_string()).collect();
        assert_eq!(contents.len(), total);
        for writer in 0..WRITERS {
            for i in 0..BATCH {
                assert!(contents.contains(&format!("writer {} recorded fact {}", writer, i)));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_lose_nothing() {
        concurrent_updates_and_reads(store()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_lose_nothing_sqlite() {
        let temp = TempDir::new().unwrap();
        let backend = BackendKind::Sqlite {
            path: temp.path().join("index.db"),
        };
        let store = VectorStore::new(Arc::new(TrigramProvider::new(256)), backend);
        concurrent_updates_and_reads(store).await;
    }

    #[tokio::test]
    async fn test_score_threshold_filters() {
        let store = store();
        store.update_db(corpus()).await.unwrap();

        let strict = store
            .get_retriever_with(
                SearchType::SimilarityScoreThreshold,
                SearchKwargs::default().with_score_threshold(0.99),
            )
            .await
            .unwrap();
        let docs = strict.invoke("Bananas are yellow when ripe.").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page_content(), "Bananas are yellow when ripe.");

        let missing = store
            .get_retriever(SearchType::SimilarityScoreThreshold, Some(2))
            .await
            .unwrap();
        assert!(matches!(
            missing.invoke("bananas").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_search_with_query() {
        let store = store();
        store.update_db(corpus()).await.unwrap();

        let query = RetrievalQuery::new("Grass is green in spring.")
            .with_kwargs(SearchKwargs::default().with_k(1));
        let hits = store.search_with_scores(&query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].1 - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_mmr_prefers_diverse_results() {
        let entry = |text: &str, embedding: Vec<f32>, score: f32| ScoredEntry {
            document: doc(text),
            embedding,
            score,
        };
        let candidates = vec![
            entry("a", vec![1.0, 0.0], 0.99),
            entry("a-duplicate", vec![1.0, 0.0], 0.98),
            entry("b", vec![0.0, 1.0], 0.60),
        ];

        let picked = mmr_select(candidates, 2, 0.5);
        let texts: Vec<_> = picked.iter().map(|e| e.document.page_content()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_mmr_lambda_one_is_relevance_order() {
        let entry = |text: &str, embedding: Vec<f32>, score: f32| ScoredEntry {
            document: doc(text),
            embedding,
            score,
        };
        let candidates = vec![
            entry("a", vec![1.0, 0.0], 0.99),
            entry("a-duplicate", vec![1.0, 0.0], 0.98),
            entry("b", vec![0.0, 1.0], 0.60),
        ];

        let picked = mmr_select(candidates, 2, 1.0);
        assert_eq!(picked[1].document.page_content(), "a-duplicate");
    }

    #[tokio::test]
    async fn test_open_reuses_persisted_sqlite_index() {
        let temp = TempDir::new().unwrap();
        let backend = BackendKind::Sqlite {
            path: temp.path().join("index.sqlite"),
        };
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(64));

        let first = VectorStore::open(Arc::clone(&embedder), backend.clone()).unwrap();
        assert!(!first.is_built().await);
        first.update_db(corpus()).await.unwrap();
        drop(first);

        let second = VectorStore::open(embedder, backend.clone()).unwrap();
        assert_eq!(second.len().await, 4);

        let other: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(32));
        assert!(matches!(
            VectorStore::open(other, backend),
            Err(AppError::Embedding(_))
        ));
    }
}
