//! Shared state handed to every request handler.

use docqa_core::{AppConfig, AppError, AppResult};
use docqa_knowledge::{
    create_provider, BackendKind, Document, FileType, Loader, OfflineRag, SearchKwargs,
    SearchType, TextSplitter, VectorStore,
};
use docqa_llm::create_client;
use docqa_prompt::{default_rag_prompt, load_prompt_file};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<VectorStore>,
    pub rag: Arc<OfflineRag>,
    pub loader: Loader,
    pub splitter: Option<TextSplitter>,
    pub upload_dir: PathBuf,
    /// Cap on URL downloads, shared with the multipart upload limit
    pub max_download_bytes: usize,
    pub search_type: SearchType,
    pub search_kwargs: SearchKwargs,
    pub http: reqwest::Client,
}

impl AppState {
    /// Wire up embeddings, the store, the model and the prompt from `config`.
    ///
    /// A persisted index is reopened; nothing is ingested here.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let embedder = create_provider(&config.embedding)?;
        let backend =
            BackendKind::from_name(&config.store.backend, config.resolve_path(&config.store.path))?;
        let store = VectorStore::open(embedder, backend)?;

        let api_key = config.resolve_api_key();
        let llm = create_client(
            &config.llm.provider,
            config.llm.endpoint.as_deref(),
            api_key.as_deref(),
            Duration::from_secs(config.llm.timeout_secs),
        )?;

        let prompt = match &config.prompt_file {
            Some(path) => load_prompt_file(&config.resolve_path(path))?,
            None => default_rag_prompt(),
        };
        tracing::debug!(prompt = %prompt.id, "Using prompt");

        let rag = OfflineRag::new(llm, prompt, &config.llm.model)
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens);

        let file_type: FileType = config.ingest.file_type.parse()?;
        let loader = Loader::new(file_type).with_workers(config.ingest.workers);
        let splitter = config
            .ingest
            .chunk_size
            .map(|size| TextSplitter::new(size, config.ingest.chunk_overlap))
            .transpose()?;

        let search_type: SearchType = config.retrieval.search_type.parse()?;
        let search_kwargs = SearchKwargs {
            k: config.retrieval.k,
            fetch_k: config.retrieval.fetch_k,
            lambda_mult: config.retrieval.lambda_mult,
            score_threshold: config.retrieval.score_threshold,
        };
        search_kwargs.validate(search_type)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.download_timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            rag: Arc::new(rag),
            loader,
            splitter,
            upload_dir: config.resolve_path(&config.server.upload_dir),
            max_download_bytes: config.server.max_upload_bytes,
            search_type,
            search_kwargs,
            http,
        })
    }

    /// Split (when configured) and index `documents`.
    ///
    /// Returns the number of documents handed in, before splitting.
    pub async fn ingest(&self, documents: Vec<Document>) -> AppResult<usize> {
        let loaded = documents.len();
        let documents = match &self.splitter {
            Some(splitter) => splitter.split_documents(documents),
            None => documents,
        };
        self.store.update_db(documents).await?;
        Ok(loaded)
    }

    /// Answer a question against the current index.
    pub async fn answer(&self, question: &str) -> AppResult<String> {
        let retriever = self
            .store
            .get_retriever_with(self.search_type, self.search_kwargs)
            .await;
        self.rag.chain(retriever).invoke(question).await
    }

    /// Load and index `data_dir` at startup.
    ///
    /// Never fails: a missing directory, an empty load or an indexing error is
    /// logged and the service starts with whatever index it already has.
    pub async fn ingest_startup(&self, data_dir: &Path) {
        if !data_dir.is_dir() {
            tracing::info!(dir = %data_dir.display(), "No startup data directory; skipping ingestion");
            return;
        }

        let report = match self.loader.load_dir(data_dir).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "Startup ingestion failed");
                return;
            }
        };

        if report.documents.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "Startup ingestion found no documents");
            return;
        }

        match self.ingest(report.documents).await {
            Ok(pages) => tracing::info!(
                pages,
                files = report.files_loaded,
                failures = report.failures.len(),
                "Startup ingestion complete"
            ),
            Err(e) => tracing::warn!(error = %e, "Startup ingestion failed"),
        }
    }
}
