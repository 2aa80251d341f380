//! Document ingestion, vector retrieval and answer generation.
//!
//! The pipeline is:
//! 1. [`loader::Loader`] turns PDF or text files into [`Document`]s
//! 2. [`splitter::TextSplitter`] optionally cuts them into overlapping windows
//! 3. [`store::VectorStore`] embeds and indexes them in a [`backend::VectorBackend`]
//! 4. [`rag::RagChain`] retrieves context, prompts the model and extracts the answer

pub mod backend;
pub mod embeddings;
pub mod loader;
pub mod rag;
pub mod splitter;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use backend::BackendKind;
pub use embeddings::{create_provider, EmbeddingProvider, EmbeddingSpace};
pub use loader::{FileType, LoadReport, Loader};
pub use rag::{extract_answer, OfflineRag, RagChain};
pub use splitter::TextSplitter;
pub use store::{Retriever, VectorStore};
pub use types::{Document, DocumentMetadata, RetrievalQuery, SearchKwargs, SearchType};
