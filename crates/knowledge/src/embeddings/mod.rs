//! Embedding providers and the embedding-space identity they produce.

pub mod provider;
pub mod providers;
pub mod space;

pub use provider::{create_provider, EmbeddingProvider};
pub use space::EmbeddingSpace;
