//! Prompt system for docqa.
//!
//! This crate provides the RAG prompt used to turn retrieved context and a
//! question into model input:
//! - A built-in prompt matching the widely used `rag-prompt` wording
//! - YAML-based prompt definitions that can replace it
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::{build_prompt, build_rag_prompt};
pub use loader::{default_rag_prompt, load_prompt_file, validate_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
