//! Retrieval-augmented answering.
//!
//! [`chain::RagChain`] retrieves context for a question, renders the prompt,
//! makes one completion call and hands the output to [`answer::extract_answer`].

pub mod answer;
pub mod chain;

pub use answer::{extract_answer, extract_answer_with};
pub use chain::{format_docs, OfflineRag, RagChain};
