//! The retrieval-augmented answering chain.

use crate::rag::answer::extract_answer;
use crate::store::Retriever;
use crate::types::Document;
use docqa_core::{AppError, AppResult};
use docqa_llm::{LlmClient, LlmRequest};
use docqa_prompt::{build_rag_prompt, PromptDefinition};
use std::sync::Arc;

/// Language model, prompt and generation settings shared by every chain.
///
/// Holds no retriever; [`OfflineRag::chain`] binds one per request so each
/// chain sees the store as it is when the question arrives.
pub struct OfflineRag {
    llm: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OfflineRag {
    pub fn new(llm: Arc<dyn LlmClient>, prompt: PromptDefinition, model: impl Into<String>) -> Self {
        Self {
            llm,
            prompt,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn prompt(&self) -> &PromptDefinition {
        &self.prompt
    }

    /// Bind a retriever. `None` (nothing ingested yet) yields a chain whose
    /// `invoke` fails with `AppError::NotReady`.
    pub fn chain(&self, retriever: Option<Retriever>) -> RagChain<'_> {
        RagChain {
            rag: self,
            retriever,
        }
    }

    fn request(&self, prompt: String) -> LlmRequest {
        let mut request = LlmRequest::new(prompt, &self.model);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

impl std::fmt::Debug for OfflineRag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineRag")
            .field("provider", &self.llm.provider_name())
            .field("model", &self.model)
            .field("prompt", &self.prompt.id)
            .finish()
    }
}

/// Retriever, prompt and model bound together for one question.
#[derive(Debug)]
pub struct RagChain<'a> {
    rag: &'a OfflineRag,
    retriever: Option<Retriever>,
}

impl RagChain<'_> {
    /// Answer `question` from retrieved context.
    #[tracing::instrument(skip(self), fields(model = %self.rag.model))]
    pub async fn invoke(&self, question: &str) -> AppResult<String> {
        if question.trim().is_empty() {
            return Err(AppError::InvalidInput("Question must not be empty".to_string()));
        }

        let retriever = self.retriever.as_ref().ok_or_else(|| {
            AppError::NotReady(
                "No documents have been ingested yet; update the database first".to_string(),
            )
        })?;

        let documents = retriever.invoke(question).await?;
        let context = format_docs(&documents);
        tracing::debug!(
            documents = documents.len(),
            context_len = context.len(),
            "Built context"
        );

        let built = build_rag_prompt(&self.rag.prompt, &context, question)?;
        let mut request = self.rag.request(built.user);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        let response = self.rag.llm.complete(&request).await?;
        let answer = extract_answer(&response.content);

        tracing::info!(
            provider = self.rag.llm.provider_name(),
            answer_len = answer.len(),
            "Answered question"
        );
        Ok(answer)
    }
}

/// Join page contents with a blank line between documents.
pub fn format_docs(documents: &[Document]) -> String {
    documents
        .iter()
        .map(Document::page_content)
        .collect::<Vec<_>>()
        .join("\n\n")
}
