//! Core types for ingestion and retrieval.

use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metadata attached to every [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DocumentMetadata {
    /// Path or URL the text came from
    pub source: String,

    /// Zero-based page index for paginated sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Window index when the page was split
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<u32>,

    /// Free-form extra fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DocumentMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_chunk(mut self, chunk: u32) -> Self {
        self.chunk = Some(chunk);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A unit of ingested text plus its metadata.
///
/// Documents are immutable once created; the loader and splitter produce new
/// values instead of editing existing ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    page_content: String,
    metadata: DocumentMetadata,
}

impl Document {
    pub fn new(page_content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    pub fn page_content(&self) -> &str {
        &self.page_content
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn into_parts(self) -> (String, DocumentMetadata) {
        (self.page_content, self.metadata)
    }
}

/// How a retriever ranks candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Top-k by cosine similarity
    #[default]
    Similarity,
    /// Maximal marginal relevance over `fetch_k` candidates
    Mmr,
    /// Top-k restricted to scores at or above `score_threshold`
    SimilarityScoreThreshold,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Similarity => "similarity",
            Self::Mmr => "mmr",
            Self::SimilarityScoreThreshold => "similarity_score_threshold",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "similarity" => Ok(Self::Similarity),
            "mmr" => Ok(Self::Mmr),
            "similarity_score_threshold" => Ok(Self::SimilarityScoreThreshold),
            other => Err(AppError::InvalidInput(format!(
                "Unknown search type: {}",
                other
            ))),
        }
    }
}

pub const DEFAULT_K: usize = 10;
pub const DEFAULT_FETCH_K: usize = 20;
pub const DEFAULT_LAMBDA_MULT: f32 = 0.5;

/// Tuning parameters for a search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchKwargs {
    /// Maximum number of documents returned
    pub k: usize,
    /// Candidates fetched before MMR re-ranking
    pub fetch_k: usize,
    /// 1.0 ranks purely by relevance, 0.0 purely by diversity
    pub lambda_mult: f32,
    pub score_threshold: Option<f32>,
}

impl Default for SearchKwargs {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            fetch_k: DEFAULT_FETCH_K,
            lambda_mult: DEFAULT_LAMBDA_MULT,
            score_threshold: None,
        }
    }
}

impl SearchKwargs {
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    /// Check the parameters make sense for `search_type`.
    pub fn validate(&self, search_type: SearchType) -> AppResult<()> {
        if self.k == 0 {
            return Err(AppError::InvalidInput("k must be at least 1".to_string()));
        }

        if !(0.0..=1.0).contains(&self.lambda_mult) {
            return Err(AppError::InvalidInput(format!(
                "lambda_mult must be within [0, 1], got {}",
                self.lambda_mult
            )));
        }

        if search_type == SearchType::SimilarityScoreThreshold && self.score_threshold.is_none() {
            return Err(AppError::InvalidInput(
                "similarity_score_threshold search requires score_threshold".to_string(),
            ));
        }

        Ok(())
    }
}

/// A single retrieval request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalQuery {
    pub question: String,
    pub search_type: SearchType,
    pub kwargs: SearchKwargs,
}

impl RetrievalQuery {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            search_type: SearchType::default(),
            kwargs: SearchKwargs::default(),
        }
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn with_kwargs(mut self, kwargs: SearchKwargs) -> Self {
        self.kwargs = kwargs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_serialization_flattens_extra() {
        let metadata = DocumentMetadata::new("docs/guide.pdf")
            .with_page(3)
            .with_extra("title", serde_json::json!("Guide"));

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["source"], "docs/guide.pdf");
        assert_eq!(json["page"], 3);
        assert_eq!(json["title"], "Guide");
        assert!(json.get("chunk").is_none());
    }

    #[test]
    fn test_search_type_parse() {
        assert_eq!("mmr".parse::<SearchType>().unwrap(), SearchType::Mmr);
        assert_eq!(
            "similarity_score_threshold".parse::<SearchType>().unwrap(),
            SearchType::SimilarityScoreThreshold
        );
        assert!("nearest".parse::<SearchType>().is_err());
        assert_eq!(SearchType::default().to_string(), "similarity");
    }

    #[test]
    fn test_kwargs_defaults() {
        let kwargs = SearchKwargs::default();
        assert_eq!(kwargs.k, 10);
        assert_eq!(kwargs.fetch_k, 20);
        assert!((kwargs.lambda_mult - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_threshold_required() {
        let kwargs = SearchKwargs::default();
        assert!(matches!(
            kwargs.validate(SearchType::SimilarityScoreThreshold),
            Err(AppError::InvalidInput(_))
        ));
        assert!(kwargs
            .with_score_threshold(0.3)
            .validate(SearchType::SimilarityScoreThreshold)
            .is_ok());
    }

    #[test]
    fn test_zero_k_rejected() {
        assert!(SearchKwargs::default()
            .with_k(0)
            .validate(SearchType::Similarity)
            .is_err());
    }
}
