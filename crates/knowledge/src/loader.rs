//! Document loading from PDF and plain-text files.
//!
//! Single-file loads fail fast. Directory loads run files through a bounded
//! pool of blocking tasks and report per-file failures without aborting.

use crate::types::{Document, DocumentMetadata};
use docqa_core::{AppError, AppResult};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// Declared type of the files a [`Loader`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Text,
}

impl FileType {
    /// File extensions matched in directory mode.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Pdf => &["pdf"],
            Self::Text => &["txt", "text", "md"],
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions().contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => f.write_str("pdf"),
            Self::Text => f.write_str("txt"),
        }
    }
}

impl FromStr for FileType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" | "text" => Ok(Self::Text),
            other => Err(AppError::InvalidInput(format!(
                "Unsupported file type: {}",
                other
            ))),
        }
    }
}

/// A file skipped during a directory load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailureEntry {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a directory load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub failures: Vec<LoadFailureEntry>,
    pub files_loaded: usize,
}

/// Loads files of one declared type into [`Document`]s.
#[derive(Debug, Clone)]
pub struct Loader {
    file_type: FileType,
    workers: usize,
}

impl Loader {
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            workers: 1,
        }
    }

    /// Set the number of files loaded concurrently in directory mode.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Load exactly one file.
    pub async fn load(&self, path: &Path) -> AppResult<Vec<Document>> {
        let file_type = self.file_type;
        let owned = path.to_path_buf();
        let documents = tokio::task::spawn_blocking(move || load_file(file_type, &owned))
            .await
            .map_err(|e| parser_crashed(path, e))??;

        tracing::info!(
            path = %path.display(),
            documents = documents.len(),
            "Loaded file"
        );
        Ok(documents)
    }

    /// Load every matching file below `dir`.
    pub async fn load_dir(&self, dir: &Path) -> AppResult<LoadReport> {
        if !dir.is_dir() {
            return Err(AppError::load_failure(
                dir.display().to_string(),
                "not a directory",
            ));
        }

        let paths = discover_files(dir, self.file_type);
        tracing::info!(
            dir = %dir.display(),
            files = paths.len(),
            workers = self.workers,
            "Loading directory"
        );

        let file_type = self.file_type;
        let results: Vec<(PathBuf, AppResult<Vec<Document>>)> = stream::iter(paths)
            .map(|path| async move {
                let task_path = path.clone();
                let result =
                    tokio::task::spawn_blocking(move || load_file(file_type, &task_path))
                        .await
                        .map_err(|e| parser_crashed(&path, e))
                        .and_then(|r| r);
                (path, result)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = LoadReport::default();
        for (path, result) in results {
            match result {
                Ok(documents) => {
                    report.files_loaded += 1;
                    report.documents.extend(documents);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping file");
                    report.failures.push(LoadFailureEntry {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            files = report.files_loaded,
            documents = report.documents.len(),
            failures = report.failures.len(),
            "Directory load finished"
        );

        Ok(report)
    }
}

/// A panicked loader task counts as a parse failure; pdf-extract panics on
/// some malformed font dictionaries.
fn parser_crashed(path: &Path, err: tokio::task::JoinError) -> AppError {
    AppError::load_failure(
        path.display().to_string(),
        format!("parser panicked: {}", err),
    )
}

fn discover_files(dir: &Path, file_type: FileType) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && file_type.matches(e.path()))
        .map(|e| e.into_path())
        .collect();
    paths.sort();
    paths
}

fn load_file(file_type: FileType, path: &Path) -> AppResult<Vec<Document>> {
    match file_type {
        FileType::Pdf => load_pdf(path),
        FileType::Text => load_text(path),
    }
}

fn load_text(path: &Path) -> AppResult<Vec<Document>> {
    let source = path.display().to_string();
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::load_failure(&source, e.to_string()))?;

    if text.trim().is_empty() {
        return Err(AppError::load_failure(source, "file contains no text"));
    }

    Ok(vec![Document::new(text, DocumentMetadata::new(source))])
}

fn load_pdf(path: &Path) -> AppResult<Vec<Document>> {
    let source = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| AppError::load_failure(&source, e.to_string()))?;

    let pdf = lopdf::Document::load_mem(&bytes)
        .map_err(|e| AppError::load_failure(&source, format!("invalid PDF: {}", e)))?;

    let mut documents = Vec::new();
    for page_number in pdf.get_pages().keys() {
        match pdf.extract_text(&[*page_number]) {
            Ok(text) if !text.trim().is_empty() => {
                let metadata = DocumentMetadata::new(&source).with_page(page_number - 1);
                documents.push(Document::new(text.trim(), metadata));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(path = %source, page = page_number, error = %e, "No text on page");
            }
        }
    }

    if !documents.is_empty() {
        return Ok(documents);
    }

    // Some encodings only decode through the whole-document extractor
    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| AppError::load_failure(&source, format!("text extraction failed: {}", e)))?;
    if text.trim().is_empty() {
        return Err(AppError::load_failure(source, "no extractable text"));
    }

    Ok(vec![Document::new(
        text.trim(),
        DocumentMetadata::new(source).with_page(0),
    )])
}
