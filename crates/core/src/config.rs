//! Configuration management for docqa.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`.docqa/config.yaml` in the workspace, or `DOCQA_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Relative paths in the configuration are resolved against the workspace.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

const KNOWN_LLM_PROVIDERS: [&str; 2] = ["ollama", "openai"];
const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["ollama", "trigram"];
const KNOWN_BACKENDS: [&str; 2] = ["memory", "sqlite"];
const KNOWN_SEARCH_TYPES: [&str; 3] = ["similarity", "mmr", "similarity_score_threshold"];
const KNOWN_FILE_TYPES: [&str; 3] = ["pdf", "txt", "text"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log line format ("pretty" or "json")
    pub log_format: String,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// HTTP service settings
    pub server: ServerConfig,

    /// Language model settings
    pub llm: LlmConfig,

    /// Embedding function settings
    pub embedding: EmbeddingConfig,

    /// Vector backend settings
    pub store: StoreConfig,

    /// Default retrieval parameters
    pub retrieval: RetrievalConfig,

    /// Document ingestion settings
    pub ingest: IngestConfig,

    /// Optional YAML prompt definition replacing the built-in RAG prompt
    pub prompt_file: Option<PathBuf>,
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Where uploaded and downloaded files are written before ingestion
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub download_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            upload_dir: PathBuf::from("temp_uploads"),
            max_upload_bytes: 50 * 1024 * 1024,
            download_timeout_secs: 60,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmConfig {
    /// Provider name: "ollama" or "openai"
    pub provider: String,
    /// Base URL of the inference server (provider default when absent)
    pub endpoint: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
    /// Environment variable holding the API key (openai provider)
    pub api_key_env: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: None,
            model: "llama3.1:8b".to_string(),
            temperature: Some(0.9),
            max_tokens: None,
            timeout_secs: 120,
            api_key_env: None,
        }
    }
}

/// Embedding function configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Provider name: "ollama" or "trigram"
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub endpoint: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            endpoint: None,
        }
    }
}

/// Vector backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Backend name: "memory" or "sqlite"
    pub backend: String,
    /// Database file for the sqlite backend
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            path: PathBuf::from(".docqa/index.sqlite"),
        }
    }
}

/// Default retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// "similarity", "mmr" or "similarity_score_threshold"
    pub search_type: String,
    pub k: usize,
    pub fetch_k: usize,
    pub lambda_mult: f32,
    pub score_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_type: "similarity".to_string(),
            k: 10,
            fetch_k: 20,
            lambda_mult: 0.5,
            score_threshold: None,
        }
    }
}

/// Document ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct IngestConfig {
    /// Directory ingested at startup (skipped when missing)
    pub data_dir: Option<PathBuf>,
    /// Declared file type: "pdf" or "txt"
    pub file_type: String,
    /// Concurrent file loads during directory ingestion
    pub workers: usize,
    /// Split loaded pages into windows of this many bytes
    pub chunk_size: Option<usize>,
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: Some(PathBuf::from("data_source/generative_ai")),
            file_type: "pdf".to_string(),
            workers: 2,
            chunk_size: None,
            chunk_overlap: 0,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    server: Option<ServerConfig>,
    llm: Option<LlmConfig>,
    embedding: Option<EmbeddingConfig>,
    store: Option<StoreConfig>,
    retrieval: Option<RetrievalConfig>,
    ingest: Option<IngestConfig>,
    logging: Option<LoggingConfig>,
    prompt_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    format: Option<String>,
    color: Option<bool>,
}

/// Command-line overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workspace: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub verbose: bool,
    pub no_color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            log_format: "pretty".to_string(),
            verbose: false,
            no_color: false,
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            ingest: IngestConfig::default(),
            prompt_file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `DOCQA_WORKSPACE`: Override workspace path
    /// - `DOCQA_CONFIG`: Path to config file
    /// - `DOCQA_HOST` / `DOCQA_PORT`: Listen address
    /// - `DOCQA_PROVIDER`: LLM provider
    /// - `DOCQA_MODEL`: Model identifier
    /// - `DOCQA_DATA_DIR`: Directory ingested at startup
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use docqa_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`load`](Self::load), with an explicit workspace and config file
    /// taking precedence over `DOCQA_WORKSPACE` and `DOCQA_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var_os("DOCQA_WORKSPACE").map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var_os("DOCQA_CONFIG").map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(".docqa/config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(host) = std::env::var("DOCQA_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("DOCQA_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid DOCQA_PORT: {}", port)))?;
        }

        if let Ok(provider) = std::env::var("DOCQA_PROVIDER") {
            config.llm.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCQA_MODEL") {
            config.llm.model = model;
        }

        if let Ok(data_dir) = std::env::var("DOCQA_DATA_DIR") {
            config.ingest.data_dir = Some(PathBuf::from(data_dir));
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    ///
    /// Sections present in the file replace the corresponding section; fields
    /// missing inside a section take their defaults.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(server) = config_file.server {
            result.server = server;
        }
        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(store) = config_file.store {
            result.store = store;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(ingest) = config_file.ingest {
            result.ingest = ingest;
        }
        if let Some(prompt_file) = config_file.prompt_file {
            result.prompt_file = Some(prompt_file);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        tracing::debug!("Merged config file {:?}", path);

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the
    /// config file.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(workspace) = overrides.workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = overrides.config_file {
            self.config_file = Some(config_file);
        }

        if let Some(host) = overrides.host {
            self.server.host = host;
        }

        if let Some(port) = overrides.port {
            self.server.port = port;
        }

        if let Some(data_dir) = overrides.data_dir {
            self.ingest.data_dir = Some(data_dir);
        }

        if let Some(provider) = overrides.provider {
            self.llm.provider = provider;
        }

        if let Some(model) = overrides.model {
            self.llm.model = model;
        }

        if let Some(log_level) = overrides.log_level {
            self.log_level = Some(log_level);
        }

        if let Some(log_format) = overrides.log_format {
            self.log_format = log_format;
        }

        if overrides.verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if overrides.no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docqa directory.
    pub fn docqa_dir(&self) -> PathBuf {
        self.workspace.join(".docqa")
    }

    /// Ensure the .docqa directory exists.
    pub fn ensure_docqa_dir(&self) -> AppResult<()> {
        let docqa_dir = self.docqa_dir();
        if !docqa_dir.exists() {
            std::fs::create_dir_all(&docqa_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docqa directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve a configured path against the workspace.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Parsed log format.
    pub fn log_format(&self) -> AppResult<LogFormat> {
        LogFormat::parse(&self.log_format)
            .ok_or_else(|| AppError::Config(format!("Unknown log format: {}", self.log_format)))
    }

    /// Resolve the LLM API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.llm
            .api_key_env
            .as_ref()
            .and_then(|env_var| std::env::var(env_var).ok())
    }

    /// Validate the configuration before the service starts.
    pub fn validate(&self) -> AppResult<()> {
        ensure_known("LLM provider", &self.llm.provider, &KNOWN_LLM_PROVIDERS)?;
        ensure_known(
            "embedding provider",
            &self.embedding.provider,
            &KNOWN_EMBEDDING_PROVIDERS,
        )?;
        ensure_known("store backend", &self.store.backend, &KNOWN_BACKENDS)?;
        ensure_known(
            "search type",
            &self.retrieval.search_type,
            &KNOWN_SEARCH_TYPES,
        )?;
        ensure_known("file type", &self.ingest.file_type, &KNOWN_FILE_TYPES)?;
        self.log_format()?;

        if self.llm.provider == "openai" {
            match self.llm.api_key_env.as_deref() {
                Some(env_var) if std::env::var(env_var).is_err() => {
                    return Err(AppError::Config(format!(
                        "API key not found in environment variable: {}",
                        env_var
                    )));
                }
                None if self.llm.endpoint.is_none() => {
                    return Err(AppError::Config(
                        "The openai provider needs llm.apiKeyEnv or a self-hosted llm.endpoint"
                            .to_string(),
                    ));
                }
                _ => {}
            }
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }

        if self.retrieval.k == 0 {
            return Err(AppError::Config(
                "retrieval.k must be greater than zero".to_string(),
            ));
        }

        if self.retrieval.search_type == "similarity_score_threshold"
            && self.retrieval.score_threshold.is_none()
        {
            return Err(AppError::Config(
                "retrieval.scoreThreshold is required for similarity_score_threshold".to_string(),
            ));
        }

        if self.ingest.workers == 0 {
            return Err(AppError::Config(
                "ingest.workers must be greater than zero".to_string(),
            ));
        }

        if let Some(chunk_size) = self.ingest.chunk_size {
            if chunk_size == 0 || self.ingest.chunk_overlap >= chunk_size {
                return Err(AppError::Config(format!(
                    "ingest.chunkOverlap ({}) must be smaller than a non-zero ingest.chunkSize ({})",
                    self.ingest.chunk_overlap, chunk_size
                )));
            }
        }

        Ok(())
    }
}

fn ensure_known(what: &str, value: &str, known: &[&str]) -> AppResult<()> {
    if known.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown {}: {}. Supported: {}",
            what,
            value,
            known.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.retrieval.k, 10);
        assert_eq!(config.ingest.workers, 2);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_docqa_dir() {
        let config = AppConfig::default();
        assert!(config.docqa_dir().ends_with(".docqa"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(ConfigOverrides {
            port: Some(9000),
            provider: Some("openai".to_string()),
            model: Some("gpt-4o-mini".to_string()),
            verbose: true,
            ..Default::default()
        });

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(config.verbose);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_partial_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
server:
  port: 9100
embedding:
  provider: trigram
  model: trigram-v1
  dimensions: 384
retrieval:
  searchType: mmr
  k: 4
logging:
  format: json
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.server.port, 9100);
        assert_eq!(merged.server.host, "0.0.0.0");
        assert_eq!(merged.embedding.provider, "trigram");
        assert_eq!(merged.retrieval.search_type, "mmr");
        assert_eq!(merged.retrieval.k, 4);
        assert_eq!(merged.retrieval.fetch_k, 20);
        assert_eq!(merged.log_format, "json");
        assert!(merged.no_color);
        assert_eq!(merged.llm, LlmConfig::default());
    }

    #[test]
    fn test_load_from_workspace_config() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".docqa")).unwrap();
        std::fs::write(
            temp.path().join(".docqa/config.yaml"),
            "store:\n  backend: sqlite\nretrieval:\n  fetchK: 40\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(temp.path().to_path_buf()), None).unwrap();
        assert_eq!(config.workspace, temp.path());
        assert_eq!(config.store.backend, "sqlite");
        assert_eq!(config.retrieval.fetch_k, 40);

        let missing = AppConfig::load_from(
            Some(temp.path().to_path_buf()),
            Some(temp.path().join("absent.yaml")),
        );
        assert!(matches!(missing, Err(AppError::Config(_))));
    }

    #[test]
    fn test_merge_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "server: [not, a, map]").unwrap();

        assert!(AppConfig::default().merge_yaml(&path).is_err());
    }

    #[test]
    fn test_resolve_path() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/docqa");
        assert_eq!(
            config.resolve_path(Path::new("temp_uploads")),
            PathBuf::from("/srv/docqa/temp_uploads")
        );
        assert_eq!(
            config.resolve_path(Path::new("/tmp/x")),
            PathBuf::from("/tmp/x")
        );
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.llm.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_threshold_required() {
        let mut config = AppConfig::default();
        config.retrieval.search_type = "similarity_score_threshold".to_string();
        assert!(config.validate().is_err());

        config.retrieval.score_threshold = Some(0.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_chunk_overlap() {
        let mut config = AppConfig::default();
        config.ingest.chunk_size = Some(300);
        config.ingest.chunk_overlap = 300;
        assert!(config.validate().is_err());

        config.ingest.chunk_overlap = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = AppConfig::default();
        config.ingest.workers = 0;
        assert!(config.validate().is_err());
    }
}
