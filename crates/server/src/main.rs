//! docqa service
//!
//! Answers questions about a document collection over HTTP. Documents are
//! loaded from a data directory at startup and can be added later by upload
//! or URL.

mod download;
mod error;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use clap::Parser;
use docqa_core::config::{AppConfig, ConfigOverrides};
use docqa_core::{logging, AppError, AppResult};
use state::AppState;
use std::path::PathBuf;

/// Question answering over your documents
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(about = "Retrieval-augmented question answering over local documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, env = "DOCQA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "DOCQA_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "DOCQA_PORT")]
    port: Option<u16>,

    /// Directory ingested at startup
    #[arg(long, env = "DOCQA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log output format (pretty, json)
    #[arg(long, env = "DOCQA_LOG_FORMAT")]
    log_format: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, env = "DOCQA_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, env = "DOCQA_MODEL")]
    model: Option<String>,
}

impl Cli {
    fn overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            workspace: self.workspace,
            config_file: self.config,
            host: self.host,
            port: self.port,
            data_dir: self.data_dir,
            provider: self.provider,
            model: self.model,
            log_level: self.log_level,
            log_format: self.log_format,
            verbose: self.verbose,
            no_color: self.no_color,
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?
        .with_overrides(cli.overrides());
    config.validate()?;

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format()?)?;

    tracing::info!("docqa starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        embedding = %config.embedding.model,
        backend = %config.store.backend,
        "Resolved configuration"
    );

    config.ensure_docqa_dir()?;

    let state = AppState::from_config(&config)?;

    if let Some(data_dir) = &config.ingest.data_dir {
        state.ingest_startup(&config.resolve_path(data_dir)).await;
    }

    let app = routes::router(state, config.server.max_upload_bytes);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Listening on http://{}", addr);

    let result = axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Other(format!("Server error: {}", e)));

    match &result {
        Ok(_) => tracing::info!("docqa stopped"),
        Err(e) => tracing::error!("Server failed: {}", e),
    }

    result
}
