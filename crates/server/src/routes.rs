//! HTTP routes.

use crate::download::download_pdf;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use docqa_core::{AppError, AppResult};
use docqa_knowledge::{FileType, Loader};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct InvokeResponse {
    pub output: String,
}

#[derive(Debug, Deserialize)]
pub struct UrlForm {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn updated(pages: usize, suffix: &str) -> Self {
        Self {
            status: format!(
                "Successfully updated the database with {} page{}.",
                pages, suffix
            ),
        }
    }
}

/// Build the service router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/check", get(check))
        .route("/generative_ai", post(generative_ai))
        .route("/generative_ai/playground", get(playground))
        .route("/generative_ai/invoke", post(invoke))
        .route(
            "/update_db/upload",
            post(update_db_upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/update_db/url", post(update_db_url))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// GET /check
async fn check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /generative_ai
async fn generative_ai(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> ApiResult<AnswerResponse> {
    let answer = state.answer(&request.question).await?;
    Ok(Json(AnswerResponse { answer }))
}

/// POST /generative_ai/invoke
async fn invoke(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> ApiResult<InvokeResponse> {
    let output = state.answer(&request.input).await?;
    Ok(Json(InvokeResponse { output }))
}

/// POST /update_db/upload
async fn update_db_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<StatusResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .and_then(base_name)
            .ok_or_else(|| AppError::InvalidInput("Uploaded file has no usable name".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read upload: {}", e)))?;

        let path = save_upload(&state.upload_dir, &file_name, &data).await?;
        tracing::info!(path = %path.display(), bytes = data.len(), "Saved upload");

        let documents = state.loader.load(&path).await?;
        let pages = state.ingest(documents).await?;
        return Ok(Json(StatusResponse::updated(pages, "")));
    }

    Err(AppError::InvalidInput("Missing multipart field 'file'".to_string()).into())
}

/// POST /update_db/url
async fn update_db_url(
    State(state): State<AppState>,
    Form(form): Form<UrlForm>,
) -> ApiResult<StatusResponse> {
    let path = download_pdf(
        &state.http,
        &form.url,
        &state.upload_dir,
        state.max_download_bytes,
    )
    .await?;
    let documents = Loader::new(FileType::Pdf).load(&path).await?;
    let pages = state.ingest(documents).await?;
    Ok(Json(StatusResponse::updated(pages, " from URL")))
}

/// GET /generative_ai/playground
async fn playground() -> Html<&'static str> {
    Html(PLAYGROUND_HTML)
}

/// Last path component of a client-supplied file name.
fn base_name(name: &str) -> Option<String> {
    name.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(str::to_string)
}

async fn save_upload(dir: &Path, file_name: &str, data: &[u8]) -> AppResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, data).await?;
    Ok(path)
}

const PLAYGROUND_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>docqa playground</title>
  <style>
    body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; }
    textarea { width: 100%; }
    pre { white-space: pre-wrap; background: #f4f4f4; padding: 1rem; }
  </style>
</head>
<body>
  <h1>docqa playground</h1>
  <form id="ask">
    <textarea id="input" rows="4" placeholder="Ask a question about the ingested documents"></textarea>
    <button type="submit">Invoke</button>
  </form>
  <pre id="output"></pre>
  <script>
    document.getElementById("ask").addEventListener("submit", async (event) => {
      event.preventDefault();
      const output = document.getElementById("output");
      output.textContent = "...";
      const response = await fetch("invoke", {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify({ input: document.getElementById("input").value }),
      });
      const body = await response.json();
      output.textContent = response.ok ? body.output : body.error + ": " + body.message;
    });
  </script>
</body>
</html>
"#;
