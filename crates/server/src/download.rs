//! Fetching remote PDFs into the upload directory.

use docqa_core::{AppError, AppResult};
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Download `url` into `dir` as `<uuid>.pdf`, reading at most `max_bytes`.
///
/// Network errors, non-success statuses, oversized bodies and bodies that are
/// not PDFs are reported as `AppError::DownloadFailure`.
#[tracing::instrument(skip(client, dir))]
pub async fn download_pdf(
    client: &Client,
    url: &str,
    dir: &Path,
    max_bytes: usize,
) -> AppResult<PathBuf> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| AppError::InvalidInput(format!("Invalid URL '{}': {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::InvalidInput(format!(
            "Unsupported URL scheme: {}",
            parsed.scheme()
        )));
    }

    let mut response = client
        .get(parsed.clone())
        .send()
        .await
        .map_err(|e| AppError::download_failure(url, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::download_failure(
            url,
            format!("server responded with {}", status),
        ));
    }

    let too_large = || {
        AppError::download_failure(url, format!("response exceeds {} bytes", max_bytes))
    };
    if response
        .content_length()
        .is_some_and(|len| len > max_bytes as u64)
    {
        return Err(too_large());
    }

    // Content-Length may be absent or wrong; count what actually arrives
    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| AppError::download_failure(url, e.to_string()))?
    {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    if !bytes.starts_with(PDF_MAGIC) {
        return Err(AppError::download_failure(url, "response is not a PDF"));
    }

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.pdf", Uuid::new_v4()));
    tokio::fs::write(&path, &bytes).await?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "Downloaded PDF");
    Ok(path)
}
