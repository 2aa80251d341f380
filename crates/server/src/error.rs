//! Mapping of application errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use docqa_core::AppError;
use serde_json::json;

/// An [`AppError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::LoadFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DownloadFailure { .. } | AppError::Llm(_) | AppError::Embedding(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "Request failed");
        } else {
            tracing::warn!(kind = self.0.kind(), error = %self.0, "Request rejected");
        }

        let body = Json(json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::load_failure("a.pdf", "broken"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppError::NotReady("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                AppError::download_failure("http://x", "timeout"),
                StatusCode::BAD_GATEWAY,
            ),
            (AppError::Llm("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::Embedding("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[tokio::test]
    async fn test_body_carries_kind_and_message() {
        let response = ApiError(AppError::NotReady("nothing ingested".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "not_ready");
        assert!(body["message"].as_str().unwrap().contains("nothing ingested"));
    }
}
