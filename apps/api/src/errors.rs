use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::resume::error::{ResumeError, RESUME_FILE_MISSING};
use crate::resume::storage::StorageError;
use crate::resume::validator::ValidationError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("Storage inconsistency: {0}")]
    StorageInconsistency(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<ResumeError> for AppError {
    fn from(err: ResumeError) -> Self {
        match err {
            ResumeError::Validation(e) => AppError::Rejected(e),
            ResumeError::NotFound(msg) => AppError::NotFound(msg),
            e @ ResumeError::StorageInconsistency { .. } => {
                AppError::StorageInconsistency(e.to_string())
            }
            ResumeError::Storage(e) => AppError::Storage(e),
            ResumeError::Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Rejected(e) => (StatusCode::BAD_REQUEST, e.code(), e.to_string()),
            AppError::StorageInconsistency(detail) => {
                tracing::error!("Storage inconsistency: {detail}");
                (
                    StatusCode::NOT_FOUND,
                    "RESUME_FILE_MISSING",
                    RESUME_FILE_MISSING.to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_error_keeps_specific_reason() {
        let (status, body) =
            body_json(AppError::from(ResumeError::Validation(ValidationError::TooLarge {
                size: 6_000_000,
            })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "FILE_TOO_LARGE");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("6000000"));
    }

    #[tokio::test]
    async fn test_inconsistency_hides_storage_key() {
        let (status, body) = body_json(AppError::from(ResumeError::StorageInconsistency {
            id: Uuid::new_v4(),
            storage_key: "resumes/secret_path.pdf".to_string(),
        }))
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Resume file missing from storage");
        assert!(!body.to_string().contains("secret_path"));
    }

    #[tokio::test]
    async fn test_storage_error_is_generic() {
        let (status, body) = body_json(AppError::from(ResumeError::Storage(StorageError::S3(
            "bucket exploded at 10.0.0.5".to_string(),
        ))))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "A storage error occurred");
    }
}
