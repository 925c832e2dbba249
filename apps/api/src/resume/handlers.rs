//! Axum route handlers for the Resume API.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRecord;
use crate::resume::file_server::ServedFile;
use crate::resume::repository::ListFilter;
use crate::resume::service::UploadRequest;
use crate::resume::status::StatusReport;
use crate::resume::validator::{ValidationError, MAX_SIZE};
use crate::state::AppState;

/// Request body cap for uploads: the largest accepted file plus room for
/// multipart framing. Anything larger is answered as `FILE_TOO_LARGE`.
pub const UPLOAD_BODY_LIMIT: usize = MAX_SIZE as usize + 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub deactivated: u64,
}

/// POST /api/v1/resume
///
/// Multipart form: `file` (required), `is_active` (optional bool),
/// `size` (optional declared byte count).
pub async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeRecord>), AppError> {
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let mut file: Option<(String, bytes::Bytes)> = None;
    let mut activate = false;
    let mut size_hint = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_rejection(e, size_hint, content_length))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_rejection(e, size_hint, content_length))?;
                file = Some((filename, data));
            }
            "is_active" | "activate" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                activate = parse_flag(&text).ok_or_else(|| {
                    AppError::BadRequest(format!("'{name}' must be true or false, got '{text}'"))
                })?;
            }
            "size" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                size_hint = text.trim().parse::<u64>().ok();
            }
            _ => {} // ignore unknown fields
        }
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;

    let record = state
        .resumes
        .upload(UploadRequest {
            data,
            filename,
            size_hint,
            activate,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/resume/view
pub async fn handle_view(State(state): State<AppState>) -> Result<ServedFile, AppError> {
    Ok(state.resumes.view().await?)
}

/// GET /api/v1/resume/download
pub async fn handle_download(State(state): State<AppState>) -> Result<ServedFile, AppError> {
    Ok(state.resumes.download().await?)
}

/// GET /api/v1/resume/status
pub async fn handle_status(
    State(state): State<AppState>,
) -> Result<Json<StatusReport>, AppError> {
    Ok(Json(state.resumes.status().await?))
}

/// GET /api/v1/resume/versions?is_active=
pub async fn handle_list_versions(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Vec<ResumeRecord>>, AppError> {
    Ok(Json(state.resumes.list_versions(filter).await?))
}

/// POST /api/v1/resume/:id/activate
pub async fn handle_activate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeRecord>, AppError> {
    Ok(Json(state.resumes.activate(id).await?))
}

/// POST /api/v1/resume/deactivate
pub async fn handle_deactivate(
    State(state): State<AppState>,
) -> Result<Json<DeactivateResponse>, AppError> {
    let deactivated = state.resumes.deactivate_all().await?;
    Ok(Json(DeactivateResponse { deactivated }))
}

/// DELETE /api/v1/resume/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.resumes.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A body cut off at `UPLOAD_BODY_LIMIT` is an oversized file, reported with
/// the best size known: the declared `size` field, else the request length.
fn multipart_rejection(
    err: MultipartError,
    size_hint: Option<u64>,
    content_length: Option<u64>,
) -> AppError {
    if err.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::BadRequest(err.body_text());
    }
    let size = size_hint
        .filter(|&size| size > MAX_SIZE)
        .or(content_length)
        .unwrap_or(UPLOAD_BODY_LIMIT as u64 + 1);
    tracing::info!(size, "Rejected resume upload over the body limit");
    AppError::Rejected(ValidationError::TooLarge { size })
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}
