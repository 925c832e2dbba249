//! File Server: resolves the active resume to bytes and builds the
//! inline-view or download response.
//!
//! View, download and the status check share [`FileServer::locate_active`];
//! only the response headers differ between dispositions.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{error, warn};

use crate::models::resume::ResumeRecord;
use crate::resume::error::{ResumeError, NO_ACTIVE_RESUME};
use crate::resume::repository::ResumeRepository;
use crate::resume::storage::{with_timeout, BlobStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// Resolved resume content ready to be sent.
#[derive(Debug)]
pub struct ServedFile {
    pub record: ResumeRecord,
    pub body: Bytes,
    pub disposition: Disposition,
    pub display_name: String,
}

impl ServedFile {
    /// Validated size from the record, unless it disagrees with the bytes
    /// actually read.
    pub fn content_length(&self) -> u64 {
        let actual = self.body.len() as u64;
        match u64::try_from(self.record.byte_size) {
            Ok(recorded) if recorded == actual => recorded,
            _ => {
                warn!(
                    resume_id = %self.record.id,
                    recorded = self.record.byte_size,
                    actual,
                    "Recorded resume size differs from stored content"
                );
                actual
            }
        }
    }
}

impl IntoResponse for ServedFile {
    fn into_response(self) -> Response {
        let disposition = content_disposition(self.disposition, &self.display_name);

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/pdf")
            .header(header::CONTENT_DISPOSITION, disposition)
            .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
            .header(header::CACHE_CONTROL, "no-cache");

        builder = match self.disposition {
            // Embeddable by our own frontend's viewer, nobody else.
            Disposition::Inline => builder
                .header(header::X_FRAME_OPTIONS, "SAMEORIGIN")
                .header(header::CONTENT_SECURITY_POLICY, "frame-ancestors 'self'"),
            Disposition::Attachment => builder
                .header(header::X_FRAME_OPTIONS, "DENY")
                .header(header::CONTENT_LENGTH, HeaderValue::from(self.content_length())),
        };

        match builder.body(Body::from(self.body)) {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to build resume response: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// `filename` carries a printable-ASCII fallback; names with anything else
/// also get an RFC 5987 `filename*` so the header value stays valid.
fn content_disposition(disposition: Disposition, display_name: &str) -> String {
    let fallback: String = display_name
        .chars()
        .filter(|c| !matches!(c, '"' | '\\'))
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect();
    let mut value = format!("{}; filename=\"{fallback}\"", disposition.as_str());

    if !display_name.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        value.push_str("; filename*=UTF-8''");
        for byte in display_name.bytes() {
            if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
                value.push(byte as char);
            } else {
                value.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    value
}

pub struct FileServer {
    repo: Arc<dyn ResumeRepository>,
    store: Arc<dyn BlobStore>,
    display_name: String,
    storage_timeout: Duration,
}

impl FileServer {
    pub fn new(
        repo: Arc<dyn ResumeRepository>,
        store: Arc<dyn BlobStore>,
        display_name: String,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            store,
            display_name,
            storage_timeout,
        }
    }

    /// Whether the record's content is retrievable. Does not read it.
    pub async fn content_exists(&self, record: &ResumeRecord) -> Result<bool, ResumeError> {
        Ok(with_timeout(
            self.storage_timeout,
            "exists",
            self.store.exists(&record.storage_key),
        )
        .await?)
    }

    /// Active record whose content is confirmed present.
    pub async fn locate_active(&self) -> Result<ResumeRecord, ResumeError> {
        let record = self
            .repo
            .get_active()
            .await?
            .ok_or_else(|| ResumeError::NotFound(NO_ACTIVE_RESUME.to_string()))?;

        let present = self.content_exists(&record).await.map_err(|e| {
            error!(resume_id = %record.id, error = %e, "Existence check for resume content failed");
            e
        })?;
        if !present {
            return Err(self.inconsistency(&record));
        }
        Ok(record)
    }

    pub async fn serve(&self, disposition: Disposition) -> Result<ServedFile, ResumeError> {
        let record = self.locate_active().await?;

        let body = match with_timeout(
            self.storage_timeout,
            "read",
            self.store.read(&record.storage_key),
        )
        .await
        {
            Ok(body) => body,
            // Removed between the existence check and the read.
            Err(StorageError::NotFound(_)) => return Err(self.inconsistency(&record)),
            Err(e) => {
                error!(
                    resume_id = %record.id,
                    backend = self.store.backend(),
                    error = %e,
                    "Failed to read resume content"
                );
                return Err(e.into());
            }
        };

        Ok(ServedFile {
            record,
            body,
            disposition,
            display_name: self.display_name.clone(),
        })
    }

    fn inconsistency(&self, record: &ResumeRecord) -> ResumeError {
        error!(
            resume_id = %record.id,
            storage_key = %record.storage_key,
            backend = self.store.backend(),
            "Active resume references content missing from storage"
        );
        ResumeError::StorageInconsistency {
            id: record.id,
            storage_key: record.storage_key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::NewResume;
    use crate::resume::repository::MemoryResumeRepository;
    use crate::resume::storage::LocalBlobStore;
    use chrono::Utc;

    struct Fixture {
        server: FileServer,
        repo: Arc<MemoryResumeRepository>,
        store: Arc<LocalBlobStore>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryResumeRepository::default());
        let store = Arc::new(LocalBlobStore::new(dir.path()));
        let server = FileServer::new(
            repo.clone(),
            store.clone(),
            "Jane_Doe_Resume.pdf".to_string(),
            Duration::from_secs(5),
        );
        Fixture {
            server,
            repo,
            store,
            _dir: dir,
        }
    }

    async fn seed(fx: &Fixture, content: &'static [u8], active: bool) -> ResumeRecord {
        let key = format!("resumes/{}.pdf", uuid::Uuid::new_v4());
        fx.store.put(&key, Bytes::from_static(content)).await.unwrap();
        fx.repo
            .create(
                NewResume {
                    storage_key: key,
                    original_filename: "cv.pdf".to_string(),
                    byte_size: content.len() as i64,
                    uploaded_at: Utc::now(),
                },
                active,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_active_record() {
        let fx = fixture();
        let err = fx.server.serve(Disposition::Inline).await.unwrap_err();
        assert!(matches!(err, ResumeError::NotFound(ref m) if m == "No active resume"));
    }

    #[tokio::test]
    async fn test_inactive_records_are_not_served() {
        let fx = fixture();
        seed(&fx, b"%PDF-1.4 inactive", false).await;
        let err = fx.server.serve(Disposition::Attachment).await.unwrap_err();
        assert!(matches!(err, ResumeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_content_is_inconsistency() {
        let fx = fixture();
        let record = seed(&fx, b"%PDF-1.4 gone", true).await;
        fx.store.delete(&record.storage_key).await.unwrap();

        let err = fx.server.serve(Disposition::Inline).await.unwrap_err();
        assert!(matches!(err, ResumeError::StorageInconsistency { id, .. } if id == record.id));
    }

    #[tokio::test]
    async fn test_serves_active_content() {
        let fx = fixture();
        seed(&fx, b"%PDF-1.4 old", false).await;
        let active = seed(&fx, b"%PDF-1.4 current", true).await;

        let served = fx.server.serve(Disposition::Attachment).await.unwrap();
        assert_eq!(served.record.id, active.id);
        assert_eq!(served.body, Bytes::from_static(b"%PDF-1.4 current"));
        assert_eq!(served.content_length(), 16);
    }

    #[tokio::test]
    async fn test_inline_headers() {
        let fx = fixture();
        seed(&fx, b"%PDF-1.4 inline", true).await;

        let response = fx
            .server
            .serve(Disposition::Inline)
            .await
            .unwrap()
            .into_response();
        let headers = response.headers();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "inline; filename=\"Jane_Doe_Resume.pdf\""
        );
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(
            headers[header::CONTENT_SECURITY_POLICY],
            "frame-ancestors 'self'"
        );
    }

    #[tokio::test]
    async fn test_attachment_headers() {
        let fx = fixture();
        seed(&fx, b"%PDF-1.4 download", true).await;

        let response = fx
            .server
            .serve(Disposition::Attachment)
            .await
            .unwrap()
            .into_response();
        let headers = response.headers();
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Jane_Doe_Resume.pdf\""
        );
        assert_eq!(headers[header::CONTENT_LENGTH], "17");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert!(headers.get(header::CONTENT_SECURITY_POLICY).is_none());
    }

    #[test]
    fn test_content_disposition_ascii_name() {
        assert_eq!(
            content_disposition(Disposition::Inline, "Jane Doe \"CV\".pdf"),
            "inline; filename=\"Jane Doe CV.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_non_ascii_name() {
        assert_eq!(
            content_disposition(Disposition::Attachment, "Résumé.pdf"),
            "attachment; filename=\"R_sum_.pdf\"; filename*=UTF-8''R%C3%A9sum%C3%A9.pdf"
        );
    }

    #[tokio::test]
    async fn test_non_ascii_display_name_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryResumeRepository::default());
        let store = Arc::new(LocalBlobStore::new(dir.path()));
        let server = FileServer::new(
            repo.clone(),
            store.clone(),
            "Lebenslauf Müller.pdf".to_string(),
            Duration::from_secs(5),
        );
        store
            .put("resumes/cv.pdf", Bytes::from_static(b"%PDF-1.4 umlaut"))
            .await
            .unwrap();
        repo.create(
            NewResume {
                storage_key: "resumes/cv.pdf".to_string(),
                original_filename: "cv.pdf".to_string(),
                byte_size: 15,
                uploaded_at: Utc::now(),
            },
            true,
        )
        .await
        .unwrap();

        let response = server
            .serve(Disposition::Inline)
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"Lebenslauf M_ller.pdf\"; filename*=UTF-8''Lebenslauf%20M%C3%BCller.pdf"
        );
    }

    #[tokio::test]
    async fn test_content_length_falls_back_to_actual_size() {
        let fx = fixture();
        let mut record = seed(&fx, b"%PDF-1.4 abc", true).await;
        record.byte_size = 9999;
        let served = ServedFile {
            record,
            body: Bytes::from_static(b"%PDF-1.4 abc"),
            disposition: Disposition::Attachment,
            display_name: "Resume.pdf".to_string(),
        };
        assert_eq!(served.content_length(), 12);
    }
}
