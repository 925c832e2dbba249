//! Status Reporter: diagnostic summary for dashboards and health probes.
//! Content problems degrade `active_detail`; they never fail the report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::resume::error::ResumeError;
use crate::resume::file_server::FileServer;
use crate::resume::repository::{pick_active, ListFilter, ResumeRepository};

pub const DETAILS_UNAVAILABLE: &str = "details unavailable";

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub total_count: usize,
    pub active_count: usize,
    pub has_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_detail: Option<ActiveDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveDetail {
    pub id: Uuid,
    pub filename: String,
    pub size_bytes: i64,
    pub size_display: String,
    pub uploaded_at: DateTime<Utc>,
    pub file_accessible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn build_status_report(
    repo: &dyn ResumeRepository,
    files: &FileServer,
) -> Result<StatusReport, ResumeError> {
    let records = repo.list(ListFilter::default()).await?;
    let total_count = records.len();
    let active: Vec<_> = records.into_iter().filter(|r| r.is_active).collect();
    let active_count = active.len();

    let active_detail = match pick_active(active) {
        Some(record) => {
            let (file_accessible, error) = match files.content_exists(&record).await {
                Ok(true) => (true, None),
                Ok(false) => {
                    warn!(resume_id = %record.id, "Status: active resume content is missing");
                    (false, Some(DETAILS_UNAVAILABLE.to_string()))
                }
                Err(e) => {
                    warn!(resume_id = %record.id, error = %e, "Status: content check failed");
                    (false, Some(DETAILS_UNAVAILABLE.to_string()))
                }
            };
            Some(ActiveDetail {
                id: record.id,
                size_display: format_size(record.byte_size),
                filename: record.original_filename,
                size_bytes: record.byte_size,
                uploaded_at: record.uploaded_at,
                file_accessible,
                error,
            })
        }
        None => None,
    };

    Ok(StatusReport {
        total_count,
        active_count,
        has_active: active_count > 0,
        active_detail,
    })
}

/// `512 B`, `12.3 KB`, `1.5 MB`.
pub fn format_size(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let value = bytes.max(0) as f64;
    if value < KB {
        format!("{} B", bytes.max(0))
    } else if value < MB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{:.1} MB", value / MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::models::resume::NewResume;
    use crate::resume::repository::MemoryResumeRepository;
    use crate::resume::storage::{BlobStore, StorageError};
    use crate::resume::testing::{harness, pdf_bytes};
    use crate::resume::UploadRequest;
    use bytes::Bytes;
    use chrono::Utc;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(-3), "0 B");
    }

    #[tokio::test]
    async fn test_empty_repository() {
        let h = harness();
        let report = h.service.status().await.unwrap();
        assert_eq!(report.total_count, 0);
        assert_eq!(report.active_count, 0);
        assert!(!report.has_active);
        assert!(report.active_detail.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("active_detail").is_none());
    }

    #[tokio::test]
    async fn test_active_detail_when_content_present() {
        let h = harness();
        h.service
            .upload(UploadRequest {
                data: Bytes::from(pdf_bytes(2048)),
                filename: "Jane Doe CV.pdf".to_string(),
                size_hint: None,
                activate: true,
            })
            .await
            .unwrap();

        let report = h.service.status().await.unwrap();
        assert_eq!(report.total_count, 1);
        assert_eq!(report.active_count, 1);
        let detail = report.active_detail.unwrap();
        assert_eq!(detail.filename, "Jane Doe CV.pdf");
        assert_eq!(detail.size_bytes, 2048);
        assert_eq!(detail.size_display, "2.0 KB");
        assert!(detail.file_accessible);
        assert!(detail.error.is_none());
    }

    #[tokio::test]
    async fn test_missing_content_degrades_detail() {
        let h = harness();
        let record = h
            .service
            .upload(UploadRequest {
                data: Bytes::from(pdf_bytes(10)),
                filename: "resume.pdf".to_string(),
                size_hint: None,
                activate: true,
            })
            .await
            .unwrap();
        h.store.delete(&record.storage_key).await.unwrap();

        let report = h.service.status().await.unwrap();
        assert_eq!(report.total_count, 1);
        assert_eq!(report.active_count, 1);
        assert!(report.has_active);
        let detail = report.active_detail.unwrap();
        assert!(!detail.file_accessible);
        assert_eq!(detail.error.as_deref(), Some(DETAILS_UNAVAILABLE));
    }

    /// Blob store whose existence checks fail or hang.
    struct FaultyStore {
        stall: bool,
    }

    #[async_trait::async_trait]
    impl BlobStore for FaultyStore {
        fn backend(&self) -> &'static str {
            "faulty"
        }

        async fn put(&self, _key: &str, _data: Bytes) -> Result<(), StorageError> {
            Ok(())
        }

        async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Err(StorageError::S3("connection reset".to_string()))
        }

        async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
            Err(StorageError::NotFound(key.to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    async fn report_with_faulty_store(stall: bool) -> StatusReport {
        let repo = Arc::new(MemoryResumeRepository::default());
        repo.create(
            NewResume {
                storage_key: "resumes/resume_20261017_120000.pdf".to_string(),
                original_filename: "resume.pdf".to_string(),
                byte_size: 10,
                uploaded_at: Utc::now(),
            },
            true,
        )
        .await
        .unwrap();
        let files = FileServer::new(
            repo.clone(),
            Arc::new(FaultyStore { stall }),
            "Resume.pdf".to_string(),
            Duration::from_millis(50),
        );
        build_status_report(repo.as_ref(), &files).await.unwrap()
    }

    #[tokio::test]
    async fn test_storage_fault_degrades_detail() {
        let report = report_with_faulty_store(false).await;
        assert_eq!(report.total_count, 1);
        assert_eq!(report.active_count, 1);
        assert!(report.has_active);
        let detail = report.active_detail.unwrap();
        assert!(!detail.file_accessible);
        assert_eq!(detail.error.as_deref(), Some(DETAILS_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_stalled_storage_degrades_detail() {
        let report = report_with_faulty_store(true).await;
        assert!(report.has_active);
        let detail = report.active_detail.unwrap();
        assert!(!detail.file_accessible);
        assert_eq!(detail.error.as_deref(), Some(DETAILS_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_inactive_only() {
        let h = harness();
        h.service
            .upload(UploadRequest {
                data: Bytes::from(pdf_bytes(10)),
                filename: "resume.pdf".to_string(),
                size_hint: None,
                activate: false,
            })
            .await
            .unwrap();

        let report = h.service.status().await.unwrap();
        assert_eq!(report.total_count, 1);
        assert_eq!(report.active_count, 0);
        assert!(!report.has_active);
        assert!(report.active_detail.is_none());
    }
}
