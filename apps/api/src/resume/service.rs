//! Resume Service: the boundary operations consumed by the HTTP layer.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::resume::{NewResume, ResumeRecord};
use crate::resume::activation::ActivationManager;
use crate::resume::error::ResumeError;
use crate::resume::file_server::{Disposition, FileServer, ServedFile};
use crate::resume::naming::derive_storage_key;
use crate::resume::repository::{ListFilter, ResumeRepository};
use crate::resume::status::{build_status_report, StatusReport};
use crate::resume::storage::{with_timeout, BlobStore, StorageError};
use crate::resume::validator;

/// Same-second uploads of the same filename retry with the next second.
const MAX_KEY_ATTEMPTS: i64 = 32;

#[derive(Debug, Clone)]
pub struct ServeSettings {
    /// Filename presented to clients for both view and download.
    pub display_name: String,
    pub storage_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Bytes,
    pub filename: String,
    /// Client-declared size. The received byte count is authoritative.
    pub size_hint: Option<u64>,
    pub activate: bool,
}

pub struct ResumeService {
    repo: Arc<dyn ResumeRepository>,
    store: Arc<dyn BlobStore>,
    activation: ActivationManager,
    files: FileServer,
    storage_timeout: Duration,
}

impl ResumeService {
    pub fn new(
        repo: Arc<dyn ResumeRepository>,
        store: Arc<dyn BlobStore>,
        settings: ServeSettings,
    ) -> Self {
        let files = FileServer::new(
            repo.clone(),
            store.clone(),
            settings.display_name,
            settings.storage_timeout,
        );
        Self {
            activation: ActivationManager::new(repo.clone()),
            repo,
            store,
            files,
            storage_timeout: settings.storage_timeout,
        }
    }

    /// Validates, stores and records an upload. Nothing is persisted when
    /// validation fails; content stored before a failed insert is removed.
    pub async fn upload(&self, request: UploadRequest) -> Result<ResumeRecord, ResumeError> {
        let UploadRequest {
            data,
            filename,
            size_hint,
            activate,
        } = request;

        let size = data.len() as u64;
        if let Some(hint) = size_hint.filter(|&hint| hint != size) {
            debug!(
                declared = hint,
                received = size,
                "Upload size hint differs from received bytes"
            );
        }

        if let Err(e) = validator::validate(&mut Cursor::new(&data[..]), &filename, size) {
            info!(filename = %filename, reason = e.code(), "Rejected resume upload: {e}");
            return Err(e.into());
        }

        let uploaded_at = Utc::now();
        let storage_key = self.store_under_free_key(&filename, uploaded_at, data).await?;

        let new = NewResume {
            storage_key: storage_key.clone(),
            original_filename: filename,
            byte_size: size as i64,
            uploaded_at,
        };
        let record = match self.repo.create(new, activate).await {
            Ok(record) => record,
            Err(e) => {
                self.discard_content(&storage_key).await;
                return Err(e);
            }
        };

        info!(
            resume_id = %record.id,
            storage_key = %record.storage_key,
            size = record.byte_size,
            active = record.is_active,
            "Stored resume upload"
        );
        Ok(record)
    }

    pub async fn view(&self) -> Result<ServedFile, ResumeError> {
        self.files.serve(Disposition::Inline).await
    }

    pub async fn download(&self) -> Result<ServedFile, ResumeError> {
        self.files.serve(Disposition::Attachment).await
    }

    pub async fn status(&self) -> Result<StatusReport, ResumeError> {
        build_status_report(self.repo.as_ref(), &self.files).await
    }

    pub async fn list_versions(&self, filter: ListFilter) -> Result<Vec<ResumeRecord>, ResumeError> {
        self.repo.list(filter).await
    }

    pub async fn activate(&self, id: Uuid) -> Result<ResumeRecord, ResumeError> {
        self.activation.activate(id).await
    }

    pub async fn deactivate_all(&self) -> Result<u64, ResumeError> {
        self.activation.deactivate_all().await
    }

    /// Removes the record, then its content on a best-effort basis.
    pub async fn delete(&self, id: Uuid) -> Result<ResumeRecord, ResumeError> {
        let record = self
            .repo
            .remove(id)
            .await?
            .ok_or_else(|| ResumeError::not_found(id))?;

        match with_timeout(
            self.storage_timeout,
            "delete",
            self.store.delete(&record.storage_key),
        )
        .await
        {
            Ok(()) => info!(resume_id = %id, "Deleted resume and its content"),
            Err(e) => warn!(
                resume_id = %id,
                storage_key = %record.storage_key,
                error = %e,
                "Deleted resume record but could not remove its content"
            ),
        }
        Ok(record)
    }

    /// Stores `data` under the first key the blob store accepts. The store
    /// refuses taken keys atomically, so concurrent same-name uploads each
    /// end up with their own key.
    async fn store_under_free_key(
        &self,
        filename: &str,
        uploaded_at: DateTime<Utc>,
        data: Bytes,
    ) -> Result<String, ResumeError> {
        let mut key = derive_storage_key(filename, uploaded_at);
        for attempt in 1..=MAX_KEY_ATTEMPTS {
            match with_timeout(self.storage_timeout, "put", self.store.put(&key, data.clone())).await
            {
                Ok(()) => return Ok(key),
                Err(StorageError::KeyCollision(_)) => {
                    debug!(storage_key = %key, attempt, "Storage key taken, trying the next second");
                    key = derive_storage_key(
                        filename,
                        uploaded_at + chrono::Duration::seconds(attempt),
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StorageError::KeyCollision(key).into())
    }

    async fn discard_content(&self, storage_key: &str) {
        if let Err(e) = with_timeout(
            self.storage_timeout,
            "delete",
            self.store.delete(storage_key),
        )
        .await
        {
            warn!(storage_key, error = %e, "Could not remove content of failed upload");
        }
    }
}
