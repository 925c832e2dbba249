//! Blob storage for resume content, addressed by storage key.
//!
//! Two backends: the local filesystem (`MEDIA_ROOT`) and S3-compatible
//! object storage (MinIO locally, AWS in production). `AppState` carries an
//! `Arc<dyn BlobStore>` chosen at startup from config.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::S3Settings;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("storage key '{0}' is already taken")]
    KeyCollision(String),

    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Stores content under a key nobody holds yet. A taken key fails with
    /// `StorageError::KeyCollision` and leaves the existing content intact.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Returns `StorageError::NotFound` if the key has no content.
    async fn read(&self, key: &str) -> Result<Bytes, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Bounds a storage call so a stalled backend surfaces as an error.
pub async fn with_timeout<T, F>(
    limit: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StorageError::Timeout {
            operation,
            after: limit,
        })?
}

// ────────────────────────────────────────────────────────────────────────────
// Local filesystem
// ────────────────────────────────────────────────────────────────────────────

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys must be relative and free of `..`; they never escape `root`.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Each writer stages its own file; the hard link publishes it
        // complete and refuses to replace a key another writer already holds.
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let partial = path.with_file_name(format!(".{file_name}.{}.part", Uuid::new_v4()));
        tokio::fs::write(&partial, &data).await?;
        let published = tokio::fs::hard_link(&partial, &path).await;
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            debug!("Could not remove staging file {}: {e}", partial.display());
        }

        match published {
            Ok(()) => {
                debug!("Stored {} bytes at {}", data.len(), path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::KeyCollision(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// S3 / MinIO
// ────────────────────────────────────────────────────────────────────────────

pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    /// Constructs a client configured for MinIO (local) or AWS (production).
    pub async fn connect(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "folio-static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&settings.endpoint)
            .load()
            .await;

        // MinIO does not support virtual-hosted bucket addressing.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!(
            "S3 client initialized (endpoint: {}, bucket: {})",
            settings.endpoint, settings.bucket
        );

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: settings.bucket.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type("application/pdf")
            // Conditional write: only succeeds if no object exists at `key`.
            .if_none_match("*")
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!("Uploaded s3://{}/{}", self.bucket, key);
                Ok(())
            }
            // 412 when the key exists, 409 when a concurrent conditional write won.
            Err(e)
                if e.raw_response()
                    .is_some_and(|r| matches!(r.status().as_u16(), 409 | 412)) =>
            {
                Err(StorageError::KeyCollision(key.to_string()))
            }
            Err(e) => Err(StorageError::S3(format!("upload of '{key}' failed: {e}"))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StorageError::S3(format!("head of '{key}' failed: {e}"))),
        }
    }

    async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(StorageError::S3(format!("get of '{key}' failed: {e}"))),
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(format!("reading body of '{key}' failed: {e}")))?;
        Ok(body.into_bytes())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("delete of '{key}' failed: {e}")))?;
        Ok(())
    }
}
