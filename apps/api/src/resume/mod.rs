// Resume document management.
// Upload goes validator -> naming -> storage -> repository (-> activation).
// View/download/status all resolve the active record through file_server.
// Nothing outside activation.rs may flip `is_active`.

pub mod activation;
pub mod error;
pub mod file_server;
pub mod handlers;
pub mod naming;
pub mod repository;
pub mod service;
pub mod status;
pub mod storage;
pub mod validator;

pub use error::ResumeError;
pub use service::{ResumeService, ServeSettings, UploadRequest};

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::repository::MemoryResumeRepository;
    use super::service::{ResumeService, ServeSettings};
    use super::storage::LocalBlobStore;

    /// A PDF-looking payload of exactly `len` bytes (`len` >= 8).
    pub fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut data = b"%PDF-1.4".to_vec();
        data.resize(len, b'x');
        data
    }

    pub struct Harness {
        pub service: Arc<ResumeService>,
        pub repo: Arc<MemoryResumeRepository>,
        pub store: Arc<LocalBlobStore>,
        pub dir: TempDir,
    }

    pub fn harness() -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = Arc::new(MemoryResumeRepository::default());
        let store = Arc::new(LocalBlobStore::new(dir.path()));
        let service = Arc::new(ResumeService::new(
            repo.clone(),
            store.clone(),
            ServeSettings {
                display_name: "Resume.pdf".to_string(),
                storage_timeout: Duration::from_secs(5),
            },
        ));
        Harness {
            service,
            repo,
            store,
            dir,
        }
    }
}
