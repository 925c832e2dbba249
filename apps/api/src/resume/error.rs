use thiserror::Error;
use uuid::Uuid;

use crate::resume::storage::StorageError;
use crate::resume::validator::ValidationError;

pub const NO_ACTIVE_RESUME: &str = "No active resume";
pub const RESUME_FILE_MISSING: &str = "Resume file missing from storage";

/// Errors produced by the resume subsystem.
#[derive(Debug, Error)]
pub enum ResumeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    /// The record exists but its content does not.
    #[error("resume {id} references missing content '{storage_key}'")]
    StorageInconsistency { id: Uuid, storage_key: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ResumeError {
    pub fn not_found(id: Uuid) -> Self {
        ResumeError::NotFound(format!("Resume {id} not found"))
    }
}
