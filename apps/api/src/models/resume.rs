use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored resume version. `is_active` is only ever written through
/// `resume::activation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ResumeRecord {
    pub id: Uuid,
    pub storage_key: String,
    pub original_filename: String,
    pub byte_size: i64,
    pub is_active: bool,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a record that has passed validation and whose content is
/// already in the blob store.
#[derive(Debug, Clone)]
pub struct NewResume {
    pub storage_key: String,
    pub original_filename: String,
    pub byte_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl NewResume {
    /// Builds the inactive record persisted by a repository backend.
    pub fn into_record(self) -> ResumeRecord {
        ResumeRecord {
            id: Uuid::new_v4(),
            storage_key: self.storage_key,
            original_filename: self.original_filename,
            byte_size: self.byte_size,
            is_active: false,
            uploaded_at: self.uploaded_at,
            updated_at: self.uploaded_at,
        }
    }
}
