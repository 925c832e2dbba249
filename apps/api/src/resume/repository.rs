//! Resume Repository: persisted collection of resume records.
//!
//! Backends:
//! - `PgResumeRepository`: PostgreSQL via sqlx, transitions in a transaction.
//! - `MemoryResumeRepository`: a `Vec` behind an async mutex, used when no
//!   `DATABASE_URL` is configured and in tests.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::resume::{NewResume, ResumeRecord};
use crate::resume::activation::{
    apply_in_memory, apply_pg, lock_for_transition, Transition, TransitionOutcome,
};
use crate::resume::error::ResumeError;

pub(crate) const COLUMNS: &str =
    "id, storage_key, original_filename, byte_size, is_active, uploaded_at, updated_at";

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListFilter {
    pub is_active: Option<bool>,
}

#[async_trait]
pub trait ResumeRepository: Send + Sync {
    /// Persists a new record. With `activate`, the activation transition
    /// runs as part of the same write.
    async fn create(&self, new: NewResume, activate: bool) -> Result<ResumeRecord, ResumeError>;

    async fn get(&self, id: Uuid) -> Result<Option<ResumeRecord>, ResumeError>;

    /// Every record flagged active. Normally zero or one.
    async fn active_records(&self) -> Result<Vec<ResumeRecord>, ResumeError>;

    /// Newest first.
    async fn list(&self, filter: ListFilter) -> Result<Vec<ResumeRecord>, ResumeError>;

    /// Removes the record and returns it. Content is the caller's concern.
    async fn remove(&self, id: Uuid) -> Result<Option<ResumeRecord>, ResumeError>;

    /// Low-level transition. Go through `ActivationManager`.
    async fn transition(&self, transition: Transition) -> Result<TransitionOutcome, ResumeError>;

    async fn get_active(&self) -> Result<Option<ResumeRecord>, ResumeError> {
        Ok(pick_active(self.active_records().await?))
    }
}

/// Chooses the record to serve among those flagged active. More than one is
/// a consistency bug; the latest upload wins and a warning is logged.
pub fn pick_active(mut candidates: Vec<ResumeRecord>) -> Option<ResumeRecord> {
    if candidates.len() > 1 {
        warn!(
            count = candidates.len(),
            ids = ?candidates.iter().map(|r| r.id).collect::<Vec<_>>(),
            "Multiple resumes flagged active; serving the latest upload"
        );
    }
    candidates.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    candidates.into_iter().next()
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

pub struct PgResumeRepository {
    pool: PgPool,
}

impl PgResumeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeRepository for PgResumeRepository {
    async fn create(&self, new: NewResume, activate: bool) -> Result<ResumeRecord, ResumeError> {
        let record = new.into_record();
        let mut tx = self.pool.begin().await?;

        if activate {
            lock_for_transition(&mut tx).await?;
        }

        let insert = format!(
            "INSERT INTO resumes ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, ResumeRecord>(&insert)
            .bind(record.id)
            .bind(&record.storage_key)
            .bind(&record.original_filename)
            .bind(record.byte_size)
            .bind(false)
            .bind(record.uploaded_at)
            .bind(record.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        let created = if activate {
            match apply_pg(&mut tx, Transition::Activate(inserted.id)).await? {
                TransitionOutcome::Activated(active) => active,
                // Dropping `tx` rolls the insert back.
                _ => return Err(ResumeError::not_found(inserted.id)),
            }
        } else {
            inserted
        };

        tx.commit().await?;
        debug!(resume_id = %created.id, active = created.is_active, "Inserted resume record");
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ResumeRecord>, ResumeError> {
        let query = format!("SELECT {COLUMNS} FROM resumes WHERE id = $1");
        Ok(sqlx::query_as::<_, ResumeRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn active_records(&self) -> Result<Vec<ResumeRecord>, ResumeError> {
        let query = format!(
            "SELECT {COLUMNS} FROM resumes WHERE is_active ORDER BY uploaded_at DESC"
        );
        Ok(sqlx::query_as::<_, ResumeRecord>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<ResumeRecord>, ResumeError> {
        let query = format!(
            "SELECT {COLUMNS} FROM resumes \
             WHERE ($1::BOOLEAN IS NULL OR is_active = $1) \
             ORDER BY uploaded_at DESC"
        );
        Ok(sqlx::query_as::<_, ResumeRecord>(&query)
            .bind(filter.is_active)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn remove(&self, id: Uuid) -> Result<Option<ResumeRecord>, ResumeError> {
        let query = format!("DELETE FROM resumes WHERE id = $1 RETURNING {COLUMNS}");
        Ok(sqlx::query_as::<_, ResumeRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn transition(&self, transition: Transition) -> Result<TransitionOutcome, ResumeError> {
        let mut tx = self.pool.begin().await?;
        lock_for_transition(&mut tx).await?;
        let outcome = apply_pg(&mut tx, transition).await?;
        if outcome == TransitionOutcome::UnknownTarget {
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }
        Ok(outcome)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryResumeRepository {
    records: Mutex<Vec<ResumeRecord>>,
}

#[async_trait]
impl ResumeRepository for MemoryResumeRepository {
    async fn create(&self, new: NewResume, activate: bool) -> Result<ResumeRecord, ResumeError> {
        let mut records = self.records.lock().await;
        let record = new.into_record();
        let id = record.id;
        records.push(record.clone());

        if !activate {
            return Ok(record);
        }
        match apply_in_memory(&mut records, Transition::Activate(id), Utc::now()) {
            TransitionOutcome::Activated(active) => Ok(active),
            _ => {
                records.retain(|r| r.id != id);
                Err(ResumeError::not_found(id))
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<ResumeRecord>, ResumeError> {
        let records = self.records.lock().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn active_records(&self) -> Result<Vec<ResumeRecord>, ResumeError> {
        let records = self.records.lock().await;
        Ok(records.iter().filter(|r| r.is_active).cloned().collect())
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<ResumeRecord>, ResumeError> {
        let records = self.records.lock().await;
        let mut listed: Vec<ResumeRecord> = records
            .iter()
            .filter(|r| filter.is_active.map_or(true, |flag| r.is_active == flag))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(listed)
    }

    async fn remove(&self, id: Uuid) -> Result<Option<ResumeRecord>, ResumeError> {
        let mut records = self.records.lock().await;
        Ok(records
            .iter()
            .position(|r| r.id == id)
            .map(|index| records.remove(index)))
    }

    async fn transition(&self, transition: Transition) -> Result<TransitionOutcome, ResumeError> {
        let mut records = self.records.lock().await;
        Ok(apply_in_memory(&mut records, transition, Utc::now()))
    }
}

#[cfg(test)]
impl MemoryResumeRepository {
    /// Bypasses the activation manager to simulate a corrupted store.
    pub(crate) async fn force_active_flag(&self, id: Uuid, active: bool) {
        let mut records = self.records.lock().await;
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.is_active = active;
        }
    }
}


// ---------------------------------------------------------------------------
// PostgreSQL backend, against a real database (DATABASE_URL).
// ---------------------------------------------------------------------------
