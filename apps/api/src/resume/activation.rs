//! Activation Manager: the single writer of `resumes.is_active`.
//!
//! A transition deactivates every other record and activates the target as
//! one unit. Postgres runs it inside the caller's transaction after
//! [`lock_for_transition`]; the in-memory backend runs [`apply_in_memory`]
//! while holding its repository mutex. An unknown target changes nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::models::resume::ResumeRecord;
use crate::resume::error::ResumeError;
use crate::resume::repository::{ResumeRepository, COLUMNS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activate(Uuid),
    DeactivateAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Activated(ResumeRecord),
    Deactivated(u64),
    UnknownTarget,
}

/// Public entry point for changing which resume is active.
#[derive(Clone)]
pub struct ActivationManager {
    repo: Arc<dyn ResumeRepository>,
}

impl ActivationManager {
    pub fn new(repo: Arc<dyn ResumeRepository>) -> Self {
        Self { repo }
    }

    /// Makes `id` the only active resume. `NotFound` leaves state untouched.
    pub async fn activate(&self, id: Uuid) -> Result<ResumeRecord, ResumeError> {
        match self.repo.transition(Transition::Activate(id)).await? {
            TransitionOutcome::Activated(record) => {
                info!(resume_id = %id, "Activated resume");
                Ok(record)
            }
            _ => Err(ResumeError::not_found(id)),
        }
    }

    /// Returns how many records were switched off.
    pub async fn deactivate_all(&self) -> Result<u64, ResumeError> {
        match self.repo.transition(Transition::DeactivateAll).await? {
            TransitionOutcome::Deactivated(count) => {
                info!("Deactivated {count} resume(s)");
                Ok(count)
            }
            _ => Ok(0),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Backend steps
// ────────────────────────────────────────────────────────────────────────────

/// Serializes transitions: SHARE ROW EXCLUSIVE conflicts with itself and
/// with the ROW EXCLUSIVE lock taken by writers. Must be the first
/// statement touching `resumes` in the transaction.
pub(crate) async fn lock_for_transition(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("LOCK TABLE resumes IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Applies a transition inside an open transaction that already holds
/// [`lock_for_transition`].
pub(crate) async fn apply_pg(
    conn: &mut PgConnection,
    transition: Transition,
) -> Result<TransitionOutcome, sqlx::Error> {
    match transition {
        Transition::Activate(id) => {
            let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM resumes WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
            if exists.is_none() {
                return Ok(TransitionOutcome::UnknownTarget);
            }

            // Others off first so the single-active index never sees two rows.
            sqlx::query(
                "UPDATE resumes SET is_active = FALSE, updated_at = NOW() \
                 WHERE is_active AND id <> $1",
            )
            .bind(id)
            .execute(&mut *conn)
            .await?;

            let query = format!(
                "UPDATE resumes SET is_active = TRUE, updated_at = NOW() \
                 WHERE id = $1 RETURNING {COLUMNS}"
            );
            let record = sqlx::query_as::<_, ResumeRecord>(&query)
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
            Ok(TransitionOutcome::Activated(record))
        }
        Transition::DeactivateAll => {
            let result = sqlx::query(
                "UPDATE resumes SET is_active = FALSE, updated_at = NOW() WHERE is_active",
            )
            .execute(&mut *conn)
            .await?;
            Ok(TransitionOutcome::Deactivated(result.rows_affected()))
        }
    }
}

/// In-memory counterpart of [`apply_pg`]. The caller holds the lock guarding
/// `records`.
pub(crate) fn apply_in_memory(
    records: &mut [ResumeRecord],
    transition: Transition,
    now: DateTime<Utc>,
) -> TransitionOutcome {
    match transition {
        Transition::Activate(id) => {
            if !records.iter().any(|r| r.id == id) {
                return TransitionOutcome::UnknownTarget;
            }
            let mut activated = None;
            for record in records.iter_mut() {
                if record.id == id {
                    record.is_active = true;
                    record.updated_at = now;
                    activated = Some(record.clone());
                } else if record.is_active {
                    record.is_active = false;
                    record.updated_at = now;
                }
            }
            activated.map_or(TransitionOutcome::UnknownTarget, TransitionOutcome::Activated)
        }
        Transition::DeactivateAll => {
            let mut count = 0;
            for record in records.iter_mut().filter(|r| r.is_active) {
                record.is_active = false;
                record.updated_at = now;
                count += 1;
            }
            TransitionOutcome::Deactivated(count)
        }
    }
}
