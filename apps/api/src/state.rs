use std::sync::Arc;

use crate::resume::ResumeService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Repository and blob store behind the resume boundary operations.
    /// Backends are chosen at startup from `Config`.
    pub resumes: Arc<ResumeService>,
}
