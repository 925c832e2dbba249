pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::resume::handlers::{self, UPLOAD_BODY_LIMIT};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume API
        .route(
            "/api/v1/resume",
            post(handlers::handle_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v1/resume/view", get(handlers::handle_view))
        .route("/api/v1/resume/download", get(handlers::handle_download))
        .route("/api/v1/resume/status", get(handlers::handle_status))
        .route(
            "/api/v1/resume/versions",
            get(handlers::handle_list_versions),
        )
        .route(
            "/api/v1/resume/deactivate",
            post(handlers::handle_deactivate),
        )
        .route(
            "/api/v1/resume/:id/activate",
            post(handlers::handle_activate),
        )
        .route("/api/v1/resume/:id", delete(handlers::handle_delete))
        .with_state(state)
}
