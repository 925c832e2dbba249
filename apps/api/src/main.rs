mod config;
mod db;
mod errors;
mod models;
mod resume;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StorageBackend};
use crate::db::create_pool;
use crate::resume::repository::{MemoryResumeRepository, PgResumeRepository, ResumeRepository};
use crate::resume::storage::{BlobStore, LocalBlobStore, S3BlobStore};
use crate::resume::{ResumeService, ServeSettings};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Records: PostgreSQL when configured, otherwise process memory
    let repo: Arc<dyn ResumeRepository> = match &config.database_url {
        Some(url) => Arc::new(PgResumeRepository::new(create_pool(url).await?)),
        None => {
            warn!("DATABASE_URL not set; resume records will not survive a restart");
            Arc::new(MemoryResumeRepository::default())
        }
    };

    // Content: local MEDIA_ROOT or S3 / MinIO
    let store: Arc<dyn BlobStore> = match &config.storage {
        StorageBackend::Local { media_root } => {
            tokio::fs::create_dir_all(media_root).await?;
            info!("Local blob store at {}", media_root.display());
            Arc::new(LocalBlobStore::new(media_root.clone()))
        }
        StorageBackend::S3(settings) => Arc::new(S3BlobStore::connect(settings).await),
    };

    let resumes = ResumeService::new(
        repo,
        store,
        ServeSettings {
            display_name: config.resume_display_name.clone(),
            storage_timeout: config.storage_timeout,
        },
    );

    let state = AppState {
        resumes: Arc::new(resumes),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the admin frontend has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
