use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable required by the chosen backends is missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unset means records live in memory only.
    pub database_url: Option<String>,
    pub storage: StorageBackend,
    pub resume_display_name: String,
    pub storage_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Local { media_root: PathBuf },
    S3(S3Settings),
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage = match optional_env("STORAGE_BACKEND")
            .unwrap_or_else(|| "local".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "local" => StorageBackend::Local {
                media_root: optional_env("MEDIA_ROOT")
                    .unwrap_or_else(|| "./media".to_string())
                    .into(),
            },
            "s3" => StorageBackend::S3(S3Settings {
                bucket: require_env("S3_BUCKET")?,
                endpoint: require_env("S3_ENDPOINT")?,
                region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            other => bail!("STORAGE_BACKEND must be 'local' or 's3', got '{other}'"),
        };

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            storage,
            resume_display_name: optional_env("RESUME_DISPLAY_NAME")
                .unwrap_or_else(|| "Resume.pdf".to_string()),
            storage_timeout: Duration::from_secs(
                optional_env("STORAGE_TIMEOUT_SECS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse::<u64>()
                    .context("STORAGE_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Treats empty values as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
