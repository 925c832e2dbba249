//! Storage key derivation. Pure: same inputs, same key.

use chrono::{DateTime, Utc};

pub const KEY_PREFIX: &str = "resumes";
const DEFAULT_STEM: &str = "resume";
const DEFAULT_EXTENSION: &str = "pdf";

/// Derives `resumes/<stem>_<YYYYMMDD_HHMMSS>.<ext>` from an uploader-supplied
/// filename. Directory components are dropped and the stem keeps only
/// letters, digits, hyphens and underscores (spaces collapse to `_`).
pub fn derive_storage_key(original_filename: &str, uploaded_at: DateTime<Utc>) -> String {
    let base = original_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_filename);

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (base, ""),
    };

    format!(
        "{KEY_PREFIX}/{}_{}.{}",
        sanitize_stem(stem),
        uploaded_at.format("%Y%m%d_%H%M%S"),
        sanitize_extension(ext)
    )
}

fn sanitize_stem(stem: &str) -> String {
    let kept: String = stem
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let joined = kept.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        joined
    }
}

fn sanitize_extension(ext: &str) -> String {
    let ext: String = ext
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        ext
    }
}
