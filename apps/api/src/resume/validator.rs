//! Content validation for uploaded resumes.
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. declared size is non-zero
//! 2. declared size is at most [`MAX_SIZE`]
//! 3. filename extension is `.pdf` (any case)
//! 4. content starts with the `%PDF` signature
//!
//! A missing or odd `%PDF-x.y` version token is only logged; some valid
//! generators write nonstandard headers.

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

/// 5 MiB.
pub const MAX_SIZE: u64 = 5 * 1024 * 1024;

const PDF_SIGNATURE: &[u8] = b"%PDF";
/// `%PDF-1.7` is eight bytes.
const HEADER_PROBE_LEN: u64 = 8;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("The uploaded file is empty.")]
    EmptyFile,

    #[error("File is too large ({size} bytes). Maximum allowed size is 5 MB.")]
    TooLarge { size: u64 },

    #[error("Invalid file format. Please upload a PDF file.")]
    InvalidExtension,

    #[error("File content is not a valid PDF document.")]
    InvalidSignature,

    #[error("The uploaded file could not be read.")]
    UnreadableFile(#[source] io::Error),
}

impl ValidationError {
    /// Stable machine-readable code for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyFile => "EMPTY_FILE",
            ValidationError::TooLarge { .. } => "FILE_TOO_LARGE",
            ValidationError::InvalidExtension => "INVALID_EXTENSION",
            ValidationError::InvalidSignature => "INVALID_SIGNATURE",
            ValidationError::UnreadableFile(_) => "UNREADABLE_FILE",
        }
    }
}

/// Validates an upload without consuming it: the reader is left at the
/// position it had on entry.
pub fn validate<R: Read + Seek>(
    reader: &mut R,
    declared_filename: &str,
    declared_size: u64,
) -> Result<(), ValidationError> {
    if declared_size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if declared_size > MAX_SIZE {
        return Err(ValidationError::TooLarge {
            size: declared_size,
        });
    }
    if !has_pdf_extension(declared_filename) {
        return Err(ValidationError::InvalidExtension);
    }

    let header = peek_header(reader).map_err(ValidationError::UnreadableFile)?;
    if header.is_empty() {
        return Err(ValidationError::EmptyFile);
    }
    if !header.starts_with(PDF_SIGNATURE) {
        return Err(ValidationError::InvalidSignature);
    }

    if has_version_token(&header) {
        debug!(
            filename = declared_filename,
            header = %String::from_utf8_lossy(&header),
            "PDF header accepted"
        );
    } else {
        warn!(
            filename = declared_filename,
            header = %String::from_utf8_lossy(&header),
            "PDF signature present but version token is nonstandard"
        );
    }

    Ok(())
}

fn has_pdf_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Reads up to [`HEADER_PROBE_LEN`] bytes, then seeks back.
fn peek_header<R: Read + Seek>(reader: &mut R) -> io::Result<Vec<u8>> {
    let start = reader.stream_position()?;
    let mut header = Vec::with_capacity(HEADER_PROBE_LEN as usize);
    Read::by_ref(reader)
        .take(HEADER_PROBE_LEN)
        .read_to_end(&mut header)?;
    reader.seek(SeekFrom::Start(start))?;
    Ok(header)
}

/// `%PDF-<digit>.<digit>`
fn has_version_token(header: &[u8]) -> bool {
    matches!(
        header,
        [b'%', b'P', b'D', b'F', b'-', major, b'.', minor, ..]
            if major.is_ascii_digit() && minor.is_ascii_digit()
    )
}
