//! File I/O utilities.
//!
//! Reading source files with the pipeline's error mapping, and the content hash that keys
//! the result cache.

use crate::{ExtractionError, Result};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::Path;

/// Validate that a file exists.
///
/// # Errors
///
/// Returns `ExtractionError::FileNotFound` if nothing exists at `path`.
pub fn validate_file_exists(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ExtractionError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Read a source file fully into memory.
///
/// # Errors
///
/// A file that vanished between validation and reading is `FileNotFound`; any other I/O
/// error bubbles up as `ExtractionError::Io`.
pub fn read_source(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ExtractionError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ExtractionError::Io(e),
    })
}

/// Cache key for a file's content: lowercase hex SHA-256 of the full byte stream.
///
/// Depends only on content, so renaming or moving a file keeps its key.
pub fn content_key(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
