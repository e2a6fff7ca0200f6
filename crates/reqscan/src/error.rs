//! Error types for reqscan.
//!
//! Only the kinds a caller can act on cross the public boundary:
//!
//! - `FileNotFound` / `UnsupportedFormat` - bad input, failed immediately and never retried
//! - `NoBackendAvailable` - no recognition engine could be initialized (construction time)
//! - `RecognitionExhausted` - every attempt, including the degraded pass, produced no text
//! - `PartialPageFailure` - some pages of a document failed while others succeeded
//!
//! Two ambient variants sit next to them:
//!
//! - `Io` - system I/O errors other than "not found" bubble up unchanged
//! - `Config` - invalid configuration or an unusable cache directory
//!
//! Backend, preprocessing, cache and rasterizer failures are handled inside the core and
//! never surface here as raw errors.
//!
//! # Example
//!
//! ```rust
//! use reqscan::{ExtractionError, ExtractionRequest};
//!
//! let err = ExtractionRequest::new("scan.gif").unwrap_err();
//! assert!(matches!(err, ExtractionError::UnsupportedFormat { .. }));
//! ```
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ExtractionError`.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Main error type for all reqscan operations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Unsupported format for {}: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("No recognition backend available")]
    NoBackendAvailable,

    #[error("Recognition produced no text after {attempts} attempts (including degraded mode)")]
    RecognitionExhausted { attempts: u32 },

    #[error(transparent)]
    PartialPageFailure(#[from] PartialPageFailure),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Pages of a multi-page document that failed while at least one other page succeeded.
///
/// Returned alongside the successful text in [`crate::Extraction`], so callers can warn the
/// user without losing the pages that were recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{} of {total_pages} pages failed recognition (pages {})", failed_pages.len(), format_pages(failed_pages))]
pub struct PartialPageFailure {
    /// 1-based page numbers, in source order
    pub failed_pages: Vec<u32>,
    pub total_pages: u32,
}

fn format_pages(pages: &[u32]) -> String {
    pages.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
}

impl ExtractionError {
    pub fn unsupported<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::UnsupportedFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the caller should present this as a retryable warning rather than a blocking
    /// input or configuration error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RecognitionExhausted { .. } | Self::PartialPageFailure(_)
        )
    }
}
