//! Structured pipeline events.
//!
//! The pipeline reports what it does through an [`EventSink`] handed to it in the
//! [`PipelineContext`](super::PipelineContext). [`TracingEventSink`] forwards everything to
//! `tracing`.

use crate::ocr::BackendId;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    CacheHit {
        key: String,
    },
    CacheMiss {
        key: String,
    },
    CacheWriteFailed {
        key: String,
        error: String,
    },
    BackendFailed {
        backend: BackendId,
        page: Option<u32>,
        error: String,
    },
    /// A full attempt produced no text. `backoff` is `None` after the last attempt.
    AttemptFailed {
        attempt: u32,
        page: Option<u32>,
        backoff: Option<Duration>,
    },
    Degrading {
        page: Option<u32>,
        attempts: u32,
    },
    RecognitionSucceeded {
        page: Option<u32>,
        attempts: u32,
        degraded: bool,
        chars: usize,
    },
    PageFailed {
        page: u32,
        error: String,
    },
    /// `bytes` is the size of the source file; `duration` covers the whole request.
    ExtractionFinished {
        source: PathBuf,
        bytes: u64,
        duration: Duration,
        pages: u32,
        failed_pages: u32,
        from_cache: bool,
    },
}

/// Receiver of pipeline events. Must be cheap; it is called inline.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::CacheHit { key } => tracing::debug!(key = %key, "OCR cache hit"),
            PipelineEvent::CacheMiss { key } => tracing::debug!(key = %key, "OCR cache miss"),
            PipelineEvent::CacheWriteFailed { key, error } => {
                tracing::warn!(key = %key, error = %error, "Failed to write OCR cache entry")
            }
            PipelineEvent::BackendFailed { backend, page, error } => {
                tracing::warn!(%backend, page, error = %error, "Recognition backend failed")
            }
            PipelineEvent::AttemptFailed { attempt, page, backoff } => {
                tracing::warn!(
                    attempt,
                    page,
                    backoff_secs = backoff.map(|d| d.as_secs()),
                    "Recognition attempt produced no text"
                )
            }
            PipelineEvent::Degrading { page, attempts } => {
                tracing::warn!(page, attempts, "Retries exhausted, trying degraded recognition")
            }
            PipelineEvent::RecognitionSucceeded {
                page,
                attempts,
                degraded,
                chars,
            } => tracing::debug!(page, attempts, degraded, chars, "Recognition succeeded"),
            PipelineEvent::PageFailed { page, error } => tracing::warn!(page, error = %error, "Page failed recognition"),
            PipelineEvent::ExtractionFinished {
                source,
                bytes,
                duration,
                pages,
                failed_pages,
                from_cache,
            } => tracing::info!(
                source = %source.display(),
                bytes,
                duration_ms = duration.as_millis() as u64,
                pages,
                failed_pages,
                from_cache,
                "Extraction finished"
            ),
        }
    }
}
