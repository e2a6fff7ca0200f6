//! reqscan - resilient OCR extraction for scanned requirement documents
//!
//! reqscan turns scanned images and PDFs into plain text. Every frame is normalized
//! (grayscale, denoise, local contrast, deskew), recognized by up to two engines, fused into
//! one text and cached by content hash. Failed attempts back off exponentially and finish
//! with a degraded single-engine pass before giving up.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use reqscan::{ReqscanConfig, extract_file};
//!
//! # fn main() -> reqscan::Result<()> {
//! let config = ReqscanConfig::discover()?.unwrap_or_default();
//! let extraction = extract_file("requirements.pdf", &config)?;
//! println!("{}", extraction.text);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Core Module** (`core`): configuration loading, source I/O and content hashing
//! - **Imaging** (`imaging`): image decoding and the preprocessing chain
//! - **OCR** (`ocr`): engines, fusion, result cache and the retry state machine
//! - **Documents** (`document`, `pdf`): page iteration and pdfium rasterization
//! - **Pipeline** (`pipeline`): orchestration, injected context and structured events

#![deny(unsafe_code)]

pub mod core;
pub mod document;
pub mod error;
pub mod imaging;
pub mod ocr;
pub mod pipeline;
pub mod types;

#[cfg(feature = "pdf")]
pub mod pdf;

pub use error::{ExtractionError, PartialPageFailure, Result};

pub use types::{DeclaredFormat, EngineResult, Extraction, ExtractionRequest, Frame, FusedText};

pub use core::config::{CacheConfig, OcrConfig, PreprocessingConfig, ReqscanConfig};

pub use pipeline::{EventSink, Pipeline, PipelineContext, PipelineEvent, TracingEventSink, extract_file};
