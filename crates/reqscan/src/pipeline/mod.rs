//! The extraction pipeline.
//!
//! [`Pipeline::extract`] validates the request, consults the result cache, and otherwise runs
//! every frame (the image itself, or each rendered PDF page) through the
//! [`RetryController`]. Collaborators with side effects (cache, event sink, sleeper, page
//! rasterizer) are injected through [`PipelineContext`] and the builder methods, so the
//! whole pipeline runs in tests without engines or a filesystem cache.
//!
//! # Example
//!
//! ```rust,no_run
//! use reqscan::{ExtractionRequest, Pipeline, ReqscanConfig};
//!
//! # fn example() -> reqscan::Result<()> {
//! let pipeline = Pipeline::from_config(&ReqscanConfig::default())?;
//! let extraction = pipeline.extract(&ExtractionRequest::new("requirements.pdf")?)?;
//! if let Some(partial) = &extraction.partial_failure {
//!     eprintln!("warning: {}", partial);
//! }
//! println!("{}", extraction.text);
//! # Ok(())
//! # }
//! ```
pub mod events;

pub use events::{EventSink, PipelineEvent, TracingEventSink};

use crate::core::config::{OcrConfig, ReqscanConfig};
use crate::core::io::{content_key, read_source, validate_file_exists};
use crate::document::{DocumentIterator, PageRasterizer};
use crate::error::PartialPageFailure;
use crate::imaging::{ImageStore, Preprocessor};
use crate::ocr::{BackendSet, OcrCache, RetryController, Sleeper, ThreadSleeper};
use crate::types::{DeclaredFormat, Extraction, ExtractionRequest, FusedText};
use crate::{ExtractionError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Shared collaborators of a [`Pipeline`].
///
/// The default has no cache, logs events through `tracing` and sleeps on the calling thread.
#[derive(Clone)]
pub struct PipelineContext {
    cache: Option<Arc<OcrCache>>,
    events: Arc<dyn EventSink>,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self {
            cache: None,
            events: Arc::new(TracingEventSink),
            sleeper: Arc::new(ThreadSleeper),
        }
    }
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: Arc<OcrCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn cache(&self) -> Option<&OcrCache> {
        self.cache.as_deref()
    }

    fn emit(&self, event: PipelineEvent) {
        self.events.emit(&event);
    }
}

/// Text extraction from scanned images and PDFs.
///
/// `Pipeline` is `Send + Sync`. Requests run synchronously on the calling thread; the only
/// state shared between concurrent requests is the result cache.
pub struct Pipeline {
    backends: BackendSet,
    preprocessor: Preprocessor,
    context: PipelineContext,
    rasterizer: Option<Box<dyn PageRasterizer>>,
    pdf_dpi: u32,
}

impl Pipeline {
    /// Pipeline with default preprocessing and no PDF support until a rasterizer is set.
    pub fn new(backends: BackendSet, context: PipelineContext) -> Self {
        Self {
            backends,
            preprocessor: Preprocessor::default(),
            context,
            rasterizer: None,
            pdf_dpi: OcrConfig::default().pdf_dpi,
        }
    }

    /// Build from configuration: engines, preprocessing, cache and (with the `pdf` feature)
    /// the pdfium rasterizer.
    ///
    /// # Errors
    ///
    /// `Config` for invalid settings or an unusable cache directory; `NoBackendAvailable`
    /// when no engine could be initialized.
    pub fn from_config(config: &ReqscanConfig) -> Result<Self> {
        config.validate()?;

        let backends = BackendSet::from_config(&config.ocr)?;

        let mut context = PipelineContext::default();
        if config.cache.enabled {
            context = context.with_cache(Arc::new(OcrCache::from_config(&config.cache)?));
        }

        let pipeline = Self::new(backends, context)
            .with_preprocessor(Preprocessor::new(config.preprocessing.clone()))
            .with_pdf_dpi(config.ocr.pdf_dpi);

        #[cfg(feature = "pdf")]
        let pipeline = match crate::pdf::PdfiumRasterizer::new() {
            Ok(rasterizer) => pipeline.with_rasterizer(rasterizer),
            Err(e) => {
                tracing::warn!(error = %e, "Pdfium unavailable, PDF input disabled");
                pipeline
            }
        };

        Ok(pipeline)
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: impl PageRasterizer + 'static) -> Self {
        self.rasterizer = Some(Box::new(rasterizer));
        self
    }

    pub fn with_pdf_dpi(mut self, dpi: u32) -> Self {
        self.pdf_dpi = dpi;
        self
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Extract the text of `request`'s source file.
    ///
    /// A cache hit returns the stored text without decoding or recognizing anything; the
    /// result then has a single page entry without a page number. Only complete results are
    /// written to the cache.
    ///
    /// # Errors
    ///
    /// - `FileNotFound` when the source does not exist (checked before anything else runs)
    /// - `UnsupportedFormat` when the content cannot be decoded, or a PDF cannot be opened
    /// - `RecognitionExhausted` when no text came out of an image, or out of any page
    /// - `Io` for other read failures
    ///
    /// Some failed pages of a PDF are not an error: see [`Extraction::partial_failure`].
    pub fn extract(&self, request: &ExtractionRequest) -> Result<Extraction> {
        let started = Instant::now();
        let path = request.source_path();
        validate_file_exists(path)?;
        let bytes = read_source(path)?;
        tracing::debug!(source = %path.display(), bytes = bytes.len(), "Starting extraction");

        let key = content_key(&bytes);
        if let Some(text) = self.cached(&key) {
            self.context.emit(PipelineEvent::ExtractionFinished {
                source: path.to_path_buf(),
                bytes: bytes.len() as u64,
                duration: started.elapsed(),
                pages: 1,
                failed_pages: 0,
                from_cache: true,
            });
            return Ok(Extraction {
                pages: vec![FusedText {
                    text: text.clone(),
                    page_no: None,
                }],
                text,
                partial_failure: None,
                from_cache: true,
            });
        }

        let extraction = match request.declared_format() {
            DeclaredFormat::Image => self.extract_image(request, &bytes)?,
            DeclaredFormat::Pdf => self.extract_document(request, &bytes)?,
        };

        if !extraction.is_partial() {
            self.store(&key, &extraction.text);
        }

        let failed_pages = extraction
            .partial_failure
            .as_ref()
            .map_or(0, |partial| partial.failed_pages.len() as u32);
        self.context.emit(PipelineEvent::ExtractionFinished {
            source: path.to_path_buf(),
            bytes: bytes.len() as u64,
            duration: started.elapsed(),
            pages: extraction.pages.len() as u32 + failed_pages,
            failed_pages,
            from_cache: false,
        });

        Ok(extraction)
    }

    fn controller(&self, max_retries: u32) -> RetryController<'_> {
        RetryController::new(
            &self.preprocessor,
            &self.backends,
            self.context.sleeper.as_ref(),
            self.context.events.as_ref(),
            max_retries,
        )
    }

    fn cached(&self, key: &str) -> Option<String> {
        let cache = self.context.cache()?;
        match cache.get(key) {
            Some(text) => {
                self.context.emit(PipelineEvent::CacheHit { key: key.to_string() });
                Some(text)
            }
            None => {
                self.context.emit(PipelineEvent::CacheMiss { key: key.to_string() });
                None
            }
        }
    }

    fn store(&self, key: &str, text: &str) {
        if let Some(cache) = self.context.cache()
            && let Err(e) = cache.set(key, text)
        {
            self.context.emit(PipelineEvent::CacheWriteFailed {
                key: key.to_string(),
                error: e.to_string(),
            });
        }
    }

    fn extract_image(&self, request: &ExtractionRequest, bytes: &[u8]) -> Result<Extraction> {
        let frame = ImageStore::decode(bytes, request.source_path())?;
        let text = self.controller(request.max_retries()).run(&frame)?;

        Ok(Extraction {
            pages: vec![FusedText {
                text: text.clone(),
                page_no: None,
            }],
            text,
            partial_failure: None,
            from_cache: false,
        })
    }

    fn extract_document(&self, request: &ExtractionRequest, bytes: &[u8]) -> Result<Extraction> {
        let path = request.source_path();
        let rasterizer = self.rasterizer.as_deref().ok_or_else(|| {
            ExtractionError::unsupported(path, "no PDF renderer available (requires pdfium and the `pdf` feature)")
        })?;

        let document = DocumentIterator::open(bytes, rasterizer, self.pdf_dpi)
            .map_err(|e| ExtractionError::unsupported(path, e.to_string()))?;
        let total_pages = document.page_count();

        let mut pages = Vec::new();
        let mut failed_pages = Vec::new();
        let mut last_error = None;

        for (page_no, frame) in document.pages() {
            let outcome = frame.map_err(|e| e.to_string()).and_then(|frame| {
                self.controller(request.max_retries())
                    .for_page(Some(page_no))
                    .run(&frame)
                    .map_err(|e| {
                        let message = e.to_string();
                        last_error = Some(e);
                        message
                    })
            });

            match outcome {
                Ok(text) => pages.push(FusedText {
                    text,
                    page_no: Some(page_no),
                }),
                Err(error) => {
                    self.context.emit(PipelineEvent::PageFailed { page: page_no, error });
                    failed_pages.push(page_no);
                }
            }
        }

        if pages.is_empty() {
            // No error recorded means no page rendered at all
            return Err(last_error.unwrap_or(ExtractionError::RecognitionExhausted { attempts: 0 }));
        }

        let partial_failure = (!failed_pages.is_empty()).then(|| PartialPageFailure {
            failed_pages,
            total_pages,
        });

        Ok(Extraction {
            text: join_pages(&pages),
            pages,
            partial_failure,
            from_cache: false,
        })
    }
}

/// `--- Page N ---` followed by the page text, pages separated by a blank line.
fn join_pages(pages: &[FusedText]) -> String {
    pages
        .iter()
        .map(|page| match page.page_no {
            Some(page_no) => format!("--- Page {} ---\n{}", page_no, page.text),
            None => page.text.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build a pipeline from `config` and extract `path` with the configured retry budget.
///
/// # Errors
///
/// Everything [`Pipeline::from_config`] and [`Pipeline::extract`] can return.
pub fn extract_file(path: impl AsRef<Path>, config: &ReqscanConfig) -> Result<Extraction> {
    let request = ExtractionRequest::new(path.as_ref())?.with_max_retries(config.ocr.max_retries);
    Pipeline::from_config(config)?.extract(&request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str, page_no: Option<u32>) -> FusedText {
        FusedText {
            text: text.to_string(),
            page_no,
        }
    }

    #[test]
    fn test_join_pages_marks_each_page() {
        let text = join_pages(&[page("first", Some(1)), page("third", Some(3))]);
        assert_eq!(text, "--- Page 1 ---\nfirst\n\n--- Page 3 ---\nthird");
    }

    #[test]
    fn test_join_pages_single_image_has_no_marker() {
        assert_eq!(join_pages(&[page("Hello\nWorld", None)]), "Hello\nWorld");
    }

    #[test]
    fn test_pipeline_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
        assert_send_sync::<PipelineContext>();
    }
}
