//! Shared fakes and fixtures for integration tests.
//!
//! Nothing here needs an OCR engine, pdfium or the user's cache directory.

#![allow(dead_code)]

use image::{GrayImage, Luma};
use reqscan::document::{PageRasterizer, RasterError};
use reqscan::ocr::{BackendError, BackendId, BackendSet, Engine, Recognizer, Sleeper};
use reqscan::{EventSink, Frame, Pipeline, PipelineContext, PipelineEvent, TracingEventSink};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Script = dyn Fn(&Frame) -> Result<Vec<String>, BackendError> + Send + Sync;

/// Recognizer driven by a closure. Clones share the call counter.
#[derive(Clone)]
pub struct Scripted {
    name: &'static str,
    script: Arc<Script>,
    calls: Arc<AtomicU32>,
}

impl Scripted {
    pub fn new(
        name: &'static str,
        script: impl Fn(&Frame) -> Result<Vec<String>, BackendError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            script: Arc::new(script),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Always returns `lines`.
    pub fn lines(name: &'static str, lines: &[&str]) -> Self {
        let lines: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
        Self::new(name, move |_| Ok(lines.clone()))
    }

    /// Always succeeds without text.
    pub fn empty(name: &'static str) -> Self {
        Self::new(name, |_| Ok(Vec::new()))
    }

    /// Always fails.
    pub fn failing(name: &'static str) -> Self {
        Self::new(name, |_| Err(BackendError::ProcessingFailed("engine crashed".to_string())))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recognizer for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn recognize(&self, frame: &Frame) -> Result<Vec<String>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(frame)
    }
}

#[derive(Default)]
pub struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<PipelineEvent>>);

impl RecordingSink {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &PipelineEvent) {
        TracingEventSink.emit(event);
        self.0.lock().unwrap().push(event.clone());
    }
}

/// Page `i` (0-based) renders as a blank frame `page_width(i)` pixels wide, so recognizers
/// can tell pages apart after preprocessing.
pub struct FakeRasterizer {
    pub pages: u32,
    pub unrenderable: Option<u32>,
    pub renders: Arc<AtomicU32>,
}

impl FakeRasterizer {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            unrenderable: None,
            renders: Arc::new(AtomicU32::new(0)),
        }
    }
}

pub fn page_width(index: u32) -> u32 {
    40 + 10 * index
}

/// 1-based page number of a frame produced by [`FakeRasterizer`].
pub fn page_of(frame: &Frame) -> u32 {
    (frame.width() - 40) / 10 + 1
}

impl PageRasterizer for FakeRasterizer {
    fn page_count(&self, document: &[u8]) -> Result<u32, RasterError> {
        if !document.starts_with(b"%PDF") {
            return Err(RasterError::Open("missing PDF header".to_string()));
        }
        Ok(self.pages)
    }

    fn render_page(&self, _document: &[u8], index: u32, _dpi: u32) -> Result<Frame, RasterError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if Some(index) == self.unrenderable {
            return Err(RasterError::Page {
                page: index + 1,
                message: "broken content stream".to_string(),
            });
        }
        Ok(Frame::from_luma(GrayImage::from_pixel(page_width(index), 30, Luma([230]))))
    }
}

/// A grayscale PNG with a dark bar across the middle.
pub fn write_png(dir: &Path, name: &str) -> PathBuf {
    let image = GrayImage::from_fn(64, 48, |_, y| if (20..28).contains(&y) { Luma([20]) } else { Luma([235]) });
    let path = dir.join(name);
    image.save(&path).unwrap();
    path
}

pub fn write_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.4\n% fixture\n").unwrap();
    path
}

pub struct Harness {
    pub sleeper: Arc<RecordingSleeper>,
    pub events: Arc<RecordingSink>,
}

/// Route library logs to the test harness; `RUST_LOG=reqscan=debug` shows pipeline events.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Harness {
    pub fn new() -> Self {
        init_test_tracing();
        Self {
            sleeper: Arc::new(RecordingSleeper::default()),
            events: Arc::new(RecordingSink::default()),
        }
    }

    pub fn context(&self) -> PipelineContext {
        PipelineContext::new()
            .with_sleeper(self.sleeper.clone())
            .with_events(self.events.clone())
    }

    pub fn pipeline(&self, primary: Option<Scripted>, secondary: Option<Scripted>) -> Pipeline {
        self.pipeline_with(primary, secondary, self.context())
    }

    pub fn pipeline_with(
        &self,
        primary: Option<Scripted>,
        secondary: Option<Scripted>,
        context: PipelineContext,
    ) -> Pipeline {
        let mut engines = Vec::new();
        if let Some(primary) = primary {
            engines.push((BackendId::Primary, Engine::custom(primary)));
        }
        if let Some(secondary) = secondary {
            engines.push((BackendId::Secondary, Engine::custom(secondary)));
        }
        Pipeline::new(BackendSet::new(engines).unwrap(), context)
    }
}
