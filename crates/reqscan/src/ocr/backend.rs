//! Recognition backends and the registry of enabled ones.
//!
//! A backend is anything implementing [`Recognizer`]. The concrete engines live in a fixed
//! [`Engine`] enum, and a [`BackendSet`] records exactly which of them are enabled and in
//! which order they run.

use super::error::BackendError;
use super::paddle::PaddleEngine;
use super::tesseract::TesseractEngine;
use crate::core::config::OcrConfig;
use crate::types::{EngineResult, Frame};
use crate::{ExtractionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability of turning a frame into lines of text.
///
/// # Thread Safety
///
/// Recognizers must be `Send + Sync` so a pipeline can be handed to a worker thread.
///
/// # Example
///
/// ```rust
/// use reqscan::ocr::{BackendError, Recognizer};
/// use reqscan::Frame;
///
/// struct Fixed;
///
/// impl Recognizer for Fixed {
///     fn name(&self) -> &str { "fixed" }
///     fn recognize(&self, _frame: &Frame) -> Result<Vec<String>, BackendError> {
///         Ok(vec!["hello".to_string()])
///     }
/// }
/// ```
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &str;

    /// Lines in reading order, as the engine emits them.
    fn recognize(&self, frame: &Frame) -> std::result::Result<Vec<String>, BackendError>;
}

/// Role of a backend in fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    Primary,
    Secondary,
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// The known engine variants.
pub enum Engine {
    Paddle(PaddleEngine),
    Tesseract(TesseractEngine),
    /// Any other recognizer, e.g. a test double or an in-process model
    Custom(Box<dyn Recognizer>),
}

impl Engine {
    pub fn custom(recognizer: impl Recognizer + 'static) -> Self {
        Self::Custom(Box::new(recognizer))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Paddle(engine) => engine.name(),
            Self::Tesseract(engine) => engine.name(),
            Self::Custom(engine) => engine.name(),
        }
    }

    pub fn recognize(&self, frame: &Frame) -> std::result::Result<Vec<String>, BackendError> {
        match self {
            Self::Paddle(engine) => engine.recognize(frame),
            Self::Tesseract(engine) => engine.recognize(frame),
            Self::Custom(engine) => engine.recognize(frame),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paddle(engine) => f.debug_tuple("Paddle").field(engine).finish(),
            Self::Tesseract(engine) => f.debug_tuple("Tesseract").field(engine).finish(),
            Self::Custom(engine) => f.debug_tuple("Custom").field(&engine.name()).finish(),
        }
    }
}

#[derive(Debug)]
struct Backend {
    id: BackendId,
    engine: Engine,
}

/// Ordered set of enabled backends, primary first.
#[derive(Debug)]
pub struct BackendSet {
    backends: Vec<Backend>,
}

impl BackendSet {
    /// Build from already-initialized engines.
    ///
    /// # Errors
    ///
    /// `NoBackendAvailable` when `engines` is empty; `Config` when a role appears twice.
    pub fn new(engines: Vec<(BackendId, Engine)>) -> Result<Self> {
        if engines.is_empty() {
            return Err(ExtractionError::NoBackendAvailable);
        }

        let mut backends: Vec<Backend> = engines.into_iter().map(|(id, engine)| Backend { id, engine }).collect();
        backends.sort_by_key(|backend| backend.id);
        if backends.windows(2).any(|pair| pair[0].id == pair[1].id) {
            return Err(ExtractionError::config("Each backend role may be registered only once"));
        }

        Ok(Self { backends })
    }

    /// Initialize the engines enabled in `config`.
    ///
    /// An engine that fails to initialize is logged and left out.
    ///
    /// # Errors
    ///
    /// `NoBackendAvailable` when no engine could be initialized.
    pub fn from_config(config: &OcrConfig) -> Result<Self> {
        let mut engines = Vec::new();

        if config.use_primary {
            match PaddleEngine::initialize(&config.paddle_command, &config.languages) {
                Ok(engine) => engines.push((BackendId::Primary, Engine::Paddle(engine))),
                Err(e) => tracing::warn!(error = %e, "PaddleOCR unavailable, primary backend disabled"),
            }
        }

        if config.use_secondary {
            match TesseractEngine::initialize(&config.tesseract_command, &config.languages, config.tesseract_psm) {
                Ok(engine) => engines.push((BackendId::Secondary, Engine::Tesseract(engine))),
                Err(e) => tracing::warn!(error = %e, "Tesseract unavailable, secondary backend disabled"),
            }
        }

        let set = Self::new(engines)?;
        tracing::info!(backends = ?set.ids(), "Recognition backends ready");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn ids(&self) -> Vec<BackendId> {
        self.backends.iter().map(|backend| backend.id).collect()
    }

    pub fn is_enabled(&self, id: BackendId) -> bool {
        self.backends.iter().any(|backend| backend.id == id)
    }

    pub fn name_of(&self, id: BackendId) -> Option<&str> {
        self.backends
            .iter()
            .find(|backend| backend.id == id)
            .map(|backend| backend.engine.name())
    }

    /// Run every backend on `frame`. A failing backend yields a failed result and does not
    /// stop the others.
    pub fn recognize_all(&self, frame: &Frame) -> Vec<EngineResult> {
        self.backends.iter().map(|backend| run_backend(backend, frame)).collect()
    }

    /// Run backends one at a time in registry order, calling `on_result` after each, and
    /// stop at the first one that produces text.
    pub fn recognize_first(&self, frame: &Frame, mut on_result: impl FnMut(&EngineResult)) -> Option<EngineResult> {
        for backend in &self.backends {
            let result = run_backend(backend, frame);
            on_result(&result);
            if result.has_text() {
                return Some(result);
            }
        }
        None
    }
}

fn run_backend(backend: &Backend, frame: &Frame) -> EngineResult {
    match backend.engine.recognize(frame) {
        Ok(lines) => EngineResult::success(backend.id, normalize_lines(lines)),
        Err(e) => EngineResult::failure(backend.id, e),
    }
}

/// Trim each line and drop the ones left empty.
pub fn normalize_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                None
            } else if trimmed.len() == line.len() {
                Some(line)
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}
