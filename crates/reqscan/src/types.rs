use crate::error::PartialPageFailure;
use crate::ocr::{BackendError, BackendId};
use crate::{ExtractionError, Result};
use image::{ColorType, DynamicImage, GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Default number of full-pipeline attempts before degrading.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Input format, decided from the file extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredFormat {
    /// `.png`, `.jpg`, `.jpeg`
    Image,
    /// `.pdf`, rasterized page by page
    Pdf,
}

impl DeclaredFormat {
    /// Map a path's extension (case-insensitive) to a supported format.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// A validated, immutable extraction request.
///
/// Construction checks the extension only; it never touches the filesystem.
///
/// ```rust
/// use reqscan::{DeclaredFormat, ExtractionRequest};
///
/// let request = ExtractionRequest::new("requirements.PDF")?.with_max_retries(5);
/// assert_eq!(request.declared_format(), DeclaredFormat::Pdf);
/// assert_eq!(request.max_retries(), 5);
/// # Ok::<(), reqscan::ExtractionError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    source_path: PathBuf,
    declared_format: DeclaredFormat,
    max_retries: u32,
}

impl ExtractionRequest {
    /// # Errors
    ///
    /// `UnsupportedFormat` for any extension other than png, jpg, jpeg or pdf.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let source_path = path.into();
        let declared_format = DeclaredFormat::from_path(&source_path).ok_or_else(|| {
            let extension = source_path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default();
            let reason = if extension.is_empty() {
                "file has no extension; expected png, jpg, jpeg or pdf".to_string()
            } else {
                format!("extension '{}' is not one of png, jpg, jpeg, pdf", extension)
            };
            ExtractionError::unsupported(source_path.clone(), reason)
        })?;

        Ok(Self {
            source_path,
            declared_format,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn declared_format(&self) -> DeclaredFormat {
        self.declared_format
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// A decoded raster image moving through the pipeline.
///
/// Stages take a `Frame` by value and return a new one; backends only ever see `&Frame`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn from_luma(image: GrayImage) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel layout, e.g. `L8` for grayscale or `Rgb8`.
    pub fn color_type(&self) -> ColorType {
        self.image.color()
    }

    /// Bits per pixel.
    pub fn color_depth(&self) -> u16 {
        self.image.color().bits_per_pixel()
    }

    pub fn is_single_channel(&self) -> bool {
        self.image.color().channel_count() == 1
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    /// Single-channel 8-bit view, converting when needed.
    pub fn to_luma8(&self) -> GrayImage {
        match &self.image {
            DynamicImage::ImageLuma8(gray) => gray.clone(),
            other => other.to_luma8(),
        }
    }

    /// Encode as PNG for handing to an external engine.
    pub fn to_png_bytes(&self) -> std::result::Result<Vec<u8>, image::ImageError> {
        let mut buffer = Cursor::new(Vec::new());
        self.image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

/// Output of one backend on one frame.
///
/// A failed call and a successful call that found nothing are distinct: the first has an
/// `Err` outcome, the second `Ok` with no lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResult {
    pub backend: BackendId,
    pub outcome: std::result::Result<Vec<String>, BackendError>,
}

impl EngineResult {
    pub fn success(backend: BackendId, lines: Vec<String>) -> Self {
        Self {
            backend,
            outcome: Ok(lines),
        }
    }

    pub fn failure(backend: BackendId, error: BackendError) -> Self {
        Self {
            backend,
            outcome: Err(error),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Recognized lines; empty for a failed call.
    pub fn lines(&self) -> &[String] {
        match &self.outcome {
            Ok(lines) => lines,
            Err(_) => &[],
        }
    }

    /// Succeeded and produced at least one line.
    pub fn has_text(&self) -> bool {
        !self.lines().is_empty()
    }

    /// Lines joined with `\n`.
    pub fn joined(&self) -> String {
        self.lines().join("\n")
    }
}

/// Fused text of one frame. `page_no` is 1-based and absent for single images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusedText {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_no: Option<u32>,
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    /// Full text; pages joined with page markers
    pub text: String,

    /// Successfully recognized frames, in source order
    pub pages: Vec<FusedText>,

    /// Set when some pages of a document failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_failure: Option<PartialPageFailure>,

    /// Served from the result cache without running recognition
    pub from_cache: bool,
}

impl Extraction {
    pub fn is_partial(&self) -> bool {
        self.partial_failure.is_some()
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Treat a partial result as an error, for callers that need every page.
    pub fn into_complete(self) -> std::result::Result<String, PartialPageFailure> {
        match self.partial_failure {
            Some(partial) => Err(partial),
            None => Ok(self.text),
        }
    }
}
