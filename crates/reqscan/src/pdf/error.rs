use crate::document::RasterError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfError {
    BindingFailed(String),
    InvalidPdf(String),
    PasswordRequired,
    PageNotFound(u32),
    RenderingFailed(String),
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfError::BindingFailed(msg) => write!(f, "Pdfium unavailable: {}", msg),
            PdfError::InvalidPdf(msg) => write!(f, "Invalid PDF: {}", msg),
            PdfError::PasswordRequired => write!(f, "PDF is password-protected"),
            PdfError::PageNotFound(page) => write!(f, "Page {} not found", page),
            PdfError::RenderingFailed(msg) => write!(f, "Page rendering failed: {}", msg),
        }
    }
}

impl std::error::Error for PdfError {}

/// Document-level problems close the whole document; the rest stay tied to the page.
impl PdfError {
    pub(crate) fn into_raster_error(self, page: Option<u32>) -> RasterError {
        match (self, page) {
            (err @ (PdfError::RenderingFailed(_) | PdfError::PageNotFound(_)), Some(page)) => RasterError::Page {
                page,
                message: err.to_string(),
            },
            (err, _) => RasterError::Open(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;
