//! PDF page rasterization through pdfium.
//!
//! The pdfium shared library is bound at runtime on first use, from the directory (or file)
//! named by `REQSCAN_PDFIUM_PATH` or else from the system library search path.
//! Requires the `pdf` feature.

pub mod bindings;
pub mod error;
pub mod rendering;

pub use bindings::PDFIUM_PATH_ENV;
pub use error::PdfError;
pub use rendering::{PageRenderOptions, PdfiumRasterizer};
