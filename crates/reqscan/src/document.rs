//! Page-by-page access to multi-page documents.
//!
//! A [`PageRasterizer`] knows how to count and render the pages of a document format.
//! [`DocumentIterator`] wraps one document and hands out frames lazily: a page is rendered
//! only when the iterator reaches it, and [`DocumentIterator::pages`] can be called again
//! to start over.

use crate::types::Frame;
use thiserror::Error;

/// Rasterization failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    /// The document as a whole is unusable (corrupt, encrypted, renderer missing)
    #[error("Document could not be opened: {0}")]
    Open(String),

    /// One page failed; the others may still render
    #[error("Page {page} could not be rendered: {message}")]
    Page { page: u32, message: String },
}

/// Renders pages of a paginated document into frames.
pub trait PageRasterizer: Send + Sync {
    fn page_count(&self, document: &[u8]) -> Result<u32, RasterError>;

    /// Render the page at 0-based `index` at roughly `dpi`.
    fn render_page(&self, document: &[u8], index: u32, dpi: u32) -> Result<Frame, RasterError>;
}

/// A finite, ordered, restartable sequence of page frames.
pub struct DocumentIterator<'a> {
    document: &'a [u8],
    rasterizer: &'a dyn PageRasterizer,
    dpi: u32,
    page_count: u32,
}

impl<'a> DocumentIterator<'a> {
    /// Count the pages of `document`. Nothing is rendered yet.
    ///
    /// # Errors
    ///
    /// `RasterError::Open` when the document cannot be opened or has no pages.
    pub fn open(document: &'a [u8], rasterizer: &'a dyn PageRasterizer, dpi: u32) -> Result<Self, RasterError> {
        let page_count = rasterizer.page_count(document)?;
        if page_count == 0 {
            return Err(RasterError::Open("document has no pages".to_string()));
        }
        Ok(Self {
            document,
            rasterizer,
            dpi,
            page_count,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Iterate from the first page. Each item is `(page_no, frame)` with 1-based `page_no`.
    pub fn pages(&self) -> Pages<'_, 'a> {
        Pages { doc: self, next: 0 }
    }
}

/// Iterator over the pages of a [`DocumentIterator`].
pub struct Pages<'d, 'a> {
    doc: &'d DocumentIterator<'a>,
    next: u32,
}

impl Iterator for Pages<'_, '_> {
    type Item = (u32, Result<Frame, RasterError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.doc.page_count {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let frame = self
            .doc
            .rasterizer
            .render_page(self.doc.document, index, self.doc.dpi)
            .map_err(|e| match e {
                RasterError::Open(message) => RasterError::Page {
                    page: index + 1,
                    message,
                },
                page_error => page_error,
            });
        Some((index + 1, frame))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.doc.page_count - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Pages<'_, '_> {}
