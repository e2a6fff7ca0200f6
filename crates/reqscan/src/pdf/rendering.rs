use super::bindings::bind_pdfium;
use super::error::{PdfError, Result};
use crate::document::{PageRasterizer, RasterError};
use crate::types::Frame;
use image::DynamicImage;
use pdfium_render::prelude::*;

const PDF_POINTS_PER_INCH: f64 = 72.0;

/// Limits applied on top of the requested DPI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRenderOptions {
    /// Largest width or height, in pixels, a rendered page may have
    pub max_image_dimension: u32,
    pub auto_adjust_dpi: bool,
    pub min_dpi: u32,
    pub max_dpi: u32,
}

impl Default for PageRenderOptions {
    fn default() -> Self {
        Self {
            max_image_dimension: 65536,
            auto_adjust_dpi: true,
            min_dpi: 72,
            max_dpi: 600,
        }
    }
}

/// [`PageRasterizer`] backed by pdfium.
///
/// Holds no pdfium handle between calls, so it is freely shared across threads; each call
/// binds from the process-wide cached library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    options: PageRenderOptions,
}

impl PdfiumRasterizer {
    /// Fails when the pdfium library cannot be bound.
    pub fn new() -> Result<Self> {
        bind_pdfium(PdfError::BindingFailed, "rasterizer setup")?;
        Ok(Self::default())
    }

    pub fn with_options(mut self, options: PageRenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PageRenderOptions {
        &self.options
    }

    fn pdfium(context: &'static str) -> Result<Pdfium> {
        let bindings = bind_pdfium(PdfError::BindingFailed, context)?;
        Ok(Pdfium::new(bindings))
    }

    fn load<'a>(pdfium: &'a Pdfium, bytes: &'a [u8]) -> Result<PdfDocument<'a>> {
        pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("password") || err_msg.contains("Password") {
                PdfError::PasswordRequired
            } else {
                PdfError::InvalidPdf(err_msg)
            }
        })
    }

    fn count_pages(&self, bytes: &[u8]) -> Result<u32> {
        let pdfium = Self::pdfium("page count")?;
        let document = Self::load(&pdfium, bytes)?;
        Ok(document.pages().len() as u32)
    }

    fn render(&self, bytes: &[u8], index: u32, target_dpi: u32) -> Result<DynamicImage> {
        let pdfium = Self::pdfium("page rendering")?;
        let document = Self::load(&pdfium, bytes)?;

        let page = document
            .pages()
            .get(index as u16)
            .map_err(|_| PdfError::PageNotFound(index + 1))?;

        let width_points = page.width().value;
        let height_points = page.height().value;

        let dpi = if self.options.auto_adjust_dpi {
            calculate_optimal_dpi(
                width_points as f64,
                height_points as f64,
                target_dpi,
                self.options.max_image_dimension,
                self.options.min_dpi,
                self.options.max_dpi,
            )
        } else {
            target_dpi
        };

        let scale = dpi as f64 / PDF_POINTS_PER_INCH;

        let config = PdfRenderConfig::new()
            .set_target_width(((width_points * scale as f32) as i32).max(1))
            .set_target_height(((height_points * scale as f32) as i32).max(1))
            .rotate_if_landscape(PdfPageRenderRotation::None, false);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PdfError::RenderingFailed(format!("Failed to render page: {}", e)))?;

        tracing::debug!(page = index + 1, dpi, "Rendered PDF page");

        Ok(DynamicImage::ImageRgb8(bitmap.as_image().into_rgb8()))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn page_count(&self, document: &[u8]) -> std::result::Result<u32, RasterError> {
        self.count_pages(document).map_err(|e| e.into_raster_error(None))
    }

    fn render_page(&self, document: &[u8], index: u32, dpi: u32) -> std::result::Result<Frame, RasterError> {
        self.render(document, index, dpi)
            .map(Frame::new)
            .map_err(|e| e.into_raster_error(Some(index + 1)))
    }
}

/// Lower the DPI when rendering at `target_dpi` would exceed `max_dimension` pixels on
/// either side, then clamp into `[min_dpi, max_dpi]`.
fn calculate_optimal_dpi(
    page_width: f64,
    page_height: f64,
    target_dpi: u32,
    max_dimension: u32,
    min_dpi: u32,
    max_dpi: u32,
) -> u32 {
    let width_inches = page_width / PDF_POINTS_PER_INCH;
    let height_inches = page_height / PDF_POINTS_PER_INCH;

    let width_at_target = width_inches * target_dpi as f64;
    let height_at_target = height_inches * target_dpi as f64;

    if width_at_target <= max_dimension as f64 && height_at_target <= max_dimension as f64 {
        return target_dpi.clamp(min_dpi, max_dpi);
    }

    let width_limited_dpi = (max_dimension as f64 / width_inches) as u32;
    let height_limited_dpi = (max_dimension as f64 / height_inches) as u32;

    width_limited_dpi.min(height_limited_dpi).clamp(min_dpi, max_dpi)
}
