//! Single-frame image loading.

use crate::types::Frame;
use crate::{ExtractionError, Result};
use image::ImageReader;
use std::io::Cursor;
use std::path::Path;

/// Decodes raster files into [`Frame`]s.
///
/// The format is sniffed from the bytes, not trusted from the extension, so a `.jpg` that is
/// really a PNG still loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageStore;

impl ImageStore {
    /// Decode a single frame from in-memory bytes.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` when the bytes are not a decodable image. `source` only labels the
    /// error.
    pub fn decode(bytes: &[u8], source: &Path) -> Result<Frame> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ExtractionError::unsupported(source, format!("Failed to read image format: {}", e)))?;

        if reader.format().is_none() {
            return Err(ExtractionError::unsupported(source, "Could not determine image format"));
        }

        let image = reader
            .decode()
            .map_err(|e| ExtractionError::unsupported(source, format!("Failed to decode image: {}", e)))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractionError::unsupported(source, "Image has zero size"));
        }

        tracing::debug!(
            source = %source.display(),
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            "Decoded image"
        );

        Ok(Frame::new(image))
    }

    /// Read and decode a frame from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Frame> {
        let path = path.as_ref();
        let bytes = crate::core::io::read_source(path)?;
        Self::decode(&bytes, path)
    }
}
