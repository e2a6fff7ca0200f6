//! Frame normalization ahead of recognition.

use super::clahe::clahe;
use super::filter::gaussian_denoise;
use super::skew::{SkewParams, correct_skew};
use crate::core::config::PreprocessingConfig;
use crate::types::Frame;

/// Turns a raw frame into a single-channel, denoised, contrast-enhanced and straightened one.
///
/// Every step is total: an image too small for a step passes through it unchanged, and a
/// page without a usable skew estimate is not rotated. `process` consumes its input and
/// returns a new frame.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessingConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Full normalization: grayscale, denoise, contrast enhancement, then skew correction
    /// when enabled.
    pub fn process(&self, frame: Frame) -> Frame {
        self.run(frame, self.config.deskew)
    }

    /// Normalization without skew correction, used by the degraded recognition pass.
    pub fn process_without_deskew(&self, frame: Frame) -> Frame {
        self.run(frame, false)
    }

    fn run(&self, frame: Frame, deskew: bool) -> Frame {
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return frame;
        }

        let gray = match frame.into_image() {
            image::DynamicImage::ImageLuma8(gray) => gray,
            other => other.to_luma8(),
        };
        let denoised = gaussian_denoise(&gray, self.config.denoise_kernel);
        let enhanced = clahe(&denoised, self.config.clahe_clip_limit, self.config.clahe_tile_grid);

        let output = if deskew {
            let (straightened, angle) = correct_skew(enhanced, &self.skew_params());
            if let Some(angle) = angle {
                tracing::debug!(angle, width, height, "Applied skew correction");
            }
            straightened
        } else {
            enhanced
        };

        Frame::from_luma(output)
    }

    fn skew_params(&self) -> SkewParams {
        SkewParams {
            canny_low: self.config.canny_low,
            canny_high: self.config.canny_high,
            hough_threshold: self.config.hough_threshold,
            max_lines: self.config.max_skew_lines,
            min_degrees: self.config.min_skew_degrees,
        }
    }
}
