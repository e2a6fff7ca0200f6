//! Skew estimation and correction.
//!
//! Edges come from Canny; straight lines from a standard Hough transform at 1 px / 1°
//! resolution. The skew is the median angle of the strongest near-horizontal lines, which
//! keeps a few table borders or figure edges from dragging the estimate.

use image::{GrayImage, Luma};

/// Parameters for [`estimate_skew`] and [`correct_skew`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewParams {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Minimum accumulator votes for a line
    pub hough_threshold: u32,
    /// How many of the strongest lines to consider
    pub max_lines: usize,
    /// Angles with a smaller magnitude are left alone
    pub min_degrees: f32,
}

impl Default for SkewParams {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            hough_threshold: 200,
            max_lines: 10,
            min_degrees: 0.5,
        }
    }
}

/// A line in normal form: `x·cos θ + y·sin θ = rho`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughLine {
    pub rho: f32,
    /// Normal angle in whole degrees, `0..180`
    pub theta_deg: u32,
    pub votes: u32,
}

impl HoughLine {
    /// Inclination relative to horizontal; positive means the line falls to the right.
    pub fn angle_from_horizontal(&self) -> f32 {
        self.theta_deg as f32 - 90.0
    }
}

const THETA_STEPS: usize = 180;

/// Hough lines of a binary edge map (non-zero pixels are edges), strongest first.
///
/// A cell is reported when it reaches `threshold` votes and is a local maximum against its
/// four neighbours in (theta, rho).
pub fn hough_lines(edges: &GrayImage, threshold: u32) -> Vec<HoughLine> {
    let (width, height) = edges.dimensions();
    let max_rho = ((width as f64).hypot(height as f64)).ceil() as i64;
    let rho_bins = (2 * max_rho + 1) as usize;

    let trig: Vec<(f64, f64)> = (0..THETA_STEPS)
        .map(|t| {
            let theta = (t as f64).to_radians();
            (theta.cos(), theta.sin())
        })
        .collect();

    let mut accumulator = vec![0u32; THETA_STEPS * rho_bins];
    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        for (t, (cos, sin)) in trig.iter().enumerate() {
            let rho = (x as f64 * cos + y as f64 * sin).round() as i64;
            accumulator[t * rho_bins + (rho + max_rho) as usize] += 1;
        }
    }

    let at = |t: isize, r: isize| -> u32 {
        if t < 0 || r < 0 || t as usize >= THETA_STEPS || r as usize >= rho_bins {
            0
        } else {
            accumulator[t as usize * rho_bins + r as usize]
        }
    };

    let mut lines = Vec::new();
    for t in 0..THETA_STEPS as isize {
        for r in 0..rho_bins as isize {
            let votes = at(t, r);
            if votes < threshold.max(1) {
                continue;
            }
            let is_peak = votes > at(t, r - 1) && votes >= at(t, r + 1) && votes > at(t - 1, r) && votes >= at(t + 1, r);
            if is_peak {
                lines.push(HoughLine {
                    rho: (r as i64 - max_rho) as f32,
                    theta_deg: t as u32,
                    votes,
                });
            }
        }
    }

    lines.sort_by(|a, b| b.votes.cmp(&a.votes));
    lines
}

/// Median inclination of the `max_lines` strongest lines that lie within ±45° of horizontal.
///
/// Returns `None` when no line qualifies.
pub fn median_skew(lines: &[HoughLine], max_lines: usize) -> Option<f32> {
    let mut angles: Vec<f32> = lines
        .iter()
        .take(max_lines)
        .map(HoughLine::angle_from_horizontal)
        .filter(|angle| *angle > -45.0 && *angle < 45.0)
        .collect();

    if angles.is_empty() {
        return None;
    }

    angles.sort_by(f32::total_cmp);
    let mid = angles.len() / 2;
    if angles.len() % 2 == 0 {
        Some((angles[mid - 1] + angles[mid]) / 2.0)
    } else {
        Some(angles[mid])
    }
}

/// Estimate the skew of a grayscale page in degrees.
pub fn estimate_skew(image: &GrayImage, params: &SkewParams) -> Option<f32> {
    if image.width() < 3 || image.height() < 3 {
        return None;
    }
    let edges = imageproc::edges::canny(image, params.canny_low, params.canny_high);
    let lines = hough_lines(&edges, params.hough_threshold);
    median_skew(&lines, params.max_lines)
}

/// Straighten a page. Returns the image unchanged when no usable skew is found or the
/// estimate is below `min_degrees`, together with the applied angle.
pub fn correct_skew(image: GrayImage, params: &SkewParams) -> (GrayImage, Option<f32>) {
    match estimate_skew(&image, params) {
        Some(angle) if angle.is_finite() && angle.abs() >= params.min_degrees => {
            tracing::debug!(angle, "Correcting skew");
            (rotate_replicate(&image, angle), Some(angle))
        }
        Some(angle) => {
            tracing::trace!(angle, "Skew below threshold, not rotating");
            (image, None)
        }
        None => (image, None),
    }
}

/// Rotate counter-clockwise (as displayed) by `degrees` about the image center.
///
/// Same size as the input; pixels sampled from outside repeat the nearest border pixel so no
/// black wedges appear in the corners.
pub fn rotate_replicate(image: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (width / 2) as f32;
    let cy = (height / 2) as f32;
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = (cos * dx - sin * dy + cx).clamp(0.0, max_x);
        let sy = (sin * dx + cos * dy + cy).clamp(0.0, max_y);
        Luma([sample_bilinear(image, sx, sy)])
    })
}

fn sample_bilinear(image: &GrayImage, x: f32, y: f32) -> u8 {
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p = |px: u32, py: u32| image.get_pixel(px, py)[0] as f32;
    let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
    let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
    (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
}
