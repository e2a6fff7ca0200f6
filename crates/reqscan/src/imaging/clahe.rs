//! Contrast-limited adaptive histogram equalization.
//!
//! The image is split into a `grid × grid` set of tiles. Each tile gets its own equalization
//! lookup table built from a clipped histogram, and every pixel is mapped by bilinearly
//! blending the tables of the four nearest tile centers so tile borders do not show.

use image::{GrayImage, Luma};

const BINS: usize = 256;

/// Apply CLAHE to a grayscale image.
///
/// `clip_limit` is relative to a flat histogram (2.0 allows a bin twice the uniform height);
/// `grid` is the number of tiles per axis and is reduced for images smaller than the grid.
pub fn clahe(image: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles_x = grid.clamp(1, width) as usize;
    let tiles_y = grid.clamp(1, height) as usize;

    let mut luts = Vec::with_capacity(tiles_x * tiles_y);
    for ty in 0..tiles_y {
        let (y0, y1) = tile_span(ty, tiles_y, height);
        for tx in 0..tiles_x {
            let (x0, x1) = tile_span(tx, tiles_x, width);
            luts.push(tile_lut(image, x0, x1, y0, y1, clip_limit));
        }
    }

    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let (ty1, ty2, ya) = neighbours(y, tile_h, tiles_y);
        for x in 0..width {
            let (tx1, tx2, xa) = neighbours(x, tile_w, tiles_x);
            let v = image.get_pixel(x, y)[0] as usize;

            let top = (1.0 - xa) * luts[ty1 * tiles_x + tx1][v] as f32 + xa * luts[ty1 * tiles_x + tx2][v] as f32;
            let bottom =
                (1.0 - xa) * luts[ty2 * tiles_x + tx1][v] as f32 + xa * luts[ty2 * tiles_x + tx2][v] as f32;
            let blended = (1.0 - ya) * top + ya * bottom;

            out.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Half-open pixel range of tile `index` out of `count` across `len` pixels.
fn tile_span(index: usize, count: usize, len: u32) -> (u32, u32) {
    let len = len as usize;
    let start = index * len / count;
    let end = (index + 1) * len / count;
    (start as u32, end as u32)
}

/// The two tiles whose centers bracket `pos`, and the weight of the second.
fn neighbours(pos: u32, tile_size: f32, count: usize) -> (usize, usize, f32) {
    let t = (pos as f32 + 0.5) / tile_size - 0.5;
    let lower = t.floor();
    let weight = t - lower;
    let last = count as i64 - 1;
    let first = (lower as i64).clamp(0, last) as usize;
    let second = (lower as i64 + 1).clamp(0, last) as usize;
    (first, second, weight)
}

fn tile_lut(image: &GrayImage, x0: u32, x1: u32, y0: u32, y1: u32, clip_limit: f32) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let area = ((x1 - x0) * (y1 - y0)).max(1);
    let clip = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);
    clip_histogram(&mut hist, clip);

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; BINS];
    let mut cdf = 0u32;
    for (bin, count) in hist.iter().enumerate() {
        cdf += count;
        lut[bin] = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Cap every bin at `clip` and spread the excess evenly over all bins.
fn clip_histogram(hist: &mut [u32; BINS], clip: u32) {
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let batch = excess / BINS as u32;
    let mut residual = excess % BINS as u32;
    for count in hist.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (BINS as u32 / residual).max(1) as usize;
        let mut bin = 0;
        while bin < BINS && residual > 0 {
            hist[bin] += 1;
            residual -= 1;
            bin += step;
        }
    }
}
