use image::GrayImage;
use imageproc::filter::separable_filter_equal;

/// Largest kernel whose weighted sums of 8-bit pixels stay exact in `f32`
const MAX_KERNEL: u32 = 15;

/// Gaussian smoothing with a fixed `size × size` binomial kernel.
///
/// For size 5 the weights are `[1, 4, 6, 4, 1] / 16` per axis, the standard small Gaussian.
/// Binomial weights are exact binary fractions, so flat regions stay exactly flat and
/// repeated smoothing does not drift. Borders replicate the edge pixel. Even sizes are
/// rounded up, sizes above 15 are capped, and size 1 is the identity.
pub fn gaussian_denoise(image: &GrayImage, size: u32) -> GrayImage {
    let size = size.clamp(1, MAX_KERNEL) | 1;
    if size == 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let row = binomial_row(size as usize);
    let norm = (1u64 << (size - 1)) as f32;
    let kernel: Vec<f32> = row.iter().map(|&w| w as f32 / norm).collect();
    separable_filter_equal(image, &kernel)
}

/// Row `n - 1` of Pascal's triangle.
fn binomial_row(n: usize) -> Vec<u64> {
    let mut row = vec![1u64];
    for _ in 1..n {
        let mut next = vec![1u64; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}
