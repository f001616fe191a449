//! Smoothing filters: separable Gaussian blur over `f32` grids, and
//! median filtering for canvas seeding.
//!
//! [`gaussian_blur_grid`] smooths one component of the gradient field
//! with [`imageproc::filter::separable_filter_equal`]. The kernel is
//! sized by a radius (`2r + 1` taps) and its sigma is derived from the
//! kernel size, so a single smoothing parameter controls both reach and
//! falloff. Borders are padded by continuity.
//!
//! [`median_blur`] wraps [`imageproc::filter::median_filter`] to produce
//! the edge-preserving softened canvas that strokes are painted onto.

use image::Luma;
use imageproc::definitions::Image;

use crate::types::RgbImage;

/// A single-channel floating-point grid.
pub type ScalarGrid = Image<Luma<f32>>;

/// Gaussian sigma for a kernel of `size` taps.
///
/// `0.3 * ((size - 1) * 0.5 - 1) + 0.8`: wide enough that the kernel
/// tails are negligible at the window edge.
#[must_use]
pub fn sigma_for_kernel_size(size: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let size = size as f64;
    0.3f64.mul_add((size - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Normalized 1-D Gaussian kernel with `2 * radius + 1` taps.
#[must_use]
pub fn gaussian_kernel(radius: usize) -> Vec<f32> {
    let size = 2 * radius + 1;
    let sigma = sigma_for_kernel_size(size);
    let denom = 2.0 * sigma * sigma;
    #[allow(clippy::cast_precision_loss)]
    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-(x * x) / denom).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    #[allow(clippy::cast_possible_truncation)]
    raw.iter().map(|v| (v / sum) as f32).collect()
}

/// Blur a grid with a separable Gaussian of the given radius.
///
/// A radius of zero returns a copy.
#[must_use = "returns the blurred grid"]
pub fn gaussian_blur_grid(grid: &ScalarGrid, radius: u32) -> ScalarGrid {
    if radius == 0 {
        return grid.clone();
    }
    let kernel = gaussian_kernel(radius as usize);
    imageproc::filter::separable_filter_equal(grid, &kernel)
}

/// Median-filter an RGB image with a square `(2r + 1)²` window,
/// each channel independently. A radius of zero returns a copy.
#[must_use = "returns the filtered image"]
pub fn median_blur(image: &RgbImage, radius: u32) -> RgbImage {
    if radius == 0 {
        return image.clone();
    }
    imageproc::filter::median_filter(image, radius, radius)
}
