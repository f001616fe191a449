//! Gradient vector field over image luminance.
//!
//! Horizontal and vertical derivatives come from the 3×3 Scharr pair,
//! scaled down by [`SCHARR_SCALE`], then each component is smoothed so
//! stroke orientation follows coarse edge structure rather than
//! pixel-level noise.

use image::{GrayImage, Luma};

use crate::blur::{self, ScalarGrid};

/// Divisor applied to raw Scharr responses.
pub const SCHARR_SCALE: f32 = 15.36;

/// Two same-sized scalar grids holding the x and y gradient components.
///
/// Indexed by `(row, col)` to match anchor coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    fieldx: ScalarGrid,
    fieldy: ScalarGrid,
}

impl VectorField {
    /// Build a field from explicit component grids (row-major).
    ///
    /// Returns `None` when either grid does not hold `width * height`
    /// values.
    #[must_use]
    pub fn from_components(
        width: u32,
        height: u32,
        fieldx: Vec<f32>,
        fieldy: Vec<f32>,
    ) -> Option<Self> {
        let n = (width as usize).checked_mul(height as usize)?;
        if fieldx.len() != n || fieldy.len() != n {
            return None;
        }
        Some(Self {
            fieldx: ScalarGrid::from_raw(width, height, fieldx)?,
            fieldy: ScalarGrid::from_raw(width, height, fieldy)?,
        })
    }

    /// Scharr derivatives of a luminance image.
    #[must_use]
    pub fn from_gradient(gray: &GrayImage) -> Self {
        let scale = |v: i16| f32::from(v) / SCHARR_SCALE;
        Self {
            fieldx: imageproc::map::map_subpixels(
                &imageproc::gradients::horizontal_scharr(gray),
                scale,
            ),
            fieldy: imageproc::map::map_subpixels(
                &imageproc::gradients::vertical_scharr(gray),
                scale,
            ),
        }
    }

    /// Apply `iterations` Gaussian passes of kernel size `2r + 1` to both
    /// components.
    pub fn smooth(&mut self, radius: u32, iterations: u32) {
        if radius == 0 {
            return;
        }
        for _ in 0..iterations {
            let (x, y) = rayon::join(
                || blur::gaussian_blur_grid(&self.fieldx, radius),
                || blur::gaussian_blur_grid(&self.fieldy, radius),
            );
            self.fieldx = x;
            self.fieldy = y;
        }
    }

    /// Grid width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.fieldx.width() as usize
    }

    /// Grid height.
    #[must_use]
    pub fn height(&self) -> usize {
        self.fieldx.height() as usize
    }

    #[allow(clippy::cast_possible_truncation)]
    fn at(&self, row: usize, col: usize) -> (f32, f32) {
        let (x, y) = (col as u32, row as u32);
        (self.fieldx.get_pixel(x, y).0[0], self.fieldy.get_pixel(x, y).0[0])
    }

    /// Gradient angle in radians, `atan2(y, x)`. A zero vector yields 0.
    #[must_use]
    pub fn direction(&self, row: usize, col: usize) -> f64 {
        let (x, y) = self.at(row, col);
        f64::from(y).atan2(f64::from(x))
    }

    /// Gradient magnitude (Euclidean norm of the two components).
    #[must_use]
    pub fn magnitude(&self, row: usize, col: usize) -> f64 {
        let (x, y) = self.at(row, col);
        f64::from(x).hypot(f64::from(y))
    }

    /// Largest magnitude anywhere in the field.
    #[must_use]
    pub fn max_magnitude(&self) -> f64 {
        self.fieldx
            .pixels()
            .zip(self.fieldy.pixels())
            .map(|(Luma([x]), Luma([y]))| f64::from(*x).hypot(f64::from(*y)))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    fn vertical_edge() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _| image::Luma([if x < 10 { 0 } else { 255 }]))
    }

    fn horizontal_edge() -> GrayImage {
        GrayImage::from_fn(20, 20, |_, y| image::Luma([if y < 10 { 0 } else { 255 }]))
    }

    #[test]
    fn flat_image_has_zero_field() {
        let gray = GrayImage::from_pixel(16, 12, image::Luma([90]));
        let mut field = VectorField::from_gradient(&gray);
        field.smooth(2, 1);
        for row in 0..12 {
            for col in 0..16 {
                assert!(field.magnitude(row, col) < 1e-6);
                let dir = field.direction(row, col);
                assert!(dir.is_finite());
                assert!(dir.abs() < 1e-9);
            }
        }
    }

    #[test]
    fn vertical_edge_points_along_x() {
        let field = VectorField::from_gradient(&vertical_edge());
        // Pixel just left of the boundary.
        let mag = field.magnitude(10, 9);
        // Scharr response: (3 + 10 + 3) * 255 / 15.36
        assert!((mag - 16.0 * 255.0 / 15.36).abs() < 1e-3, "got {mag}");
        // Strokes are symmetric under a half turn, so only the axis matters.
        assert!(field.direction(10, 9).sin().abs() < 1e-9);
    }

    #[test]
    fn horizontal_edge_points_along_y() {
        let field = VectorField::from_gradient(&horizontal_edge());
        let dir = field.direction(9, 10);
        assert!((dir.abs() - FRAC_PI_2).abs() < 1e-9, "got {dir}");
    }

    #[test]
    fn smoothing_spreads_response() {
        let raw = VectorField::from_gradient(&vertical_edge());
        let mut smoothed = raw.clone();
        smoothed.smooth(3, 1);
        assert!(raw.magnitude(10, 5) < 1e-9);
        assert!(smoothed.magnitude(10, 7) > 0.0);
        assert!(smoothed.max_magnitude() < raw.max_magnitude());
    }

    #[test]
    fn zero_iterations_leaves_field() {
        let raw = VectorField::from_gradient(&vertical_edge());
        let mut same = raw.clone();
        same.smooth(4, 0);
        assert_eq!(raw, same);
    }

    #[test]
    fn from_components_checks_sizes() {
        assert!(VectorField::from_components(2, 2, vec![0.0; 4], vec![0.0; 4]).is_some());
        assert!(VectorField::from_components(2, 2, vec![0.0; 3], vec![0.0; 4]).is_none());
        assert!(VectorField::from_components(2, 2, vec![0.0; 4], vec![0.0; 5]).is_none());
    }

    #[test]
    fn dimensions_follow_image() {
        let field = VectorField::from_gradient(&GrayImage::new(7, 3));
        assert_eq!(field.width(), 7);
        assert_eq!(field.height(), 3);
    }
}
