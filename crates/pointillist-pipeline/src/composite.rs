//! Stroke compositing: paint one rotated ellipse per anchor onto the
//! canvas, in anchor order.
//!
//! Each stroke is an anti-aliased ellipse with a semi-minor axis equal
//! to the stroke scale and a semi-major axis that grows with the square
//! root of the local gradient magnitude. The major axis is turned a
//! quarter turn from the gradient direction so strokes run along edges
//! rather than across them. Later strokes cover earlier ones.

use serde::{Deserialize, Serialize};
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};

use crate::anchors::StrokeAnchor;
use crate::gradient::VectorField;
use crate::types::{PipelineError, Rgb, RgbImage};

/// Orientation and extent of a single stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeShape {
    /// Rotation of the major axis in degrees, clockwise in image space.
    pub angle_degrees: f64,
    /// Semi-major axis in pixels.
    pub length: f64,
    /// Semi-minor axis in pixels.
    pub width: f64,
}

/// Shape of the stroke for a gradient sample.
///
/// `angle = degrees(direction) + 90` and
/// `length = round(scale + scale * sqrt(magnitude))`.
#[must_use]
pub fn stroke_shape(direction: f64, magnitude: f64, scale: u32) -> StrokeShape {
    let scale = f64::from(scale);
    StrokeShape {
        angle_degrees: direction.to_degrees() + 90.0,
        length: scale.mul_add(magnitude.max(0.0).sqrt(), scale).round(),
        width: scale,
    }
}

/// Starting canvas: the source itself, or a median-filtered copy.
#[must_use = "returns the canvas"]
pub fn seed_canvas(image: &RgbImage, use_median_blur: bool, median_radius: u32) -> RgbImage {
    if use_median_blur {
        crate::blur::median_blur(image, median_radius)
    } else {
        image.clone()
    }
}

/// The painted canvas plus counts for diagnostics.
#[derive(Debug, Clone)]
pub struct CompositeReport {
    /// The finished image.
    pub canvas: RgbImage,
    /// Strokes actually rasterized.
    pub strokes_painted: usize,
    /// Strokes skipped because their geometry was degenerate.
    pub strokes_skipped: usize,
    /// Longest semi-major axis painted, in pixels.
    pub max_length: f64,
}

/// Paint `anchors[i]` with `colors[i]` for every anchor, in order.
///
/// The canvas and field must share the same dimensions. Extra anchors
/// or colors beyond the shorter of the two slices are ignored.
///
/// # Errors
///
/// Returns [`PipelineError::CanvasAllocation`] if the raster surface
/// cannot be created for the canvas size.
pub fn paint_strokes(
    canvas: &RgbImage,
    field: &VectorField,
    anchors: &[StrokeAnchor],
    colors: &[Rgb<u8>],
    scale: u32,
) -> Result<CompositeReport, PipelineError> {
    debug_assert_eq!(anchors.len(), colors.len(), "one color per anchor");
    debug_assert_eq!(
        (canvas.width() as usize, canvas.height() as usize),
        (field.width(), field.height()),
        "field and canvas sizes differ",
    );

    let (width, height) = canvas.dimensions();
    let mut pixmap = to_pixmap(canvas)?;

    let mut paint = Paint::default();
    paint.anti_alias = true;

    let mut strokes_painted = 0;
    let mut strokes_skipped = 0;
    let mut max_length = 0.0f64;

    for (anchor, color) in anchors.iter().zip(colors) {
        let (row, col) = (anchor.row as usize, anchor.col as usize);
        let shape = stroke_shape(field.direction(row, col), field.magnitude(row, col), scale);

        #[allow(clippy::cast_precision_loss)]
        let (cx, cy) = (anchor.col as f32 + 0.5, anchor.row as f32 + 0.5);
        #[allow(clippy::cast_possible_truncation)]
        let (length, minor, angle) = (
            shape.length as f32,
            shape.width as f32,
            shape.angle_degrees as f32,
        );

        let Some(path) = Rect::from_xywh(cx - length, cy - minor, 2.0 * length, 2.0 * minor)
            .and_then(PathBuilder::from_oval)
        else {
            strokes_skipped += 1;
            continue;
        };

        let [r, g, b] = color.0;
        paint.set_color_rgba8(r, g, b, 255);
        pixmap.fill_path(
            &path,
            &paint,
            FillRule::Winding,
            Transform::from_rotate_at(angle, cx, cy),
            None,
        );
        strokes_painted += 1;
        max_length = max_length.max(shape.length);
    }

    Ok(CompositeReport {
        canvas: from_pixmap(&pixmap, width, height),
        strokes_painted,
        strokes_skipped,
        max_length,
    })
}

/// Copy an opaque RGB image into a premultiplied RGBA pixmap.
fn to_pixmap(image: &RgbImage) -> Result<Pixmap, PipelineError> {
    let (width, height) = image.dimensions();
    let mut pixmap =
        Pixmap::new(width, height).ok_or(PipelineError::CanvasAllocation { width, height })?;
    // Alpha is 255 throughout, so premultiplied and straight values agree.
    for (dst, src) in pixmap.data_mut().chunks_exact_mut(4).zip(image.pixels()) {
        let [r, g, b] = src.0;
        dst.copy_from_slice(&[r, g, b, 255]);
    }
    Ok(pixmap)
}

/// Drop the alpha channel of an opaque pixmap.
fn from_pixmap(pixmap: &Pixmap, width: u32, height: u32) -> RgbImage {
    let data = pixmap.data();
    RgbImage::from_fn(width, height, |x, y| {
        let off = (y as usize * width as usize + x as usize) * 4;
        Rgb([data[off], data[off + 1], data[off + 2]])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    const RED: Rgb<u8> = Rgb([200, 10, 10]);
    const BLUE: Rgb<u8> = Rgb([10, 10, 200]);

    /// Uniform field pointing along +x with the given magnitude.
    fn uniform_field(width: u32, height: u32, magnitude: f32) -> VectorField {
        let n = (width * height) as usize;
        VectorField::from_components(width, height, vec![magnitude; n], vec![0.0; n]).unwrap()
    }

    #[test]
    fn shape_for_flat_region_is_circle() {
        let shape = stroke_shape(0.0, 0.0, 3);
        assert!((shape.length - 3.0).abs() < f64::EPSILON);
        assert!((shape.width - 3.0).abs() < f64::EPSILON);
        assert!((shape.angle_degrees - 90.0).abs() < 1e-12);
    }

    #[test]
    fn shape_length_grows_with_sqrt_magnitude() {
        // round(2 + 2 * sqrt(4)) = 6
        assert!((stroke_shape(0.0, 4.0, 2).length - 6.0).abs() < f64::EPSILON);
        // round(1 + 1 * sqrt(2)) = round(2.414) = 2
        assert!((stroke_shape(0.0, 2.0, 1).length - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn shape_angle_is_quarter_turn_from_gradient() {
        let shape = stroke_shape(std::f64::consts::FRAC_PI_2, 1.0, 1);
        assert!((shape.angle_degrees - 180.0).abs() < 1e-9);
        let shape = stroke_shape(-std::f64::consts::PI, 1.0, 1);
        assert!((shape.angle_degrees + 90.0).abs() < 1e-9);
    }

    #[test]
    fn seed_canvas_without_median_copies() {
        let img = RgbImage::from_fn(5, 5, |x, y| Rgb([x as u8 * 10, y as u8 * 10, 7]));
        assert_eq!(seed_canvas(&img, false, 5), img);
    }

    #[test]
    fn seed_canvas_with_median_filters() {
        let mut img = RgbImage::from_pixel(11, 11, Rgb([50, 50, 50]));
        img.put_pixel(5, 5, Rgb([255, 0, 0]));
        let seeded = seed_canvas(&img, true, 2);
        assert_eq!(seeded.get_pixel(5, 5), &Rgb([50, 50, 50]));
    }

    #[test]
    fn no_anchors_leaves_canvas_unchanged() {
        let canvas = RgbImage::from_fn(8, 6, |x, y| Rgb([x as u8, y as u8, 99]));
        let field = uniform_field(8, 6, 1.0);
        let report = paint_strokes(&canvas, &field, &[], &[], 1).unwrap();
        assert_eq!(report.canvas, canvas);
        assert_eq!(report.strokes_painted, 0);
    }

    #[test]
    fn stroke_runs_perpendicular_to_gradient() {
        // Gradient along +x with magnitude 3: angle 90 degrees, so the
        // major axis (round(2 + 2 * sqrt(3)) = 5) is vertical and the
        // minor axis (2) horizontal.
        let canvas = RgbImage::from_pixel(41, 41, BLACK);
        let field = uniform_field(41, 41, 3.0);
        let anchors = [StrokeAnchor::new(20, 20)];
        let report = paint_strokes(&canvas, &field, &anchors, &[RED], 2).unwrap();
        let out = report.canvas;

        assert!((report.max_length - 5.0).abs() < f64::EPSILON);
        assert_eq!(out.get_pixel(20, 20), &RED);
        // Inside along the major axis.
        assert_eq!(out.get_pixel(20, 24), &RED);
        assert_eq!(out.get_pixel(20, 16), &RED);
        // Outside along the minor axis.
        assert_eq!(out.get_pixel(24, 20), &BLACK);
        assert_eq!(out.get_pixel(16, 20), &BLACK);
        // Far corner untouched.
        assert_eq!(out.get_pixel(0, 0), &BLACK);
    }

    #[test]
    fn later_strokes_cover_earlier_ones() {
        let canvas = RgbImage::from_pixel(20, 20, BLACK);
        let field = uniform_field(20, 20, 0.0);
        let anchors = [StrokeAnchor::new(10, 10), StrokeAnchor::new(10, 10)];
        let out = paint_strokes(&canvas, &field, &anchors, &[RED, BLUE], 2)
            .unwrap()
            .canvas;
        assert_eq!(out.get_pixel(10, 10), &BLUE);
    }

    #[test]
    fn strokes_near_edges_are_clipped() {
        let canvas = RgbImage::from_pixel(10, 10, BLACK);
        let field = uniform_field(10, 10, 16.0);
        let anchors = [StrokeAnchor::new(0, 0), StrokeAnchor::new(9, 9)];
        let report = paint_strokes(&canvas, &field, &anchors, &[RED, BLUE], 3).unwrap();
        assert_eq!(report.canvas.dimensions(), (10, 10));
        assert_eq!(report.strokes_painted, 2);
        assert_eq!(report.canvas.get_pixel(0, 0), &RED);
        assert_eq!(report.canvas.get_pixel(9, 9), &BLUE);
    }

    #[test]
    fn edge_pixels_blend_between_colors() {
        let canvas = RgbImage::from_pixel(30, 30, BLACK);
        let field = uniform_field(30, 30, 0.0);
        let anchors = [StrokeAnchor::new(15, 15)];
        let out = paint_strokes(&canvas, &field, &anchors, &[Rgb([255, 255, 255])], 4)
            .unwrap()
            .canvas;
        // Every channel stays between the background and stroke colors,
        // and at least one pixel on the rim is partially covered.
        let partial = out
            .pixels()
            .filter(|p| p.0[0] > 0 && p.0[0] < 255)
            .count();
        assert!(partial > 0);
        assert!(out.pixels().all(|p| p.0[0] == p.0[1] && p.0[1] == p.0[2]));
    }
}
