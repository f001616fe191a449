//! Full-range 8-bit HSV conversion and palette color adjustment.
//!
//! Hue is stored in `0..=255` covering the whole 360 degree circle (so
//! one hue unit is 1.40625 degrees), saturation and value in `0..=255`.
//! Using the full byte range for hue means an offset wraps with plain
//! modulo-256 arithmetic.

use crate::types::{HsvOffset, Rgb};

/// Number of hue units in a full turn.
const HUE_RANGE: f64 = 256.0;

/// A color in full-range 8-bit HSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    /// Hue, `0..=255` for `0..360` degrees.
    pub h: u8,
    /// Saturation.
    pub s: u8,
    /// Value (brightness).
    pub v: u8,
}

/// Convert an RGB color to full-range HSV.
///
/// Gray colors (zero chroma) have hue 0 and saturation 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rgb_to_hsv(rgb: Rgb<u8>) -> Hsv {
    let [r, g, b] = rgb.0.map(f64::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let chroma = max - min;

    let s = if max > 0.0 {
        (chroma * 255.0 / max).round()
    } else {
        0.0
    };

    let h = if chroma > 0.0 {
        // Sector-relative hue in sixths of a turn.
        let sixths = if (max - r).abs() < f64::EPSILON {
            (g - b) / chroma
        } else if (max - g).abs() < f64::EPSILON {
            (b - r) / chroma + 2.0
        } else {
            (r - g) / chroma + 4.0
        };
        (sixths * HUE_RANGE / 6.0).round().rem_euclid(HUE_RANGE)
    } else {
        0.0
    };

    Hsv {
        h: h as u8,
        s: s as u8,
        v: max as u8,
    }
}

/// Convert a full-range HSV color back to RGB.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn hsv_to_rgb(hsv: Hsv) -> Rgb<u8> {
    let s = f64::from(hsv.s) / 255.0;
    let v = f64::from(hsv.v) / 255.0;
    if s <= 0.0 {
        let gray = (v * 255.0).round() as u8;
        return Rgb([gray, gray, gray]);
    }

    let h = f64::from(hsv.h) * 6.0 / HUE_RANGE;
    let sector = h.floor();
    let frac = h - sector;
    let p = v * (1.0 - s);
    let q = v * frac.mul_add(-s, 1.0);
    let t = v * (1.0 - frac).mul_add(-s, 1.0);

    let (r, g, b) = match sector as u8 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    let to_byte = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb([to_byte(r), to_byte(g), to_byte(b)])
}

/// Shift a color's hue, saturation, and value.
///
/// Hue wraps modulo the full hue range; saturation and value are
/// clamped to `0..=255`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn regulate(color: Rgb<u8>, offset: HsvOffset) -> Rgb<u8> {
    let hsv = rgb_to_hsv(color);
    let shift = |base: u8, delta: i16| (i16::from(base) + delta).clamp(0, 255) as u8;
    hsv_to_rgb(Hsv {
        h: (i16::from(hsv.h) + offset.hue).rem_euclid(256) as u8,
        s: shift(hsv.s, offset.saturation),
        v: shift(hsv.v, offset.value),
    })
}

/// Euclidean distance between two colors in RGB space.
#[must_use]
pub fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr.mul_add(dr, dg.mul_add(dg, db * db)).sqrt()
}

/// Widen an 8-bit color for distance math.
#[must_use]
pub fn to_f64(color: Rgb<u8>) -> [f64; 3] {
    color.0.map(f64::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primaries_map_to_sixths_of_the_hue_range() {
        assert_eq!(rgb_to_hsv(Rgb([255, 0, 0])).h, 0);
        // 120 degrees -> 256 / 3 = 85.33
        assert_eq!(rgb_to_hsv(Rgb([0, 255, 0])).h, 85);
        // 240 degrees -> 170.67
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 255])).h, 171);
    }

    #[test]
    fn gray_has_no_hue_or_saturation() {
        let hsv = rgb_to_hsv(Rgb([128, 128, 128]));
        assert_eq!(hsv, Hsv { h: 0, s: 0, v: 128 });
        assert_eq!(hsv_to_rgb(hsv), Rgb([128, 128, 128]));
    }

    #[test]
    fn black_is_all_zero() {
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 0])), Hsv { h: 0, s: 0, v: 0 });
    }

    #[test]
    fn saturated_colors_convert_back_closely() {
        for color in [
            Rgb([255, 0, 0]),
            Rgb([12, 200, 90]),
            Rgb([250, 180, 20]),
            Rgb([40, 40, 220]),
            Rgb([200, 30, 160]),
        ] {
            let back = hsv_to_rgb(rgb_to_hsv(color));
            for c in 0..3 {
                let diff = (i16::from(back.0[c]) - i16::from(color.0[c])).abs();
                assert!(diff <= 4, "{color:?} -> {back:?}, channel {c} off by {diff}");
            }
        }
    }

    #[test]
    fn regulate_zero_offset_is_near_identity() {
        let color = Rgb([90, 140, 60]);
        let out = regulate(color, HsvOffset::new(0, 0, 0));
        for c in 0..3 {
            assert!((i16::from(out.0[c]) - i16::from(color.0[c])).abs() <= 4);
        }
    }

    #[test]
    fn regulate_adds_saturation_to_gray() {
        let out = regulate(Rgb([128, 128, 128]), HsvOffset::new(0, 50, 0));
        let hsv = rgb_to_hsv(out);
        assert!(hsv.s > 40, "expected saturation near 50, got {}", hsv.s);
        // Hue 0 is red, so the red channel stays at the value.
        assert_eq!(out.0[0], 128);
        assert!(out.0[1] < 128 && out.0[2] < 128);
    }

    #[test]
    fn regulate_clamps_saturation_and_value() {
        let out = regulate(Rgb([255, 0, 0]), HsvOffset::new(0, 100, 100));
        assert_eq!(out, Rgb([255, 0, 0]));
        let out = regulate(Rgb([10, 10, 10]), HsvOffset::new(0, 0, -100));
        assert_eq!(out, Rgb([0, 0, 0]));
    }

    #[test]
    fn regulate_wraps_hue_backwards() {
        // Pure red rotated backwards lands in the magenta sector.
        let out = regulate(Rgb([255, 0, 0]), HsvOffset::new(-15, 0, 0));
        let hsv = rgb_to_hsv(out);
        assert_eq!(hsv.h, 241);
        assert!(out.0[2] > 0 && out.0[1] == 0);
    }

    #[test]
    fn distance_is_euclidean() {
        assert!((distance([0.0, 0.0, 0.0], [3.0, 4.0, 0.0]) - 5.0).abs() < 1e-12);
        assert!(distance([1.0, 2.0, 3.0], [1.0, 2.0, 3.0]).abs() < 1e-12);
    }
}
