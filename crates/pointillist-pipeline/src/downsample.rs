//! Image downsampling ahead of palette clustering.
//!
//! Clustering cost grows with the number of sampled pixels, so the
//! palette builder first shrinks the source so the longest axis is at
//! most `max_dimension`. The rendered canvas always keeps the source
//! resolution; only the clustering input is reduced.
//!
//! If the image is already at or below the target resolution, it is
//! returned unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::RgbImage;

/// Resampling filter used when downsampling.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality,
/// with a `Disabled` variant to skip downsampling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Disabled: skip downsampling regardless of image size.
    Disabled,
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, averages neighboring colors.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl DownsampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    ///
    /// Returns `None` for [`DownsampleFilter::Disabled`] since there is
    /// no corresponding resampling filter.
    const fn to_image_filter(self) -> Option<image::imageops::FilterType> {
        match self {
            Self::Disabled => None,
            Self::Nearest => Some(image::imageops::FilterType::Nearest),
            Self::Triangle => Some(image::imageops::FilterType::Triangle),
            Self::CatmullRom => Some(image::imageops::FilterType::CatmullRom),
            Self::Gaussian => Some(image::imageops::FilterType::Gaussian),
            Self::Lanczos3 => Some(image::imageops::FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Downsample an image so the longest axis is at most `max_dimension`
/// pixels, preserving the aspect ratio.
///
/// A `max_dimension` of zero disables downsampling. Returns the
/// (possibly unchanged) image and whether downsampling was applied.
#[must_use]
pub fn limit_size(
    image: &RgbImage,
    max_dimension: u32,
    filter: DownsampleFilter,
) -> (RgbImage, bool) {
    let Some(image_filter) = filter.to_image_filter() else {
        return (image.clone(), false);
    };

    let (w, h) = image.dimensions();
    if max_dimension == 0 || w.max(h) <= max_dimension {
        return (image.clone(), false);
    }

    let ratio = f64::from(max_dimension) / f64::from(w.max(h));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (new_w, new_h) = (
        ((f64::from(w) * ratio) as u32).max(1),
        ((f64::from(h) * ratio) as u32).max(1),
    );
    let resized = image::imageops::resize(image, new_w, new_h, image_filter);
    (resized, true)
}
