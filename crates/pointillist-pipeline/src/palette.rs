//! Palette learning: cluster the source colors, then extend the base
//! colors with hue/saturation/value variants.
//!
//! The first `base_len` entries of a [`ColorPalette`] are k-means
//! centroids; every following block of `base_len` entries is the base
//! block passed through one [`HsvOffset`].

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::color;
use crate::downsample::{self, DownsampleFilter};
use crate::kmeans::{self, KmeansParams};
use crate::types::{HsvOffset, Rgb, RgbImage};

/// An ordered, immutable table of palette colors.
///
/// `len()` is always a whole number of `base_len` blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorPalette {
    colors: Vec<[u8; 3]>,
    base_len: usize,
}

/// Wire form of [`ColorPalette`], checked before it becomes one.
#[derive(Deserialize)]
struct ColorPaletteProxy {
    colors: Vec<[u8; 3]>,
    base_len: usize,
}

impl<'de> Deserialize<'de> for ColorPalette {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ColorPaletteProxy { colors, base_len } = ColorPaletteProxy::deserialize(deserializer)?;
        let whole_blocks = if base_len == 0 {
            colors.is_empty()
        } else {
            colors.len() >= base_len && colors.len() % base_len == 0
        };
        if !whole_blocks {
            return Err(serde::de::Error::custom(format!(
                "palette of {} colors is not a whole number of {base_len}-color blocks",
                colors.len()
            )));
        }
        Ok(Self { colors, base_len })
    }
}

impl ColorPalette {
    /// Build a palette whose every entry is a base color.
    #[must_use]
    pub fn new(colors: Vec<Rgb<u8>>) -> Self {
        let base_len = colors.len();
        Self {
            colors: colors.into_iter().map(|c| c.0).collect(),
            base_len,
        }
    }

    /// Number of colors, including extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Returns `true` if the palette has no colors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Number of clustering-derived colors at the front of the table.
    #[must_use]
    pub const fn base_len(&self) -> usize {
        self.base_len
    }

    /// Color at `index`, falling back to the last entry when `index`
    /// is out of range. Returns `None` only for an empty palette.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Rgb<u8>> {
        self.colors
            .get(index)
            .or_else(|| self.colors.last())
            .map(|c| Rgb(*c))
    }

    /// Iterate over every color in table order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Rgb<u8>> + '_ {
        self.colors.iter().map(|c| Rgb(*c))
    }

    /// Append one block per offset, each a transform of the base block.
    #[must_use]
    pub fn extend(&self, extensions: &[HsvOffset]) -> Self {
        let base = self.colors.get(..self.base_len).unwrap_or(self.colors.as_slice());
        let mut colors = base.to_vec();
        for &offset in extensions {
            colors.extend(base.iter().map(|c| color::regulate(Rgb(*c), offset).0));
        }
        Self {
            colors,
            base_len: self.base_len,
        }
    }
}

/// Settings for [`build_palette`].
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteSettings<'a> {
    /// Number of base colors (K).
    pub size: usize,
    /// Long-edge cap before clustering; `0` disables downsampling.
    pub max_dimension: u32,
    /// Downsample filter.
    pub filter: DownsampleFilter,
    /// k-means restarts.
    pub restarts: u32,
    /// Variant blocks appended after the base colors.
    pub extensions: &'a [HsvOffset],
}

/// What [`build_palette`] learned, alongside the palette itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteReport {
    /// The extended palette.
    pub palette: ColorPalette,
    /// Distinct colors seen by the clustering step.
    pub distinct_colors: usize,
    /// Whether fewer distinct colors than clusters were available.
    pub degenerate: bool,
    /// Final clustering inertia.
    pub inertia: f64,
}

/// Learn a palette from `image`.
///
/// Clustering runs on a downsampled copy. When `settings.size` exceeds
/// the number of distinct colors the base block contains repeated
/// colors; this is logged and otherwise accepted.
pub fn build_palette<R: Rng + ?Sized>(
    image: &RgbImage,
    settings: &PaletteSettings<'_>,
    rng: &mut R,
) -> PaletteReport {
    let (scaled, downsampled) =
        downsample::limit_size(image, settings.max_dimension, settings.filter);
    let samples = kmeans::collect_weighted(&scaled);
    let distinct_colors = samples.len();
    let degenerate = settings.size > distinct_colors;
    if degenerate {
        tracing::debug!(
            requested = settings.size,
            distinct_colors,
            "palette size exceeds distinct colors; clustering degenerates"
        );
    }

    let result = kmeans::kmeans(
        &samples,
        KmeansParams::new(settings.size, settings.restarts),
        rng,
    );

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let base: Vec<Rgb<u8>> = result
        .centroids
        .iter()
        .map(|c| Rgb(c.map(|v| v.round().clamp(0.0, 255.0) as u8)))
        .collect();

    let palette = ColorPalette::new(base).extend(settings.extensions);
    tracing::debug!(
        base_len = palette.base_len(),
        len = palette.len(),
        distinct_colors,
        downsampled,
        inertia = result.inertia,
        iterations = result.iterations,
        "palette built"
    );

    PaletteReport {
        palette,
        distinct_colors,
        degenerate,
        inertia: result.inertia,
    }
}
