//! Randomized stroke anchor grid.
//!
//! One anchor per `scale × scale` grid cell, jittered by up to half a
//! cell in each direction and wrapped around the canvas edges. The full
//! set is then shuffled: paint order decides which stroke wins where
//! strokes overlap, and a raster order would leave a visible grid bias.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// A canvas position where one stroke is centered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrokeAnchor {
    /// Row (y) in pixels.
    pub row: u32,
    /// Column (x) in pixels.
    pub col: u32,
}

impl StrokeAnchor {
    /// Create an anchor.
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Number of anchors [`randomized_grid`] produces.
#[must_use]
pub const fn anchor_count(dimensions: Dimensions, scale: u32) -> usize {
    if scale == 0 {
        return 0;
    }
    dimensions.height.div_ceil(scale) as usize * dimensions.width.div_ceil(scale) as usize
}

/// Generate jittered, wrapped, shuffled anchors.
///
/// Cells are visited row-major, drawing the row offset before the
/// column offset; both are uniform in `[-scale/2, scale/2]`. A zero
/// scale or zero-area canvas yields no anchors.
pub fn randomized_grid<R: Rng + ?Sized>(
    dimensions: Dimensions,
    scale: u32,
    rng: &mut R,
) -> Vec<StrokeAnchor> {
    let Dimensions { width, height } = dimensions;
    if scale == 0 || width == 0 || height == 0 {
        return Vec::new();
    }

    let reach = i64::from(scale / 2);
    let (h, w) = (i64::from(height), i64::from(width));
    let mut grid = Vec::with_capacity(anchor_count(dimensions, scale));

    for i in (0..height).step_by(scale as usize) {
        for j in (0..width).step_by(scale as usize) {
            let y = i64::from(i) + rng.gen_range(-reach..=reach);
            let x = i64::from(j) + rng.gen_range(-reach..=reach);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let anchor = StrokeAnchor::new(y.rem_euclid(h) as u32, x.rem_euclid(w) as u32);
            grid.push(anchor);
        }
    }

    grid.shuffle(rng);
    grid
}
