//! Probabilistic palette color selection.
//!
//! Each anchor gets a discrete distribution over the palette that
//! favors colors close to the source pixel without ruling any color
//! out:
//!
//! 1. distances `d_i` to every palette color, `m = max d_i`;
//! 2. affinities `m - d_i`, normalized to sum to one;
//! 3. sharpened with `exp(k * P * a_i)` and renormalized.
//!
//! Step 3 subtracts the largest exponent before exponentiating, which
//! leaves the result unchanged but keeps `exp` finite for large `k * P`.
//! When every palette color is equally far away, step 2 has a zero sum
//! and the distribution is uniform.
//!
//! Distributions are independent per anchor and are computed in
//! parallel, one batch at a time to bound memory. The random draws are
//! taken sequentially in anchor order from the caller's generator, so
//! the output never depends on thread scheduling.

use rand::Rng;
use rayon::prelude::*;

use crate::anchors::StrokeAnchor;
use crate::color;
use crate::palette::ColorPalette;
use crate::types::{PipelineError, Rgb, RgbImage};

/// Cumulative selection probabilities over palette indices.
///
/// Non-decreasing, one entry per palette color, final entry 1 up to
/// rounding.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeDistribution(Vec<f64>);

impl CumulativeDistribution {
    /// The cumulative values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// First index whose cumulative value is at least `r`.
    ///
    /// May return `len()` when rounding leaves the final value just
    /// under `r`; callers fall back to the last palette entry.
    #[must_use]
    pub fn search(&self, r: f64) -> usize {
        self.0.partition_point(|&c| c < r)
    }

    /// Index with the largest individual probability (first on ties).
    #[must_use]
    pub fn most_likely(&self) -> usize {
        let mut best = (0, f64::NEG_INFINITY);
        let mut prev = 0.0;
        for (i, &c) in self.0.iter().enumerate() {
            let p = c - prev;
            prev = c;
            if p > best.1 {
                best = (i, p);
            }
        }
        best.0
    }

    /// Draw an index. Out-of-range results are clamped to the last
    /// palette entry.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let r: f64 = rng.r#gen();
        self.search(r).min(self.0.len().saturating_sub(1))
    }
}

/// Compute the distribution for one source color.
///
/// Returns `None` for an empty palette or when the arithmetic produces
/// a non-finite value.
#[must_use]
pub fn color_probabilities(
    color: [f64; 3],
    palette: &[[f64; 3]],
    k: f64,
) -> Option<CumulativeDistribution> {
    if palette.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = palette.len() as f64;

    let distances: Vec<f64> = palette.iter().map(|p| color::distance(color, *p)).collect();
    let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let affinities: Vec<f64> = distances.iter().map(|d| max - d).collect();
    let sum: f64 = affinities.iter().sum();

    let normalized: Vec<f64> = if sum > 0.0 {
        affinities.iter().map(|a| a / sum).collect()
    } else {
        vec![1.0 / n; palette.len()]
    };

    let exponents: Vec<f64> = normalized.iter().map(|v| k * n * v).collect();
    let shift = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = exponents.iter().map(|e| (e - shift).exp()).collect();
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    let mut acc = 0.0;
    let cumulative: Vec<f64> = weights
        .iter()
        .map(|w| {
            acc += w / total;
            acc
        })
        .collect();
    cumulative
        .iter()
        .all(|c| c.is_finite())
        .then_some(CumulativeDistribution(cumulative))
}

/// Distributions for a batch of source colors, in input order.
///
/// `offset` is the index of the batch's first anchor in the full anchor
/// sequence and only feeds error reporting.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyPalette`] for an empty palette and
/// [`PipelineError::DegenerateDistribution`] for the first anchor whose
/// distribution is not finite.
pub fn compute_batch(
    colors: &[Rgb<u8>],
    palette: &ColorPalette,
    k: f64,
    offset: usize,
) -> Result<Vec<CumulativeDistribution>, PipelineError> {
    if palette.is_empty() {
        return Err(PipelineError::EmptyPalette);
    }
    let palette_f: Vec<[f64; 3]> = palette.iter().map(color::to_f64).collect();
    colors
        .par_iter()
        .enumerate()
        .map(|(i, c)| {
            color_probabilities(color::to_f64(*c), &palette_f, k)
                .ok_or(PipelineError::DegenerateDistribution { anchor: offset + i })
        })
        .collect()
}

/// Pick one palette color per anchor.
///
/// The source color at each anchor drives its distribution; anchors are
/// processed in `batch_size` chunks and one uniform draw is taken per
/// anchor, in order.
///
/// # Errors
///
/// See [`compute_batch`].
pub fn sample_colors<R: Rng + ?Sized>(
    image: &RgbImage,
    anchors: &[StrokeAnchor],
    palette: &ColorPalette,
    k: f64,
    batch_size: usize,
    rng: &mut R,
) -> Result<Vec<Rgb<u8>>, PipelineError> {
    if palette.is_empty() {
        return Err(PipelineError::EmptyPalette);
    }

    let batch_size = batch_size.max(1);
    let mut sampled = Vec::with_capacity(anchors.len());
    for (batch_index, batch) in anchors.chunks(batch_size).enumerate() {
        let colors: Vec<Rgb<u8>> = batch
            .iter()
            .map(|a| *image.get_pixel(a.col, a.row))
            .collect();
        let distributions = compute_batch(&colors, palette, k, batch_index * batch_size)?;
        for distribution in &distributions {
            let index = distribution.sample(rng);
            sampled.push(palette.get(index).ok_or(PipelineError::EmptyPalette)?);
        }
    }

    tracing::debug!(
        anchors = anchors.len(),
        batches = anchors.len().div_ceil(batch_size),
        palette_len = palette.len(),
        k,
        "colors sampled"
    );
    Ok(sampled)
}
