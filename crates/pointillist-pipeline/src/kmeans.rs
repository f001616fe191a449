//! Weighted k-means clustering of RGB colors.
//!
//! Pixels are first collapsed into distinct colors with occurrence
//! counts ([`collect_weighted`]); clustering those weighted samples is
//! equivalent to clustering every pixel but costs time proportional to
//! the number of distinct colors.
//!
//! Seeding uses k-means++ (each new center drawn with probability
//! proportional to `weight * distance²` from the nearest existing
//! center). Lloyd iterations follow until the squared centroid shift
//! drops under a tolerance scaled by the data variance. The whole run is
//! repeated `restarts` times and the lowest-inertia result is kept, so
//! the outcome depends only on the samples and the random source.

use std::collections::BTreeMap;

use rand::Rng;
use rayon::prelude::*;

use crate::types::RgbImage;

/// One distinct color and how many pixels carry it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedColor {
    /// RGB components as floating point.
    pub color: [f64; 3],
    /// Number of pixels with this color.
    pub weight: f64,
}

/// Tuning for [`kmeans`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmeansParams {
    /// Number of clusters.
    pub k: usize,
    /// Independent seeded runs; the lowest-inertia run wins.
    pub restarts: u32,
    /// Lloyd iteration cap per run.
    pub max_iterations: usize,
    /// Convergence tolerance relative to the mean per-channel variance.
    pub tolerance: f64,
}

impl KmeansParams {
    /// Default Lloyd iteration cap.
    pub const DEFAULT_MAX_ITERATIONS: usize = 300;

    /// Default relative convergence tolerance.
    pub const DEFAULT_TOLERANCE: f64 = 1e-4;

    /// Parameters for `k` clusters with the default iteration limits.
    #[must_use]
    pub const fn new(k: usize, restarts: u32) -> Self {
        Self {
            k,
            restarts,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }
}

/// Outcome of a clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct KmeansResult {
    /// Exactly `k` centroids, in cluster order. Centroids repeat when
    /// there are fewer distinct colors than clusters.
    pub centroids: Vec<[f64; 3]>,
    /// Weighted sum of squared distances to the nearest centroid.
    pub inertia: f64,
    /// Lloyd iterations used by the winning run.
    pub iterations: usize,
}

/// Collapse an image into distinct colors with pixel counts.
///
/// Output is sorted by color so it does not depend on pixel order.
#[must_use]
pub fn collect_weighted(image: &RgbImage) -> Vec<WeightedColor> {
    let mut counts: BTreeMap<[u8; 3], u32> = BTreeMap::new();
    for pixel in image.pixels() {
        *counts.entry(pixel.0).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(color, count)| WeightedColor {
            color: color.map(f64::from),
            weight: f64::from(count),
        })
        .collect()
}

/// Cluster weighted samples into `params.k` centroids.
///
/// Returns an empty result when there are no samples or `k == 0`.
pub fn kmeans<R: Rng + ?Sized>(
    samples: &[WeightedColor],
    params: KmeansParams,
    rng: &mut R,
) -> KmeansResult {
    if samples.is_empty() || params.k == 0 {
        return KmeansResult {
            centroids: Vec::new(),
            inertia: 0.0,
            iterations: 0,
        };
    }

    let tolerance = params.tolerance * mean_variance(samples);
    let mut best: Option<KmeansResult> = None;
    for _ in 0..params.restarts.max(1) {
        let seeds = init_plus_plus(samples, params.k, rng);
        let run = lloyd(samples, seeds, params.max_iterations, tolerance);
        if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }
    best.unwrap_or(KmeansResult {
        centroids: Vec::new(),
        inertia: 0.0,
        iterations: 0,
    })
}

fn squared_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0.mul_add(d0, d1.mul_add(d1, d2 * d2))
}

fn nearest(color: [f64; 3], centroids: &[[f64; 3]]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(color, *c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Mean over channels of the weighted per-channel variance.
fn mean_variance(samples: &[WeightedColor]) -> f64 {
    let total: f64 = samples.iter().map(|s| s.weight).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut mean = [0.0; 3];
    for s in samples {
        for c in 0..3 {
            mean[c] += s.color[c] * s.weight;
        }
    }
    let mean = mean.map(|m| m / total);
    let mut var = 0.0;
    for s in samples {
        var += squared_distance(s.color, mean) * s.weight;
    }
    var / total / 3.0
}

/// Draw an index with probability proportional to `weights[i]`.
fn pick_weighted<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    let target = rng.r#gen::<f64>() * total;
    let mut acc = 0.0;
    for (i, w) in weights.iter().enumerate() {
        acc += w;
        if acc > target {
            return i;
        }
    }
    weights.len() - 1
}

fn init_plus_plus<R: Rng + ?Sized>(
    samples: &[WeightedColor],
    k: usize,
    rng: &mut R,
) -> Vec<[f64; 3]> {
    let weights: Vec<f64> = samples.iter().map(|s| s.weight).collect();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(samples[pick_weighted(&weights, rng)].color);

    let mut closest: Vec<f64> = samples
        .iter()
        .map(|s| squared_distance(s.color, centroids[0]))
        .collect();

    while centroids.len() < k {
        let scores: Vec<f64> = closest
            .iter()
            .zip(&weights)
            .map(|(d, w)| d * w)
            .collect();
        let total: f64 = scores.iter().sum();
        // Every sample already coincides with a center: repeat one.
        let idx = if total > 0.0 {
            pick_weighted(&scores, rng)
        } else {
            pick_weighted(&weights, rng)
        };
        let center = samples[idx].color;
        centroids.push(center);
        for (d, s) in closest.iter_mut().zip(samples) {
            *d = d.min(squared_distance(s.color, center));
        }
    }
    centroids
}

fn lloyd(
    samples: &[WeightedColor],
    mut centroids: Vec<[f64; 3]>,
    max_iterations: usize,
    tolerance: f64,
) -> KmeansResult {
    let k = centroids.len();
    let mut iterations = 0;

    for _ in 0..max_iterations {
        iterations += 1;
        let labels: Vec<usize> = samples
            .par_iter()
            .map(|s| nearest(s.color, &centroids).0)
            .collect();

        let mut sums = vec![[0.0; 3]; k];
        let mut mass = vec![0.0; k];
        for (s, &label) in samples.iter().zip(&labels) {
            for c in 0..3 {
                sums[label][c] += s.color[c] * s.weight;
            }
            mass[label] += s.weight;
        }

        let mut shift = 0.0;
        for (j, centroid) in centroids.iter_mut().enumerate() {
            // Empty clusters keep their previous position.
            if mass[j] > 0.0 {
                let updated = sums[j].map(|v| v / mass[j]);
                shift += squared_distance(*centroid, updated);
                *centroid = updated;
            }
        }

        if shift <= tolerance {
            break;
        }
    }

    let inertia = samples
        .iter()
        .map(|s| nearest(s.color, &centroids).1 * s.weight)
        .sum();

    KmeansResult {
        centroids,
        inertia,
        iterations,
    }
}
