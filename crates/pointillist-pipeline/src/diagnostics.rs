//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter experimentation. [`render_with_diagnostics`] drives the
//! staged [`Pipeline`](crate::Pipeline) and records what each stage did
//! alongside how long it took.
//!
//! Timestamps come from a caller-supplied [`Clock`] so the core stays
//! free of platform time APIs; durations are plain
//! [`std::time::Duration`] values.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage, StagedResult};
use crate::types::{RenderConfig, RenderError};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: config validation and image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: palette building and gradient extraction.
    pub analyze: StageDiagnostics,
    /// Stage 3: anchor placement.
    pub anchors: StageDiagnostics,
    /// Stage 4: color sampling.
    pub sampling: StageDiagnostics,
    /// Stage 5: stroke compositing.
    pub composite: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Palette and gradient metrics.
    Analyze {
        /// Extended palette length.
        palette_len: usize,
        /// Base block length (K).
        base_colors: usize,
        /// Distinct colors seen by clustering.
        distinct_colors: usize,
        /// Whether K exceeded the distinct color count.
        degenerate: bool,
        /// Final clustering inertia.
        inertia: f64,
        /// Gaussian radius applied to the gradient field.
        smoothing_radius: u32,
        /// Largest gradient magnitude after smoothing.
        max_magnitude: f64,
    },
    /// Anchor placement metrics.
    Anchors {
        /// Grid spacing.
        grid_scale: u32,
        /// Number of anchors generated.
        anchor_count: usize,
    },
    /// Color sampling metrics.
    Sampling {
        /// Number of colors drawn.
        anchor_count: usize,
        /// Number of batches processed.
        batch_count: usize,
        /// Palette length sampled from.
        palette_len: usize,
        /// Sharpening coefficient.
        color_randomness: f64,
    },
    /// Compositing metrics.
    Composite {
        /// Stroke minor semi-axis in pixels.
        stroke_scale: u32,
        /// Whether the canvas was median-filtered first.
        median_blur: bool,
        /// Strokes rasterized.
        strokes_painted: usize,
        /// Strokes skipped for degenerate geometry.
        strokes_skipped: usize,
        /// Longest semi-major axis painted.
        max_length: f64,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Extended palette length.
    pub palette_len: usize,
    /// Strokes painted.
    pub stroke_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Decode", &self.decode),
            ("Analyze", &self.analyze),
            ("Anchors", &self.anchors),
            ("Sampling", &self.sampling),
            ("Composite", &self.composite),
        ];

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Palette colors: {}  |  Strokes: {}",
            self.summary.palette_len, self.summary.stroke_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Analyze {
            palette_len,
            base_colors,
            distinct_colors,
            degenerate,
            smoothing_radius,
            max_magnitude,
            ..
        } => {
            let note = if *degenerate { " (degenerate)" } else { "" };
            format!(
                "palette={base_colors}->{palette_len} from {distinct_colors} colors{note} radius={smoothing_radius} max_mag={max_magnitude:.1}",
            )
        }
        StageMetrics::Anchors {
            grid_scale,
            anchor_count,
        } => format!("grid={grid_scale} anchors={anchor_count}"),
        StageMetrics::Sampling {
            anchor_count,
            batch_count,
            palette_len,
            color_randomness,
        } => format!(
            "{anchor_count} draws in {batch_count} batches over {palette_len} colors k={color_randomness}",
        ),
        StageMetrics::Composite {
            stroke_scale,
            median_blur,
            strokes_painted,
            strokes_skipped,
            max_length,
        } => {
            let canvas = if *median_blur { "median" } else { "raw" };
            format!(
                "scale={stroke_scale} canvas={canvas} strokes={strokes_painted} skipped={strokes_skipped} max_len={max_length:.0}",
            )
        }
    }
}

/// Time one stage transition and capture the metrics of the state it
/// produced.
fn timed<C, S, T>(
    clock: &C,
    state: S,
    step: impl FnOnce(S) -> Result<T, RenderError>,
) -> Result<(T, StageDiagnostics), RenderError>
where
    C: Clock,
    T: PipelineStage,
{
    let start = clock.now();
    let next = step(state)?;
    let duration = clock.elapsed(&start);
    // Only Pending lacks metrics, and no transition produces Pending.
    #[allow(clippy::unreachable)]
    let metrics = next
        .metrics()
        .unwrap_or_else(|| unreachable!("{} reported no metrics", T::NAME));
    Ok((next, StageDiagnostics { duration, metrics }))
}

/// Run the full pipeline, recording per-stage timings and metrics.
///
/// Produces exactly the same image as [`crate::render_with_config`].
///
/// # Errors
///
/// Returns [`RenderError`] tagged with the failing stage.
pub fn render_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &RenderConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), RenderError> {
    let start = clock.now();
    let pending = Pipeline::new(image_bytes.to_vec(), config.clone());

    let (decoded, decode) = timed(clock, pending, |s| s.decode())?;
    let (analyzed, analyze) = timed(clock, decoded, |s| s.analyze())?;
    let (anchored, anchors) = timed(clock, analyzed, |s| Ok(s.place_anchors()))?;
    let (sampled, sampling) = timed(clock, anchored, |s| s.sample())?;
    let (composited, composite) = timed(clock, sampled, |s| s.composite())?;

    let result = composited.into_result();
    let total_duration = clock.elapsed(&start);

    let stroke_count = match composite.metrics {
        StageMetrics::Composite {
            strokes_painted, ..
        } => strokes_painted,
        _ => result.anchors.len(),
    };
    let summary = PipelineSummary {
        image_width: result.dimensions.width,
        image_height: result.dimensions.height,
        pixel_count: result.dimensions.pixel_count(),
        palette_len: result.palette.len(),
        stroke_count,
    };

    Ok((
        result,
        PipelineDiagnostics {
            decode,
            analyze,
            anchors,
            sampling,
            composite,
            total_duration,
            summary,
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::types::{Rgb, RgbImage};

    /// Clock that advances one millisecond per reading.
    struct StepClock {
        ticks: Cell<u64>,
    }

    impl StepClock {
        const fn new() -> Self {
            Self {
                ticks: Cell::new(0),
            }
        }
    }

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn sample_diagnostics() -> PipelineDiagnostics {
        let stage = |ms, metrics| StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        };
        PipelineDiagnostics {
            decode: stage(
                10,
                StageMetrics::Decode {
                    input_bytes: 1000,
                    width: 100,
                    height: 100,
                    pixel_count: 10000,
                },
            ),
            analyze: stage(
                40,
                StageMetrics::Analyze {
                    palette_len: 80,
                    base_colors: 20,
                    distinct_colors: 5000,
                    degenerate: false,
                    inertia: 12.5,
                    smoothing_radius: 2,
                    max_magnitude: 42.0,
                },
            ),
            anchors: stage(
                1,
                StageMetrics::Anchors {
                    grid_scale: 3,
                    anchor_count: 1156,
                },
            ),
            sampling: stage(
                20,
                StageMetrics::Sampling {
                    anchor_count: 1156,
                    batch_count: 1,
                    palette_len: 80,
                    color_randomness: 9.0,
                },
            ),
            composite: stage(
                29,
                StageMetrics::Composite {
                    stroke_scale: 1,
                    median_blur: true,
                    strokes_painted: 1156,
                    strokes_skipped: 0,
                    max_length: 8.0,
                },
            ),
            total_duration: Duration::from_millis(100),
            summary: PipelineSummary {
                image_width: 100,
                image_height: 100,
                pixel_count: 10000,
                palette_len: 80,
                stroke_count: 1156,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample_diagnostics().report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        for name in ["Decode", "Analyze", "Anchors", "Sampling", "Composite"] {
            assert!(report.contains(name), "missing {name}");
        }
        assert!(report.contains("canvas=median"));
        assert!(report.contains("Strokes: 1156"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample_diagnostics()).unwrap();
        let secs = json["total_duration"].as_f64().unwrap();
        assert!((secs - 0.1).abs() < 1e-12);
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.total_duration, Duration::from_millis(100));
        assert_eq!(back.anchors.metrics, sample_diagnostics().anchors.metrics);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample_diagnostics()).unwrap();
        json["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<PipelineDiagnostics>(json).is_err());
    }

    #[test]
    fn render_with_diagnostics_records_every_stage() {
        let png = crate::decode::encode_png(&RgbImage::from_fn(32, 24, |x, y| {
            Rgb([(x * 8) as u8, (y * 10) as u8, 90])
        }));
        let config = RenderConfig {
            palette_size: 4,
            kmeans_restarts: 2,
            ..RenderConfig::default()
        };
        let clock = StepClock::new();
        let (result, diag) = render_with_diagnostics(&png, &config, &clock).unwrap();

        assert_eq!(result.canvas.dimensions(), (32, 24));
        assert!(matches!(
            diag.decode.metrics,
            StageMetrics::Decode {
                width: 32,
                height: 24,
                ..
            }
        ));
        assert!(matches!(diag.analyze.metrics, StageMetrics::Analyze { .. }));
        assert!(matches!(
            diag.anchors.metrics,
            StageMetrics::Anchors {
                anchor_count: 88,
                ..
            }
        ));
        assert_eq!(diag.summary.stroke_count, 88);
        assert_eq!(diag.summary.palette_len, 16);
        // One tick per stage plus the bracketing total.
        assert_eq!(diag.decode.duration, Duration::from_millis(1));
        assert!(diag.total_duration > diag.composite.duration);
    }

    #[test]
    fn diagnostics_match_plain_render() {
        let png = crate::decode::encode_png(&RgbImage::from_fn(20, 20, |x, _| {
            if x < 10 { Rgb([0, 0, 0]) } else { Rgb([250, 250, 250]) }
        }));
        let config = RenderConfig {
            palette_size: 3,
            kmeans_restarts: 1,
            ..RenderConfig::default()
        };
        let (result, _) = render_with_diagnostics(&png, &config, &StepClock::new()).unwrap();
        let plain = crate::render_with_config(&png, &config).unwrap();
        assert_eq!(result.canvas, plain);
    }

    #[test]
    fn failing_stage_is_reported() {
        let err = render_with_diagnostics(&[], &RenderConfig::default(), &StepClock::new())
            .err()
            .unwrap();
        assert_eq!(err.stage, crate::types::Stage::Decode);
    }
}
