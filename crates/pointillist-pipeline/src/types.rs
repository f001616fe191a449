//! Shared types for the pointillist stroke-synthesis pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::downsample::DownsampleFilter;

/// Re-export `RgbImage` so downstream crates can reference the source
/// and rendered images without depending on `image` directly.
pub use image::RgbImage;

/// Re-export `Rgb` so palette colors can be named without `image`.
pub use image::Rgb;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// The longer of the two axes.
    #[must_use]
    pub const fn long_axis(self) -> u32 {
        if self.width > self.height {
            self.width
        } else {
            self.height
        }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A hue/saturation/value offset applied to every base palette color
/// to synthesize one block of palette variants.
///
/// All three components are in full-range 8-bit HSV units: hue wraps
/// modulo 256 (covering 360 degrees), saturation and value are clamped
/// to `0..=255` after the offset is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvOffset {
    /// Hue offset; negative values rotate backwards.
    pub hue: i16,
    /// Saturation offset.
    pub saturation: i16,
    /// Value (luminosity) offset.
    pub value: i16,
}

impl HsvOffset {
    /// Create a new offset.
    #[must_use]
    pub const fn new(hue: i16, saturation: i16, value: i16) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }
}

/// Configuration for one rendering run.
///
/// The six user-facing parameters mirror the parameter map accepted by
/// [`crate::render`]; the remaining fields are tuning knobs with fixed
/// defaults. `stroke_scale` and `gradient_smoothing` are `None` for
/// "derive from the image size" and are resolved by
/// [`RenderConfig::resolve`] before any stage runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Number of clustered base colors (K).
    pub palette_size: u32,

    /// Half-width of each stroke's minor axis in pixels.
    /// `None` derives `ceil(max(H, W) / 1000)`.
    pub stroke_scale: Option<u32>,

    /// Gradient smoothing radius in pixels.
    /// `None` derives `round(max(H, W) / 50)`.
    pub gradient_smoothing: Option<u32>,

    /// Spacing of the anchor grid. Higher values give fewer strokes.
    pub grid_scale: u32,

    /// Sharpening coefficient for color sampling. Larger values pick the
    /// nearest palette color more often.
    pub color_randomness: f64,

    /// Seed the canvas from a median-filtered copy of the source.
    pub use_median_blur: bool,

    /// Seed for the single random source driving clustering, anchor
    /// jitter, shuffling, and color draws.
    pub seed: u64,

    /// Long-edge cap applied before clustering. `0` disables
    /// downsampling.
    pub palette_max_dimension: u32,

    /// Resampling filter used for the clustering downsample.
    pub downsample_filter: DownsampleFilter,

    /// Number of k-means restarts; the lowest-inertia run wins.
    pub kmeans_restarts: u32,

    /// HSV variants appended to the base palette, one block each.
    pub extensions: Vec<HsvOffset>,

    /// Number of Gaussian passes over the gradient field.
    pub smoothing_iterations: u32,

    /// Median filter radius for canvas seeding (window is `2r + 1`).
    pub median_radius: u32,

    /// Anchors per sampling batch.
    pub batch_size: usize,
}

impl RenderConfig {
    /// Default number of base palette colors.
    pub const DEFAULT_PALETTE_SIZE: u32 = 20;

    /// Default anchor grid spacing.
    pub const DEFAULT_GRID_SCALE: u32 = 3;

    /// Default color sampling sharpness.
    pub const DEFAULT_COLOR_RANDOMNESS: f64 = 9.0;

    /// Default canvas seeding mode.
    pub const DEFAULT_USE_MEDIAN_BLUR: bool = true;

    /// Default random seed.
    pub const DEFAULT_SEED: u64 = 0;

    /// Default long-edge cap for clustering.
    pub const DEFAULT_PALETTE_MAX_DIMENSION: u32 = 200;

    /// Default downsample filter for clustering.
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Triangle;

    /// Default number of k-means restarts.
    pub const DEFAULT_KMEANS_RESTARTS: u32 = 10;

    /// Default gradient smoothing pass count.
    pub const DEFAULT_SMOOTHING_ITERATIONS: u32 = 1;

    /// Default median filter radius (11x11 window).
    pub const DEFAULT_MEDIAN_RADIUS: u32 = 5;

    /// Default sampling batch size.
    pub const DEFAULT_BATCH_SIZE: usize = 10_000;

    /// Largest accepted `palette_size`.
    pub const MAX_PALETTE_SIZE: u32 = 256;

    /// Largest accepted explicit `gradient_smoothing` radius.
    pub const MAX_GRADIENT_SMOOTHING: u32 = 1000;

    /// Default palette extensions: one saturated block and two
    /// hue-rotated blocks.
    pub const DEFAULT_EXTENSIONS: [HsvOffset; 3] = [
        HsvOffset::new(0, 50, 0),
        HsvOffset::new(15, 30, 0),
        HsvOffset::new(-15, 30, 0),
    ];

    /// Check the invariants every stage relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.palette_size < 1 {
            return Err(PipelineError::invalid("palette_size", "must be at least 1"));
        }
        if self.palette_size > Self::MAX_PALETTE_SIZE {
            return Err(PipelineError::invalid(
                "palette_size",
                format!("must be at most {}, got {}", Self::MAX_PALETTE_SIZE, self.palette_size),
            ));
        }
        if let Some(radius) = self.gradient_smoothing
            && radius > Self::MAX_GRADIENT_SMOOTHING
        {
            return Err(PipelineError::invalid(
                "gradient_smoothing",
                format!("must be at most {}, got {radius}", Self::MAX_GRADIENT_SMOOTHING),
            ));
        }
        if self.grid_scale < 1 {
            return Err(PipelineError::invalid("grid_scale", "must be at least 1"));
        }
        if !self.color_randomness.is_finite() || self.color_randomness <= 0.0 {
            return Err(PipelineError::invalid(
                "color_randomness",
                format!("must be a positive number, got {}", self.color_randomness),
            ));
        }
        if self.stroke_scale == Some(0) {
            return Err(PipelineError::invalid(
                "stroke_scale",
                "must be at least 1 (use None for automatic)",
            ));
        }
        if self.kmeans_restarts < 1 {
            return Err(PipelineError::invalid("kmeans_restarts", "must be at least 1"));
        }
        if self.batch_size < 1 {
            return Err(PipelineError::invalid("batch_size", "must be at least 1"));
        }
        Ok(())
    }

    /// Replace the automatic parameters with concrete values for an
    /// image of the given size.
    #[must_use]
    pub fn resolve(&self, dimensions: Dimensions) -> ResolvedConfig {
        let long_axis = f64::from(dimensions.long_axis());
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let stroke_scale = self
            .stroke_scale
            .unwrap_or_else(|| ((long_axis / 1000.0).ceil() as u32).max(1));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let smoothing_radius = self
            .gradient_smoothing
            .unwrap_or_else(|| (long_axis / 50.0).round() as u32);
        ResolvedConfig {
            stroke_scale,
            smoothing_radius,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            palette_size: Self::DEFAULT_PALETTE_SIZE,
            stroke_scale: None,
            gradient_smoothing: None,
            grid_scale: Self::DEFAULT_GRID_SCALE,
            color_randomness: Self::DEFAULT_COLOR_RANDOMNESS,
            use_median_blur: Self::DEFAULT_USE_MEDIAN_BLUR,
            seed: Self::DEFAULT_SEED,
            palette_max_dimension: Self::DEFAULT_PALETTE_MAX_DIMENSION,
            downsample_filter: Self::DEFAULT_DOWNSAMPLE_FILTER,
            kmeans_restarts: Self::DEFAULT_KMEANS_RESTARTS,
            extensions: Self::DEFAULT_EXTENSIONS.to_vec(),
            smoothing_iterations: Self::DEFAULT_SMOOTHING_ITERATIONS,
            median_radius: Self::DEFAULT_MEDIAN_RADIUS,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }
}

/// The size-dependent parameters after automatic values are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Stroke minor semi-axis in pixels (at least 1).
    pub stroke_scale: u32,
    /// Gradient smoothing radius in pixels (0 disables smoothing).
    pub smoothing_radius: u32,
}

/// Broad classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The image bytes or parameters were unusable.
    InvalidInput,
    /// A numeric step produced an unusable value.
    ComputationFailure,
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The decoded image has no pixels.
    #[error("image has zero area ({width}x{height})")]
    ZeroArea {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
    },

    /// A parameter is out of range or has the wrong type.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in the parameter map.
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Color sampling was asked to choose from an empty palette.
    #[error("palette has no colors to sample from")]
    EmptyPalette,

    /// A per-anchor probability distribution was not finite.
    #[error("color distribution for anchor {anchor} is not finite")]
    DegenerateDistribution {
        /// Index of the anchor within the full anchor sequence.
        anchor: usize,
    },

    /// The raster canvas could not be allocated.
    #[error("cannot allocate a {width}x{height} canvas")]
    CanvasAllocation {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

impl PipelineError {
    /// Shorthand for [`PipelineError::InvalidParameter`].
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput
            | Self::ImageDecode(_)
            | Self::ZeroArea { .. }
            | Self::InvalidParameter { .. } => ErrorKind::InvalidInput,
            Self::EmptyPalette
            | Self::DegenerateDistribution { .. }
            | Self::CanvasAllocation { .. } => ErrorKind::ComputationFailure,
        }
    }
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    EmptyInput,
    ImageDecode(String),
    ZeroArea { width: u32, height: u32 },
    InvalidParameter { name: String, reason: String },
    EmptyPalette,
    DegenerateDistribution { anchor: usize },
    CanvasAllocation { width: u32, height: u32 },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::ZeroArea { width, height } => PipelineErrorProxy::ZeroArea {
                width: *width,
                height: *height,
            },
            Self::InvalidParameter { name, reason } => PipelineErrorProxy::InvalidParameter {
                name: name.clone(),
                reason: reason.clone(),
            },
            Self::EmptyPalette => PipelineErrorProxy::EmptyPalette,
            Self::DegenerateDistribution { anchor } => {
                PipelineErrorProxy::DegenerateDistribution { anchor: *anchor }
            }
            Self::CanvasAllocation { width, height } => PipelineErrorProxy::CanvasAllocation {
                width: *width,
                height: *height,
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            // The original image::ImageError cannot be rebuilt; keep the
            // message under an input error.
            PipelineErrorProxy::ImageDecode(msg) => Self::invalid("image", msg),
            PipelineErrorProxy::ZeroArea { width, height } => Self::ZeroArea { width, height },
            PipelineErrorProxy::InvalidParameter { name, reason } => {
                Self::InvalidParameter { name, reason }
            }
            PipelineErrorProxy::EmptyPalette => Self::EmptyPalette,
            PipelineErrorProxy::DegenerateDistribution { anchor } => {
                Self::DegenerateDistribution { anchor }
            }
            PipelineErrorProxy::CanvasAllocation { width, height } => {
                Self::CanvasAllocation { width, height }
            }
        })
    }
}

/// Pipeline stage that produced a [`RenderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Parameter parsing and validation.
    Configure,
    /// Image decoding.
    Decode,
    /// Palette building and gradient extraction.
    Analyze,
    /// Stroke anchor generation.
    Anchors,
    /// Per-anchor color sampling.
    Sampling,
    /// Stroke compositing.
    Composite,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configure => f.write_str("configure"),
            Self::Decode => f.write_str("decode"),
            Self::Analyze => f.write_str("analyze"),
            Self::Anchors => f.write_str("anchors"),
            Self::Sampling => f.write_str("sampling"),
            Self::Composite => f.write_str("composite"),
        }
    }
}

/// The single error surfaced by the render entry points: which stage
/// failed, and why.
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
#[error("{stage} stage failed: {source}")]
pub struct RenderError {
    /// The failing stage.
    pub stage: Stage,
    /// The underlying failure.
    #[source]
    pub source: PipelineError,
}

impl RenderError {
    /// Tag a pipeline error with the stage it came from.
    #[must_use]
    pub const fn new(stage: Stage, source: PipelineError) -> Self {
        Self { stage, source }
    }

    /// Classify the underlying error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}
