//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::render_with_config`] which runs the entire pipeline
//! in one call, [`Pipeline`] lets the caller drive execution one step at
//! a time:
//!
//! ```rust
//! # use pointillist_pipeline::{Pipeline, RenderConfig, RenderError};
//! # fn run(png: Vec<u8>) -> Result<(), RenderError> {
//! let config = RenderConfig::default();
//! let pipeline = Pipeline::new(png, config)
//!     .decode()?
//!     .analyze()?
//!     .place_anchors()
//!     .sample()?
//!     .composite()?;
//!
//! let staged = pipeline.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates and the single seeded random source. Because the
//! random source is threaded through the stages in order, driving the
//! pipeline step by step produces exactly the same image as
//! [`crate::render_with_config`].
//!
//! # Memory
//!
//! Every stage from [`Analyzed`] onward retains the decoded source and
//! the full gradient field (two `f32` grids). For a 4000×3000 source
//! this is roughly 130 MB pinned until [`Composited::into_result`]
//! consumes the final stage. Callers that only need the finished image
//! should prefer [`crate::render_with_config`].

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::anchors::{self, StrokeAnchor};
use crate::composite;
use crate::diagnostics::StageMetrics;
use crate::gradient::VectorField;
use crate::palette::{self, ColorPalette, PaletteReport, PaletteSettings};
use crate::sampler;
use crate::types::{
    Dimensions, PipelineError, RenderConfig, RenderError, ResolvedConfig, Rgb, RgbImage, Stage,
};

/// Every intermediate of a finished run.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// The decoded source image.
    pub source: RgbImage,
    /// The extended palette.
    pub palette: ColorPalette,
    /// The smoothed gradient field.
    pub field: VectorField,
    /// Anchors in paint order.
    pub anchors: Vec<StrokeAnchor>,
    /// The sampled color for each anchor.
    pub colors: Vec<Rgb<u8>>,
    /// The painted output.
    pub canvas: RgbImage,
    /// Source dimensions (equal to the output dimensions).
    pub dimensions: Dimensions,
    /// Stroke scale and smoothing radius actually used.
    pub resolved: ResolvedConfig,
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source image bytes and config are stored but not yet touched.
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .decode() to continue"]
pub struct Pending {
    config: RenderConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the config, decode the source image, and advance to the
    /// [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns a [`Stage::Configure`] error if the config is invalid,
    /// and a [`Stage::Decode`] error if the bytes are empty, corrupt, or
    /// decode to a zero-area image.
    pub fn decode(self) -> Result<Decoded, RenderError> {
        self.config
            .validate()
            .map_err(|e| RenderError::new(Stage::Configure, e))?;
        let image =
            crate::decode::decode(&self.source).map_err(|e| RenderError::new(Stage::Decode, e))?;
        let dimensions = crate::decode::dimensions(&image);
        let resolved = self.config.resolve(dimensions);
        tracing::debug!(
            width = dimensions.width,
            height = dimensions.height,
            stroke_scale = resolved.stroke_scale,
            smoothing_radius = resolved.smoothing_radius,
            "image decoded"
        );
        Ok(Decoded {
            rng: StdRng::seed_from_u64(self.config.seed),
            config: self.config,
            image,
            dimensions,
            resolved,
            source_len: self.source.len(),
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
///
/// Call [`analyze`](Self::analyze) to build the palette and gradient
/// field.
#[must_use = "pipeline stages are consumed by advancing — call .analyze() to continue"]
pub struct Decoded {
    config: RenderConfig,
    rng: StdRng,
    image: RgbImage,
    dimensions: Dimensions,
    resolved: ResolvedConfig,
    source_len: usize,
}

impl Decoded {
    /// The decoded RGB image.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Stroke scale and smoothing radius for this image.
    #[must_use]
    pub const fn resolved(&self) -> ResolvedConfig {
        self.resolved
    }

    /// Build the palette and the gradient field, concurrently.
    ///
    /// Only the palette consumes randomness, so running the two halves
    /// on separate threads does not affect the output.
    ///
    /// # Errors
    ///
    /// Returns a [`Stage::Analyze`] error if clustering produced no
    /// colors.
    pub fn analyze(mut self) -> Result<Analyzed, RenderError> {
        let settings = PaletteSettings {
            size: self.config.palette_size as usize,
            max_dimension: self.config.palette_max_dimension,
            filter: self.config.downsample_filter,
            restarts: self.config.kmeans_restarts,
            extensions: &self.config.extensions,
        };
        let radius = self.resolved.smoothing_radius;
        let iterations = self.config.smoothing_iterations;
        let image = &self.image;
        let rng = &mut self.rng;

        let (report, field) = rayon::join(
            || palette::build_palette(image, &settings, rng),
            || {
                let mut field = VectorField::from_gradient(&crate::decode::luminance(image));
                field.smooth(radius, iterations);
                field
            },
        );

        if report.palette.is_empty() {
            return Err(RenderError::new(Stage::Analyze, PipelineError::EmptyPalette));
        }
        tracing::debug!(radius, iterations, "gradient field smoothed");

        Ok(Analyzed {
            config: self.config,
            rng: self.rng,
            image: self.image,
            dimensions: self.dimensions,
            resolved: self.resolved,
            report,
            field,
        })
    }
}

// ───────────────────────── Stage 2: Analyzed ─────────────────────────

/// Pipeline state after palette building and gradient extraction.
///
/// Call [`place_anchors`](Self::place_anchors) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .place_anchors() to continue"]
pub struct Analyzed {
    config: RenderConfig,
    rng: StdRng,
    image: RgbImage,
    dimensions: Dimensions,
    resolved: ResolvedConfig,
    report: PaletteReport,
    field: VectorField,
}

impl Analyzed {
    /// The extended palette.
    #[must_use]
    pub const fn palette(&self) -> &ColorPalette {
        &self.report.palette
    }

    /// The smoothed gradient field.
    #[must_use]
    pub const fn field(&self) -> &VectorField {
        &self.field
    }

    /// Generate the jittered, shuffled anchor grid.
    pub fn place_anchors(mut self) -> Anchored {
        let anchors =
            anchors::randomized_grid(self.dimensions, self.config.grid_scale, &mut self.rng);
        tracing::debug!(
            grid_scale = self.config.grid_scale,
            anchors = anchors.len(),
            "anchors placed"
        );
        Anchored {
            config: self.config,
            rng: self.rng,
            image: self.image,
            dimensions: self.dimensions,
            resolved: self.resolved,
            report: self.report,
            field: self.field,
            anchors,
        }
    }
}

// ───────────────────────── Stage 3: Anchored ─────────────────────────

/// Pipeline state after anchor placement.
///
/// Call [`sample`](Self::sample) to pick a color per anchor.
#[must_use = "pipeline stages are consumed by advancing — call .sample() to continue"]
pub struct Anchored {
    config: RenderConfig,
    rng: StdRng,
    image: RgbImage,
    dimensions: Dimensions,
    resolved: ResolvedConfig,
    report: PaletteReport,
    field: VectorField,
    anchors: Vec<StrokeAnchor>,
}

impl Anchored {
    /// Anchors in paint order.
    #[must_use]
    pub fn anchors(&self) -> &[StrokeAnchor] {
        &self.anchors
    }

    /// Draw one palette color per anchor.
    ///
    /// # Errors
    ///
    /// Returns a [`Stage::Sampling`] error if a color distribution is
    /// not finite.
    pub fn sample(mut self) -> Result<Sampled, RenderError> {
        let colors = sampler::sample_colors(
            &self.image,
            &self.anchors,
            &self.report.palette,
            self.config.color_randomness,
            self.config.batch_size,
            &mut self.rng,
        )
        .map_err(|e| RenderError::new(Stage::Sampling, e))?;
        Ok(Sampled {
            config: self.config,
            image: self.image,
            dimensions: self.dimensions,
            resolved: self.resolved,
            report: self.report,
            field: self.field,
            anchors: self.anchors,
            colors,
        })
    }
}

// ───────────────────────── Stage 4: Sampled ──────────────────────────

/// Pipeline state after color sampling. The random source is spent.
///
/// Call [`composite`](Self::composite) to paint the strokes.
#[must_use = "pipeline stages are consumed by advancing — call .composite() to continue"]
pub struct Sampled {
    config: RenderConfig,
    image: RgbImage,
    dimensions: Dimensions,
    resolved: ResolvedConfig,
    report: PaletteReport,
    field: VectorField,
    anchors: Vec<StrokeAnchor>,
    colors: Vec<Rgb<u8>>,
}

impl Sampled {
    /// The sampled color for each anchor, in paint order.
    #[must_use]
    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.colors
    }

    /// Seed the canvas and paint every stroke.
    ///
    /// # Errors
    ///
    /// Returns a [`Stage::Composite`] error if the canvas cannot be
    /// allocated.
    pub fn composite(self) -> Result<Composited, RenderError> {
        let canvas = composite::seed_canvas(
            &self.image,
            self.config.use_median_blur,
            self.config.median_radius,
        );
        let painted = composite::paint_strokes(
            &canvas,
            &self.field,
            &self.anchors,
            &self.colors,
            self.resolved.stroke_scale,
        )
        .map_err(|e| RenderError::new(Stage::Composite, e))?;
        tracing::debug!(
            strokes = painted.strokes_painted,
            skipped = painted.strokes_skipped,
            stroke_scale = self.resolved.stroke_scale,
            median_blur = self.config.use_median_blur,
            "strokes composited"
        );
        Ok(Composited {
            config: self.config,
            image: self.image,
            dimensions: self.dimensions,
            resolved: self.resolved,
            report: self.report,
            field: self.field,
            anchors: self.anchors,
            colors: self.colors,
            canvas: painted.canvas,
            strokes_painted: painted.strokes_painted,
            strokes_skipped: painted.strokes_skipped,
            max_length: painted.max_length,
        })
    }
}

// ───────────────────────── Stage 5: Composited ───────────────────────

/// Pipeline state after compositing — the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`], or [`into_image`](Self::into_image) for just the
/// painted canvas.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Composited {
    config: RenderConfig,
    image: RgbImage,
    dimensions: Dimensions,
    resolved: ResolvedConfig,
    report: PaletteReport,
    field: VectorField,
    anchors: Vec<StrokeAnchor>,
    colors: Vec<Rgb<u8>>,
    canvas: RgbImage,
    strokes_painted: usize,
    strokes_skipped: usize,
    max_length: f64,
}

impl Composited {
    /// The painted image.
    #[must_use]
    pub const fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Consume the pipeline and return only the painted image.
    #[must_use]
    pub fn into_image(self) -> RgbImage {
        self.canvas
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            source: self.image,
            palette: self.report.palette,
            field: self.field,
            anchors: self.anchors,
            colors: self.colors,
            canvas: self.canvas,
            dimensions: self.dimensions,
            resolved: self.resolved,
        }
    }
}

// ──────────────── PipelineStage trait + PipelineState enum ─────────────

/// Total number of states in the pipeline.
pub const STAGE_COUNT: usize = 6;

/// Trait implemented by every pipeline state, enabling uniform iteration.
///
/// Both the typed API (individual state structs) and the dynamic API
/// ([`PipelineState`] enum) are available. This trait bridges the two.
///
/// # Loop pattern
///
/// ```rust
/// # use pointillist_pipeline::{Pipeline, RenderConfig, RenderError};
/// # use pointillist_pipeline::pipeline::{Advance, PipelineState};
/// # fn run(png: Vec<u8>) -> Result<(), RenderError> {
/// let mut state: PipelineState = Pipeline::new(png, RenderConfig::default()).into();
/// loop {
///     match state.advance()? {
///         Advance::Next(next) => state = next,
///         Advance::Complete(done) => { state = done; break; }
///     }
/// }
/// let result = state.complete()?;
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Human-readable name of this state (e.g. `"source"`, `"anchors"`).
    const NAME: &str;

    /// Zero-based index (`0` for Pending through `5` for Composited).
    const INDEX: usize;

    /// Metrics describing the work done to reach this state.
    ///
    /// Returns `None` for [`Pending`], which has done no work yet.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next state.
    ///
    /// Returns `Ok(Some(state))` on success, `Ok(None)` if already at
    /// the final state, or `Err` if the transition fails.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] tagged with the failing stage.
    fn next(self) -> Result<Option<PipelineState>, RenderError>;

    /// Run all remaining stages and return the final [`StagedResult`].
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<StagedResult, RenderError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<PipelineState>, RenderError> {
        Ok(Some(PipelineState::Decoded(self.decode()?)))
    }

    fn complete(self) -> Result<StagedResult, RenderError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.dimensions.width,
            height: self.dimensions.height,
            pixel_count: self.dimensions.pixel_count(),
        })
    }

    fn next(self) -> Result<Option<PipelineState>, RenderError> {
        Ok(Some(PipelineState::Analyzed(self.analyze()?)))
    }

    fn complete(self) -> Result<StagedResult, RenderError> {
        self.analyze()?.complete()
    }
}

impl PipelineStage for Analyzed {
    const NAME: &str = "analyze";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Analyze {
            palette_len: self.report.palette.len(),
            base_colors: self.report.palette.base_len(),
            distinct_colors: self.report.distinct_colors,
            degenerate: self.report.degenerate,
            inertia: self.report.inertia,
            smoothing_radius: self.resolved.smoothing_radius,
            max_magnitude: self.field.max_magnitude(),
        })
    }

    fn next(self) -> Result<Option<PipelineState>, RenderError> {
        Ok(Some(PipelineState::Anchored(self.place_anchors())))
    }

    fn complete(self) -> Result<StagedResult, RenderError> {
        self.place_anchors().complete()
    }
}

impl PipelineStage for Anchored {
    const NAME: &str = "anchors";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Anchors {
            grid_scale: self.config.grid_scale,
            anchor_count: self.anchors.len(),
        })
    }

    fn next(self) -> Result<Option<PipelineState>, RenderError> {
        Ok(Some(PipelineState::Sampled(self.sample()?)))
    }

    fn complete(self) -> Result<StagedResult, RenderError> {
        self.sample()?.complete()
    }
}

impl PipelineStage for Sampled {
    const NAME: &str = "sampling";
    const INDEX: usize = 4;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Sampling {
            anchor_count: self.colors.len(),
            batch_count: self.colors.len().div_ceil(self.config.batch_size.max(1)),
            palette_len: self.report.palette.len(),
            color_randomness: self.config.color_randomness,
        })
    }

    fn next(self) -> Result<Option<PipelineState>, RenderError> {
        Ok(Some(PipelineState::Composited(self.composite()?)))
    }

    fn complete(self) -> Result<StagedResult, RenderError> {
        Ok(self.composite()?.into_result())
    }
}

impl PipelineStage for Composited {
    const NAME: &str = "composite";
    const INDEX: usize = 5;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Composite {
            stroke_scale: self.resolved.stroke_scale,
            median_blur: self.config.use_median_blur,
            strokes_painted: self.strokes_painted,
            strokes_skipped: self.strokes_skipped,
            max_length: self.max_length,
        })
    }

    fn next(self) -> Result<Option<PipelineState>, RenderError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, RenderError> {
        Ok(self.into_result())
    }
}

/// Type-erased pipeline state for loop-driven execution.
#[must_use]
pub enum PipelineState {
    /// Before decoding.
    Pending(Pending),
    /// After decoding.
    Decoded(Decoded),
    /// After palette and gradient extraction.
    Analyzed(Analyzed),
    /// After anchor placement.
    Anchored(Anchored),
    /// After color sampling.
    Sampled(Sampled),
    /// After compositing (final).
    Composited(Composited),
}

/// Result of [`PipelineState::advance`].
#[must_use]
pub enum Advance {
    /// The pipeline moved to a new state.
    Next(PipelineState),
    /// The pipeline was already complete; the final state is returned
    /// unchanged.
    Complete(PipelineState),
}

/// Delegate a method call to whichever `PipelineState` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Decoded(s) => s.$method($($arg),*),
            Self::Analyzed(s) => s.$method($($arg),*),
            Self::Anchored(s) => s.$method($($arg),*),
            Self::Sampled(s) => s.$method($($arg),*),
            Self::Composited(s) => s.$method($($arg),*),
        }
    };
}

impl PipelineState {
    /// Human-readable name of the current state.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current state.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// Metrics for the work done to reach this state.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final state.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Composited(_))
    }

    /// Advance to the next state.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if a fallible transition fails.
    pub fn next(self) -> Result<Option<Self>, RenderError> {
        delegate!(self, next)
    }

    /// Advance to the next state, returning the final state unchanged
    /// once complete.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if a fallible transition fails.
    pub fn advance(self) -> Result<Advance, RenderError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        match self.next()? {
            Some(next) => Ok(Advance::Next(next)),
            None => Err(RenderError::new(
                Stage::Composite,
                PipelineError::invalid("pipeline", "advanced past the final stage"),
            )),
        }
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<StagedResult, RenderError> {
        delegate!(self, complete)
    }
}

// Associated constants are not reachable through `self`, so the macro
// calls these instead.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for PipelineState {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Decoded> for PipelineState {
    fn from(s: Decoded) -> Self {
        Self::Decoded(s)
    }
}

impl From<Analyzed> for PipelineState {
    fn from(s: Analyzed) -> Self {
        Self::Analyzed(s)
    }
}

impl From<Anchored> for PipelineState {
    fn from(s: Anchored) -> Self {
        Self::Anchored(s)
    }
}

impl From<Sampled> for PipelineState {
    fn from(s: Sampled) -> Self {
        Self::Sampled(s)
    }
}

impl From<Composited> for PipelineState {
    fn from(s: Composited) -> Self {
        Self::Composited(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Entry point for the staged pipeline.
///
/// ```rust
/// # use pointillist_pipeline::{Pipeline, RenderConfig, RenderError};
/// # fn run(png: Vec<u8>) -> Result<(), RenderError> {
/// let image = Pipeline::new(png, RenderConfig::default())
///     .decode()?
///     .analyze()?
///     .place_anchors()
///     .sample()?
///     .composite()?
///     .into_image();
/// # Ok(())
/// # }
/// ```
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    ///
    /// No processing is performed; validation happens on
    /// [`.decode()`](Pending::decode).
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: RenderConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }
}
