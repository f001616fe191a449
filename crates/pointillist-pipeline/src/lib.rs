//! pointillist-pipeline: Pure painterly rendering pipeline (sans-IO).
//!
//! Re-renders a raster image as thousands of small elliptical brush
//! strokes through:
//! decode -> palette + gradient field -> anchor grid -> color sampling ->
//! stroke compositing.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns in-memory images. File handling and logging
//! setup live in the `pointillist` binary.

pub mod anchors;
pub mod blur;
pub mod color;
pub mod composite;
pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod gradient;
pub mod kmeans;
pub mod palette;
pub mod params;
pub mod pipeline;
pub mod registry;
pub mod sampler;
pub mod types;

pub use diagnostics::{Clock, PipelineDiagnostics, render_with_diagnostics};
pub use downsample::DownsampleFilter;
pub use params::{Parameters, config_from_parameters};
pub use pipeline::{Pipeline, StagedResult};
pub use registry::{ALGORITHMS, AlgorithmDescriptor};
pub use types::{
    Dimensions, ErrorKind, HsvOffset, PipelineError, RenderConfig, RenderError, ResolvedConfig,
    Rgb, RgbImage, Stage,
};

/// Render an image from a loose parameter map.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and the user-facing
/// parameters (see [`params`]), and returns a painted image with the
/// same dimensions as the input.
///
/// # Errors
///
/// Returns a [`Stage::Configure`] error if a parameter is malformed or
/// out of range, and otherwise the error of the first failing stage
/// (see [`render_with_config`]).
pub fn render(image_bytes: &[u8], params: &Parameters) -> Result<RgbImage, RenderError> {
    let config =
        config_from_parameters(params).map_err(|e| RenderError::new(Stage::Configure, e))?;
    render_with_config(image_bytes, &config)
}

/// Render an image with an explicit configuration.
///
/// # Pipeline steps
///
/// 1. Validate the config and decode the image
/// 2. Build the palette (k-means plus HSV variants) and, concurrently,
///    the smoothed gradient field
/// 3. Place a jittered, shuffled anchor grid
/// 4. Draw one palette color per anchor
/// 5. Paint one rotated ellipse per anchor over the (optionally
///    median-filtered) source
///
/// Identical bytes and config always produce identical output.
///
/// # Errors
///
/// Returns a [`Stage::Configure`] error for an invalid config, a
/// [`Stage::Decode`] error for empty, corrupt, or zero-area input, and
/// a [`ErrorKind::ComputationFailure`] error if a numeric step produces
/// an unusable value.
pub fn render_with_config(
    image_bytes: &[u8],
    config: &RenderConfig,
) -> Result<RgbImage, RenderError> {
    config
        .validate()
        .map_err(|e| RenderError::new(Stage::Configure, e))?;
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .analyze()?
        .place_anchors()
        .sample()?
        .composite()?
        .into_image())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        decode::encode_png(&RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        }))
    }

    fn small(params: serde_json::Value) -> Parameters {
        let mut map = params.as_object().cloned().unwrap();
        map.entry("palette_size").or_insert(json!(4));
        map
    }

    #[test]
    fn render_empty_input() {
        let err = render(&[], &Parameters::new()).unwrap_err();
        assert_eq!(err.stage, Stage::Decode);
        assert!(matches!(err.source, PipelineError::EmptyInput));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn render_corrupt_input() {
        let err = render(&[0xFF, 0x00], &Parameters::new()).unwrap_err();
        assert!(matches!(err.source, PipelineError::ImageDecode(_)));
    }

    #[test]
    fn render_preserves_dimensions() {
        let png = gradient_png(48, 30);
        let out = render(&png, &small(json!({ "grid_scale": 4 }))).unwrap();
        assert_eq!(out.dimensions(), (48, 30));
    }

    #[test]
    fn render_rejects_bad_parameter_before_decoding() {
        let err = render(&[], &small(json!({ "grid_scale": 0 }))).unwrap_err();
        assert_eq!(err.stage, Stage::Configure);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn render_rejects_malformed_parameter() {
        let err = render(&gradient_png(8, 8), &small(json!({ "palette_size": "lots" })))
            .unwrap_err();
        assert_eq!(err.stage, Stage::Configure);
        assert!(err.to_string().contains("palette_size"));
    }

    #[test]
    fn seed_changes_output() {
        let png = gradient_png(40, 40);
        let a = render(&png, &small(json!({ "seed": 1, "grid_scale": 2 }))).unwrap();
        let b = render(&png, &small(json!({ "seed": 2, "grid_scale": 2 }))).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn map_and_config_entry_points_agree() {
        let png = gradient_png(24, 24);
        let config = RenderConfig {
            palette_size: 4,
            stroke_scale: Some(2),
            use_median_blur: false,
            ..RenderConfig::default()
        };
        let from_config = render_with_config(&png, &config).unwrap();
        let from_map = render(
            &png,
            &small(json!({ "stroke_scale": "2", "use_median_blur": "off" })),
        )
        .unwrap();
        assert_eq!(from_config, from_map);
    }
}
