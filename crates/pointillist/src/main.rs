//! pointillist: render an image file as pointillist brush strokes.
//!
//! Reads an image, runs the rendering pipeline with parameters taken
//! from flags or a JSON parameter map, and writes the painted result.
//! The output format follows the output path's extension.
//!
//! # Usage
//!
//! ```text
//! pointillist [OPTIONS] <INPUT> -o <OUTPUT>
//! pointillist --list-algorithms
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use pointillist_pipeline::diagnostics::Clock;
use pointillist_pipeline::{Parameters, RenderConfig, registry};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Render images as painterly pointillist brush strokes.
///
/// Every stroke is an ellipse oriented along the local image edges and
/// colored from a palette learned from the source.
#[derive(Parser)]
#[command(name = "pointillist", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    #[arg(required_unless_present = "list_algorithms")]
    input: Option<PathBuf>,

    /// Path to write the rendered image to.
    #[arg(short, long, required_unless_present = "list_algorithms")]
    output: Option<PathBuf>,

    /// Number of clustered base colors.
    #[arg(long, default_value_t = RenderConfig::DEFAULT_PALETTE_SIZE)]
    palette_size: u32,

    /// Stroke half-width in pixels (0 = derive from image size).
    #[arg(long, default_value_t = 0)]
    stroke_scale: u32,

    /// Gradient smoothing radius (0 = derive from image size).
    #[arg(long, default_value_t = 0)]
    gradient_smoothing: u32,

    /// Anchor grid spacing; larger values paint fewer strokes.
    #[arg(long, default_value_t = RenderConfig::DEFAULT_GRID_SCALE)]
    grid_scale: u32,

    /// Color sampling sharpness; lower values pick colors more randomly.
    #[arg(long, default_value_t = RenderConfig::DEFAULT_COLOR_RANDOMNESS)]
    color_randomness: f64,

    /// Paint over the raw source instead of a median-filtered copy.
    #[arg(long)]
    no_median_blur: bool,

    /// Random seed; identical inputs and seed give identical output.
    #[arg(long, default_value_t = RenderConfig::DEFAULT_SEED)]
    seed: u64,

    /// Parameter map as a JSON object.
    ///
    /// When provided, all other parameter flags are ignored.
    #[arg(long)]
    params_json: Option<String>,

    /// Registered algorithm to run.
    #[arg(long, default_value = registry::RONCHETTI)]
    algorithm: String,

    /// Print the algorithm registry as JSON and exit.
    #[arg(long)]
    list_algorithms: bool,

    /// Print per-stage diagnostics after rendering.
    #[arg(long, value_enum)]
    diagnostics: Option<DiagnosticsFormat>,

    /// Log filter used when `RUST_LOG` is unset (e.g. `debug`,
    /// `pointillist_pipeline=trace`).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Diagnostics output format.
#[derive(Clone, Copy, ValueEnum)]
enum DiagnosticsFormat {
    /// Human-readable table.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Build the parameter map from CLI arguments.
///
/// If `--params-json` is provided, it is parsed as the whole map and all
/// individual parameter flags are ignored.
fn params_from_cli(cli: &Cli) -> Result<Parameters, String> {
    if let Some(ref raw) = cli.params_json {
        return match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(format!("--params-json must be a JSON object, got {other}")),
            Err(e) => Err(format!("Error parsing --params-json: {e}")),
        };
    }

    let value = json!({
        "palette_size": cli.palette_size,
        "stroke_scale": cli.stroke_scale,
        "gradient_smoothing": cli.gradient_smoothing,
        "grid_scale": cli.grid_scale,
        "color_randomness": cli.color_randomness,
        "use_median_blur": !cli.no_median_blur,
        "seed": cli.seed,
    });
    match value {
        Value::Object(map) => Ok(map),
        _ => Err("parameter flags did not form an object".to_string()),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if cli.list_algorithms {
        return match serde_json::to_string_pretty(registry::ALGORITHMS) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error serializing algorithm list: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let (Some(input), Some(output)) = (cli.input.as_ref(), cli.output.as_ref()) else {
        eprintln!("Both <INPUT> and --output are required");
        return ExitCode::FAILURE;
    };

    let Some(algorithm) = registry::find(&cli.algorithm) else {
        let known: Vec<&str> = registry::ALGORITHMS.iter().map(|a| a.key).collect();
        eprintln!(
            "Unknown algorithm '{}' (available: {})",
            cli.algorithm,
            known.join(", ")
        );
        return ExitCode::FAILURE;
    };

    let params = match params_from_cli(&cli) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", input.display());
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        input = %input.display(),
        bytes = image_bytes.len(),
        algorithm = algorithm.key,
        "rendering"
    );

    let rendered = match cli.diagnostics {
        None => (algorithm.render)(&image_bytes, &params),
        Some(format) => render_with_report(&image_bytes, &params, format),
    };

    let image = match rendered {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = image.save(output) {
        eprintln!("Error writing {}: {e}", output.display());
        return ExitCode::FAILURE;
    }
    tracing::info!(output = %output.display(), "done");

    ExitCode::SUCCESS
}

/// Render through the staged pipeline and print its diagnostics.
fn render_with_report(
    image_bytes: &[u8],
    params: &Parameters,
    format: DiagnosticsFormat,
) -> Result<pointillist_pipeline::RgbImage, pointillist_pipeline::RenderError> {
    let config = pointillist_pipeline::config_from_parameters(params).map_err(|e| {
        pointillist_pipeline::RenderError::new(pointillist_pipeline::Stage::Configure, e)
    })?;
    let (result, diagnostics) =
        pointillist_pipeline::render_with_diagnostics(image_bytes, &config, &StdClock)?;

    match format {
        DiagnosticsFormat::Text => println!("{}", diagnostics.report()),
        DiagnosticsFormat::Json => match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing diagnostics: {e}"),
        },
    }

    Ok(result.canvas)
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
