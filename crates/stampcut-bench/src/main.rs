//! stampcut-bench: CLI tool for cutter generation experiments and diagnostics.
//!
//! Runs the cutter pipeline on a given image file with configurable
//! settings and tuning, printing detailed per-stage diagnostics. Useful for:
//!
//! - Tuning the expansion radius, passes, and cutoff
//! - Comparing silhouette and relief tracer settings
//! - Measuring per-stage durations to identify bottlenecks
//! - Checking triangle counts and the applied scale
//!
//! Log output goes to stderr and is filtered by `RUST_LOG` (default `warn`).
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin stampcut-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use stampcut_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use stampcut_pipeline::{CutterSettings, PipelineConfig, ShapeKind};
use tracing_subscriber::EnvFilter;

/// Cutter generation experiments and diagnostics for stampcut.
///
/// Runs the pipeline on a given image with configurable settings and
/// prints per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "stampcut-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Footprint width in millimeters.
    #[arg(long, default_value_t = CutterSettings::DEFAULT_WIDTH)]
    width: f64,

    /// Footprint height in millimeters (rectangle shape only).
    #[arg(long, default_value_t = CutterSettings::DEFAULT_HEIGHT)]
    height: f64,

    /// Base plate thickness in millimeters.
    #[arg(long, default_value_t = CutterSettings::DEFAULT_BASE_THICKNESS)]
    base_thickness: f64,

    /// Relief height above the base in millimeters.
    #[arg(long, default_value_t = CutterSettings::DEFAULT_DETAIL_HEIGHT)]
    detail_height: f64,

    /// Cutting wall thickness in millimeters.
    #[arg(long, default_value_t = CutterSettings::DEFAULT_FRAME_THICKNESS)]
    frame_thickness: f64,

    /// Cutting wall height above the base in millimeters.
    #[arg(long, default_value_t = CutterSettings::DEFAULT_FRAME_HEIGHT)]
    frame_height: f64,

    /// Luminance below which a pixel is content (0-255).
    #[arg(long, default_value_t = CutterSettings::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Treat bright pixels as content.
    #[arg(long)]
    invert: bool,

    /// Footprint shape.
    #[arg(long, value_enum, default_value_t = Shape::Outline)]
    shape: Shape,

    /// Full cutter settings as a JSON string.
    ///
    /// When provided, all individual settings flags are ignored. Missing
    /// fields take their defaults.
    #[arg(long)]
    settings_json: Option<String>,

    /// Working resolution (width in pixels after resampling).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WORKING_RESOLUTION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    working_resolution: u32,

    /// Silhouette expansion radius in working pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_EXPANSION_RADIUS, value_parser = parse_expansion_radius)]
    expansion_radius: f32,

    /// Stacked blur passes for the expansion.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_EXPANSION_PASSES)]
    expansion_passes: u32,

    /// Post-blur cutoff for the expansion (0-255).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_EXPANSION_CUTOFF)]
    expansion_cutoff: u8,

    /// Full pipeline tuning as a JSON string.
    ///
    /// When provided, all individual tuning flags are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,
}

/// Footprint shape selection.
#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    /// Rectangle of `width × height`.
    Rectangle,
    /// Disc of diameter `width`.
    Circle,
    /// Expanded silhouette traced from the image.
    Outline,
}

impl From<Shape> for ShapeKind {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Rectangle => Self::Rectangle,
            Shape::Circle => Self::Circle,
            Shape::Outline => Self::Outline,
        }
    }
}

/// Parse an expansion radius within `0..=PipelineConfig::MAX_EXPANSION_RADIUS`.
fn parse_expansion_radius(s: &str) -> Result<f32, String> {
    let radius: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if radius.is_finite() && (0.0..=PipelineConfig::MAX_EXPANSION_RADIUS).contains(&radius) {
        Ok(radius)
    } else {
        Err(format!(
            "must be between 0 and {}",
            PipelineConfig::MAX_EXPANSION_RADIUS
        ))
    }
}

/// Build [`CutterSettings`] from CLI arguments; `--settings-json` wins.
fn settings_from_cli(cli: &Cli) -> Result<CutterSettings, String> {
    if let Some(ref json) = cli.settings_json {
        return serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --settings-json: {e}"));
    }

    Ok(CutterSettings {
        width: cli.width,
        height: cli.height,
        base_thickness: cli.base_thickness,
        detail_height: cli.detail_height,
        frame_thickness: cli.frame_thickness,
        frame_height: cli.frame_height,
        threshold: cli.threshold,
        invert: cli.invert,
        shape: cli.shape.into(),
    })
}

/// Build [`PipelineConfig`] from CLI arguments; `--config-json` wins.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        working_resolution: cli.working_resolution,
        expansion_radius: cli.expansion_radius,
        expansion_passes: cli.expansion_passes,
        expansion_cutoff: cli.expansion_cutoff,
        ..PipelineConfig::default()
    })
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let (settings, config) = match (settings_from_cli(&cli), config_from_cli(&cli)) {
        (Ok(s), Ok(c)) => (s, c),
        (Err(msg), _) | (_, Err(msg)) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Settings: {settings:#?}");
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match stampcut_pipeline::diagnostics::generate_with_diagnostics(
            &image_bytes,
            &settings,
            &config,
            &StdClock,
        ) {
            Ok((_, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }
                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
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

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    // Every run uses the same settings, so the first run's stage list
    // covers them all.
    for stage in &first.stages {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stage_duration(&stage.stage))
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{:<24} {stage_mean:>10.3}ms", stage.stage);
    }
}
