//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for tuning
//! the expansion and tracer parameters. [`generate_with_diagnostics`]
//! drives the staged pipeline one step at a time and records what each
//! step did.
//!
//! Time is read through the [`Clock`] trait so the library itself never
//! touches a platform timer; the caller supplies one.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Advance, Pipeline, Stage, StagedResult};
use crate::types::{CutterSettings, PipelineConfig, PipelineError, ShapeKind};

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

/// Source of monotonic time.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Executed stages in order. Skipped stages (expansion and
    /// silhouette tracing for primitive shapes) are absent.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Stage name, as reported by [`Stage::name`].
    pub stage: String,
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
    /// Resampling to working resolution.
    Resample {
        /// Working width in pixels.
        width: u32,
        /// Working height in pixels.
        height: u32,
        /// Whether the pixel grid actually changed.
        applied: bool,
    },
    /// Luminance thresholding.
    Binarize {
        /// Threshold used.
        threshold: u8,
        /// Whether content and background were swapped.
        invert: bool,
        /// Content pixels in the mask.
        content_pixels: u64,
        /// Total pixels in the mask.
        total_pixels: u64,
    },
    /// Silhouette expansion.
    Expand {
        /// Blur radius in pixels.
        radius: f32,
        /// Stacked blur passes.
        passes: u32,
        /// Post-blur cutoff.
        cutoff: u8,
        /// Canvas padding on each side.
        padding: u32,
        /// Content pixels before expansion.
        content_before: u64,
        /// Content pixels after expansion.
        content_after: u64,
    },
    /// Tracing of the expanded mask or of the relief mask.
    Trace {
        /// Polygons traced.
        polygon_count: usize,
        /// Hole rings across all polygons.
        hole_count: usize,
        /// Vertices across all rings.
        point_count: usize,
    },
    /// Largest-area silhouette selection.
    Select {
        /// Candidate polygons.
        candidates: usize,
        /// Outer area of the chosen silhouette, if any.
        selected_area: Option<f64>,
        /// Whether the rectangle fallback fired.
        fallback: bool,
    },
    /// Solid construction.
    BuildSolids {
        /// Footprint shape actually built.
        shape: ShapeKind,
        /// Relief triangles.
        stamp_triangles: usize,
        /// Wall triangles.
        wall_triangles: usize,
        /// Base triangles.
        base_triangles: usize,
    },
    /// Layout normalization.
    Normalize {
        /// Planar scale applied.
        applied_scale: f64,
        /// Assembly extent along X (mm).
        width: f64,
        /// Assembly extent along Y (mm).
        depth: f64,
        /// Assembly extent along Z (mm).
        height: f64,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Working image width in pixels.
    pub working_width: u32,
    /// Working image height in pixels.
    pub working_height: u32,
    /// Relief polygons extruded.
    pub relief_count: usize,
    /// Whether the rectangle fallback fired.
    pub fallback: bool,
    /// Triangles in the combined assembly.
    pub triangle_count: usize,
    /// Planar scale applied by layout.
    pub applied_scale: f64,
}

/// Run the full pipeline stage by stage, timing each step.
///
/// # Errors
///
/// Same as [`crate::generate_with_config`].
pub fn generate_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    settings: &CutterSettings,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let mut stages = Vec::new();
    let mut stage: Stage =
        Pipeline::new(image_bytes.to_vec(), settings.clone(), config.clone()).into();

    loop {
        let step_start = clock.now();
        match stage.advance()? {
            Advance::Next(next) => {
                let duration = clock.elapsed(&step_start);
                if let Some(metrics) = next.metrics() {
                    stages.push(StageDiagnostics {
                        stage: next.name().to_owned(),
                        duration,
                        metrics,
                    });
                }
                stage = next;
            }
            Advance::Complete(done) => {
                stage = done;
                break;
            }
        }
    }

    let result = stage.complete()?;
    let total_duration = clock.elapsed(&start);
    let summary = PipelineSummary {
        image_width: result.dimensions.width,
        image_height: result.dimensions.height,
        working_width: result.working.width(),
        working_height: result.working.height(),
        relief_count: result.relief.len(),
        fallback: result.fallback,
        triangle_count: result.assembly.combined().triangle_count(),
        applied_scale: result.assembly.applied_scale,
    };
    Ok((
        result,
        PipelineDiagnostics {
            stages,
            total_duration,
            summary,
        },
    ))
}

impl PipelineDiagnostics {
    /// Duration of the named stage, if it ran.
    #[must_use]
    pub fn stage_duration(&self, name: &str) -> Option<Duration> {
        self.stages
            .iter()
            .find(|s| s.stage == name)
            .map(|s| s.duration)
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} (working {}x{})",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.working_width,
            self.summary.working_height,
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
        for diag in &self.stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!(
                "{:<24} {ms:>8.3}ms {pct:>9.1}%  {details}",
                diag.stage
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Relief polygons: {}  |  Triangles: {}  |  Scale: {:.5} mm/px{}",
            self.summary.relief_count,
            self.summary.triangle_count,
            self.summary.applied_scale,
            if self.summary.fallback {
                "  |  rectangle fallback"
            } else {
                ""
            },
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
        StageMetrics::Resample {
            width,
            height,
            applied,
        } => {
            if *applied {
                format!("{width}x{height}")
            } else {
                format!("{width}x{height} (unchanged)")
            }
        }
        StageMetrics::Binarize {
            threshold,
            invert,
            content_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *content_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            let inv = if *invert { " inverted" } else { "" };
            format!("threshold={threshold}{inv} content={content_pixels} ({density:.1}%)")
        }
        StageMetrics::Expand {
            radius,
            passes,
            cutoff,
            padding,
            content_before,
            content_after,
        } => format!(
            "r={radius:.1} x{passes} cutoff={cutoff} pad={padding} {content_before}->{content_after} px",
        ),
        StageMetrics::Trace {
            polygon_count,
            hole_count,
            point_count,
        } => format!("{polygon_count} polygons, {hole_count} holes, {point_count} pts"),
        StageMetrics::Select {
            candidates,
            selected_area,
            fallback,
        } => match selected_area {
            Some(area) => format!("{candidates} candidates, area={area:.0} px²"),
            None if *fallback => format!("{candidates} candidates, fallback to rectangle"),
            None => "not an outline".to_owned(),
        },
        StageMetrics::BuildSolids {
            shape,
            stamp_triangles,
            wall_triangles,
            base_triangles,
        } => format!(
            "{shape:?} stamp={stamp_triangles} wall={wall_triangles} base={base_triangles} tris",
        ),
        StageMetrics::Normalize {
            applied_scale,
            width,
            depth,
            height,
        } => format!("scale={applied_scale:.5} {width:.2}x{depth:.2}x{height:.2} mm"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            working_resolution: 96,
            expansion_radius: 3.0,
            ..PipelineConfig::default()
        }
    }

    fn disc_png() -> Vec<u8> {
        let img = image::RgbaImage::from_fn(64, 64, |x, y| {
            let (dx, dy) = (f64::from(x) - 32.0, f64::from(y) - 32.0);
            if dx.hypot(dy) < 20.0 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn outline_run_records_every_stage() {
        let clock = TickClock(Cell::new(0));
        let (result, diag) = generate_with_diagnostics(
            &disc_png(),
            &CutterSettings::default(),
            &small_config(),
            &clock,
        )
        .unwrap();
        let names: Vec<&str> = diag.stages.iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(
            names,
            [
                "decode",
                "resample",
                "binarize",
                "expand",
                "trace_silhouette",
                "select",
                "trace_relief",
                "build_solids",
                "normalize",
            ]
        );
        assert!(!result.fallback);
        assert!(diag.stage_duration("expand").is_some());
        assert!(diag.total_duration >= Duration::from_millis(9));
    }

    #[test]
    fn primitive_run_skips_expansion() {
        let clock = TickClock(Cell::new(0));
        let settings = CutterSettings {
            shape: ShapeKind::Circle,
            ..CutterSettings::default()
        };
        let (_, diag) =
            generate_with_diagnostics(&disc_png(), &settings, &small_config(), &clock).unwrap();
        assert!(diag.stage_duration("expand").is_none());
        assert!(diag.stage_duration("trace_silhouette").is_none());
        assert!(diag.stage_duration("trace_relief").is_some());
    }

    #[test]
    fn report_lists_stages() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) = generate_with_diagnostics(
            &disc_png(),
            &CutterSettings::default(),
            &small_config(),
            &clock,
        )
        .unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("trace_relief"));
        assert!(report.contains("build_solids"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let diag = StageDiagnostics {
            stage: "decode".to_owned(),
            duration: Duration::from_millis(1500),
            metrics: StageMetrics::Resample {
                width: 10,
                height: 10,
                applied: false,
            },
        };
        let json = serde_json::to_value(&diag).unwrap();
        assert!((json["duration"].as_f64().unwrap() - 1.5).abs() < 1e-12);
        let back: StageDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }
}
