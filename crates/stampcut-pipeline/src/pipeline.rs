//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::generate`] which runs everything in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use stampcut_pipeline::{CutterSettings, Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(png, CutterSettings::default(), PipelineConfig::default())
//!     .decode()?
//!     .resample()
//!     .binarize()
//!     .expand()
//!     .trace_silhouette()
//!     .select()
//!     .trace_relief()
//!     .build_solids()
//!     .normalize()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying every earlier intermediate. Only decoding is fallible: a
//! silhouette pass that finds nothing is recovered in [`SilhouetteTraced::select`]
//! by falling back to a rectangle cutter.
//!
//! The stepwise form is also what the epoch runner uses to yield between
//! stages (see [`crate::epoch`]).

use image::RgbaImage;

use crate::diagnostics::StageMetrics;
use crate::expand::Expansion;
use crate::layout::AssemblyResult;
use crate::mask::BinaryMask;
use crate::select::{full_set, largest_area};
use crate::solid::CutterSolids;
use crate::trace::trace;
use crate::types::{CutterSettings, Dimensions, PipelineConfig, PipelineError, Polygon, ShapeKind};

/// Every intermediate artifact of one generation.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Source image dimensions.
    pub dimensions: Dimensions,
    /// Source resampled to working resolution.
    pub working: RgbaImage,
    /// Content/background classification of `working`.
    pub mask: BinaryMask,
    /// Expanded silhouette mask; `None` for primitive shapes.
    pub expansion: Option<Expansion>,
    /// Selected silhouette in working-image pixels; `None` for primitive
    /// shapes or when the fallback fired.
    pub silhouette: Option<Polygon>,
    /// Relief contours in working-image pixels.
    pub relief: Vec<Polygon>,
    /// Whether an outline request fell back to a rectangle cutter.
    pub fallback: bool,
    /// Footprint shape actually built.
    pub shape: ShapeKind,
    /// The finished cutter.
    pub assembly: AssemblyResult,
}

fn polygon_counts(polygons: &[Polygon]) -> StageMetrics {
    StageMetrics::Trace {
        polygon_count: polygons.len(),
        hole_count: polygons.iter().map(|p| p.holes().len()).sum(),
        point_count: polygons
            .iter()
            .flat_map(Polygon::rings)
            .map(crate::types::Contour::len)
            .sum(),
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    settings: CutterSettings,
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the settings and tuning, decode the source image, and
    /// advance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] for unusable lengths,
    /// [`PipelineError::InvalidConfig`] for out-of-range tuning,
    /// [`PipelineError::EmptyInput`] if the source bytes are empty, and
    /// [`PipelineError::InvalidImage`] if they do not decode.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.settings.validate()?;
        self.config.validate()?;
        let original = crate::raster::decode(&self.source)?;
        tracing::debug!(
            bytes = self.source.len(),
            width = original.width(),
            height = original.height(),
            "decoded source"
        );
        Ok(Decoded {
            settings: self.settings,
            config: self.config,
            source_len: self.source.len(),
            original,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
#[must_use = "pipeline stages are consumed by advancing; call .resample() to continue"]
pub struct Decoded {
    settings: CutterSettings,
    config: PipelineConfig,
    source_len: usize,
    original: RgbaImage,
}

impl Decoded {
    /// The decoded RGBA image.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Resample to working resolution.
    pub fn resample(self) -> Resampled {
        let working = crate::raster::resample(&self.original, self.config.working_resolution);
        Resampled {
            decoded: self,
            working,
        }
    }
}

// ───────────────────────── Stage 2: Resampled ────────────────────────

/// Pipeline state after resampling to working resolution.
#[must_use = "pipeline stages are consumed by advancing; call .binarize() to continue"]
pub struct Resampled {
    decoded: Decoded,
    working: RgbaImage,
}

impl Resampled {
    /// The working-resolution image.
    #[must_use]
    pub const fn working(&self) -> &RgbaImage {
        &self.working
    }

    /// Classify pixels into content and background.
    pub fn binarize(self) -> Binarized {
        let settings = &self.decoded.settings;
        let mask = crate::raster::binarize(&self.working, settings.threshold, settings.invert);
        tracing::debug!(content = mask.content_count(), "binarized");
        Binarized {
            resampled: self,
            mask,
        }
    }
}

// ───────────────────────── Stage 3: Binarized ────────────────────────

/// Pipeline state after thresholding.
#[must_use = "pipeline stages are consumed by advancing; call .expand() to continue"]
pub struct Binarized {
    resampled: Resampled,
    mask: BinaryMask,
}

impl Binarized {
    /// The content mask.
    #[must_use]
    pub const fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    const fn settings(&self) -> &CutterSettings {
        &self.resampled.decoded.settings
    }

    const fn config(&self) -> &PipelineConfig {
        &self.resampled.decoded.config
    }

    /// Grow the mask into the silhouette bubble. Skipped unless the
    /// requested shape is an outline.
    pub fn expand(self) -> Expanded {
        let expansion = (self.settings().shape == ShapeKind::Outline).then(|| {
            let config = self.config();
            crate::expand::expand(
                &self.mask,
                config.expansion_radius,
                config.expansion_passes,
                config.expansion_cutoff,
            )
        });
        Expanded {
            binarized: self,
            expansion,
        }
    }
}

// ───────────────────────── Stage 4: Expanded ─────────────────────────

/// Pipeline state after silhouette expansion.
#[must_use = "pipeline stages are consumed by advancing; call .trace_silhouette() to continue"]
pub struct Expanded {
    binarized: Binarized,
    expansion: Option<Expansion>,
}

impl Expanded {
    /// The expanded mask, `None` for primitive shapes.
    #[must_use]
    pub const fn expansion(&self) -> Option<&Expansion> {
        self.expansion.as_ref()
    }

    /// Trace the expanded mask with the silhouette tracer and map the
    /// result back to working-image pixels.
    pub fn trace_silhouette(self) -> SilhouetteTraced {
        let candidates = self.expansion.as_ref().map(|expansion| {
            let shift = -f64::from(expansion.offset);
            trace(
                &expansion.mask,
                &self.binarized.config().silhouette_tracer,
            )
            .iter()
            .map(|p| p.translated(shift, shift))
            .collect()
        });
        SilhouetteTraced {
            expanded: self,
            candidates,
        }
    }
}

// ───────────────────────── Stage 5: SilhouetteTraced ─────────────────

/// Pipeline state after tracing the expanded mask.
#[must_use = "pipeline stages are consumed by advancing; call .select() to continue"]
pub struct SilhouetteTraced {
    expanded: Expanded,
    candidates: Option<Vec<Polygon>>,
}

impl SilhouetteTraced {
    /// Traced silhouette candidates, `None` for primitive shapes.
    #[must_use]
    pub fn candidates(&self) -> Option<&[Polygon]> {
        self.candidates.as_deref()
    }

    /// Keep the largest candidate's outer boundary.
    ///
    /// When an outline request traced nothing, logs a warning and
    /// switches the build to a rectangle cutter.
    pub fn select(self) -> SilhouetteSelected {
        let settings = self.expanded.binarized.settings();
        let (silhouette, fallback) = match self.candidates.clone().map(largest_area) {
            None => (None, false),
            // The silhouette is one enclosing boundary: interior holes
            // are filled so the base stays solid under the relief.
            Some(Ok(silhouette)) => (Some(Polygon::solid(silhouette.outer().clone())), false),
            Some(Err(err)) => {
                tracing::warn!(%err, "falling back to rectangle cutter");
                (None, true)
            }
        };
        let shape = if fallback {
            ShapeKind::Rectangle
        } else {
            settings.shape
        };
        SilhouetteSelected {
            traced: self,
            silhouette,
            fallback,
            shape,
        }
    }
}

// ───────────────────────── Stage 6: SilhouetteSelected ───────────────

/// Pipeline state after choosing the silhouette.
#[must_use = "pipeline stages are consumed by advancing; call .trace_relief() to continue"]
pub struct SilhouetteSelected {
    traced: SilhouetteTraced,
    silhouette: Option<Polygon>,
    fallback: bool,
    shape: ShapeKind,
}

impl SilhouetteSelected {
    /// The chosen silhouette.
    #[must_use]
    pub const fn silhouette(&self) -> Option<&Polygon> {
        self.silhouette.as_ref()
    }

    /// Whether the rectangle fallback fired.
    #[must_use]
    pub const fn fallback(&self) -> bool {
        self.fallback
    }

    /// Trace the unexpanded mask with the relief tracer.
    pub fn trace_relief(self) -> ReliefTraced {
        let binarized = &self.traced.expanded.binarized;
        let relief = full_set(trace(&binarized.mask, &binarized.config().relief_tracer));
        ReliefTraced {
            selected: self,
            relief,
        }
    }
}

// ───────────────────────── Stage 7: ReliefTraced ─────────────────────

/// Pipeline state after tracing the relief contours.
#[must_use = "pipeline stages are consumed by advancing; call .build_solids() to continue"]
pub struct ReliefTraced {
    selected: SilhouetteSelected,
    relief: Vec<Polygon>,
}

impl ReliefTraced {
    /// The relief contour set.
    #[must_use]
    pub fn relief(&self) -> &[Polygon] {
        &self.relief
    }

    fn effective_settings(&self) -> CutterSettings {
        CutterSettings {
            shape: self.selected.shape,
            ..self.selected.traced.expanded.binarized.settings().clone()
        }
    }

    /// Build the stamp, wall, and base.
    pub fn build_solids(self) -> SolidsBuilt {
        let settings = self.effective_settings();
        let solids = crate::solid::build_solids(
            self.selected.silhouette.as_ref(),
            &self.relief,
            &settings,
        );
        SolidsBuilt {
            relief_traced: self,
            settings,
            solids,
        }
    }
}

// ───────────────────────── Stage 8: SolidsBuilt ──────────────────────

/// Pipeline state after solid construction, before layout.
#[must_use = "pipeline stages are consumed by advancing; call .normalize() to continue"]
pub struct SolidsBuilt {
    relief_traced: ReliefTraced,
    settings: CutterSettings,
    solids: CutterSolids,
}

impl SolidsBuilt {
    /// The unplaced parts.
    #[must_use]
    pub const fn solids(&self) -> &CutterSolids {
        &self.solids
    }

    /// Mirror, scale, and center the parts.
    pub fn normalize(self) -> Normalized {
        let assembly = crate::layout::normalize(self.solids, &self.settings);
        Normalized {
            relief_traced: self.relief_traced,
            shape: self.settings.shape,
            assembly,
        }
    }
}

// ───────────────────────── Stage 9: Normalized ───────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to take the staged result"]
pub struct Normalized {
    relief_traced: ReliefTraced,
    shape: ShapeKind,
    assembly: AssemblyResult,
}

impl Normalized {
    /// The finished cutter.
    #[must_use]
    pub const fn assembly(&self) -> &AssemblyResult {
        &self.assembly
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let ReliefTraced { selected, relief } = self.relief_traced;
        let SilhouetteSelected {
            traced,
            silhouette,
            fallback,
            ..
        } = selected;
        let Expanded {
            binarized,
            expansion,
        } = traced.expanded;
        let Binarized { resampled, mask } = binarized;
        let Resampled { decoded, working } = resampled;
        tracing::info!(
            shape = ?self.shape,
            fallback,
            relief = relief.len(),
            scale = self.assembly.applied_scale,
            "generated cutter"
        );
        StagedResult {
            dimensions: Dimensions {
                width: decoded.original.width(),
                height: decoded.original.height(),
            },
            working,
            mask,
            expansion,
            silhouette,
            relief,
            fallback,
            shape: self.shape,
            assembly: self.assembly,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 10;

/// Trait implemented by every pipeline stage, enabling uniform iteration.
pub trait PipelineStage: Sized {
    /// Name of this stage (e.g. `"source"`, `"expand"`).
    const NAME: &str;

    /// Zero-based index of this stage.
    const INDEX: usize;

    /// Metrics describing the work done to reach this state.
    ///
    /// `None` for [`Pending`] and for stages skipped by the requested
    /// shape.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage; `Ok(None)` at the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when validation or decoding fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a remaining fallible stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.decode()?.into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        let (width, height) = self.original.dimensions();
        Some(StageMetrics::Decode {
            input_bytes: self.source_len,
            width,
            height,
            pixel_count: u64::from(width) * u64::from(height),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.resample().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.resample().complete()
    }
}

impl PipelineStage for Resampled {
    const NAME: &str = "resample";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        let (width, height) = self.working.dimensions();
        Some(StageMetrics::Resample {
            width,
            height,
            applied: self.working.dimensions() != self.decoded.original.dimensions(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.binarize().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.binarize().complete()
    }
}

impl PipelineStage for Binarized {
    const NAME: &str = "binarize";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        let settings = self.settings();
        Some(StageMetrics::Binarize {
            threshold: settings.threshold,
            invert: settings.invert,
            content_pixels: self.mask.content_count(),
            total_pixels: u64::from(self.mask.width()) * u64::from(self.mask.height()),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.expand().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.expand().complete()
    }
}

impl PipelineStage for Expanded {
    const NAME: &str = "expand";
    const INDEX: usize = 4;

    fn metrics(&self) -> Option<StageMetrics> {
        let expansion = self.expansion.as_ref()?;
        let config = self.binarized.config();
        Some(StageMetrics::Expand {
            radius: config.expansion_radius,
            passes: config.expansion_passes,
            cutoff: config.expansion_cutoff,
            padding: expansion.offset,
            content_before: self.binarized.mask.content_count(),
            content_after: expansion.mask.content_count(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.trace_silhouette().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.trace_silhouette().complete()
    }
}

impl PipelineStage for SilhouetteTraced {
    const NAME: &str = "trace_silhouette";
    const INDEX: usize = 5;

    fn metrics(&self) -> Option<StageMetrics> {
        self.candidates.as_deref().map(polygon_counts)
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.select().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.select().complete()
    }
}

impl PipelineStage for SilhouetteSelected {
    const NAME: &str = "select";
    const INDEX: usize = 6;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Select {
            candidates: self.traced.candidates.as_ref().map_or(0, Vec::len),
            selected_area: self.silhouette.as_ref().map(Polygon::outer_area),
            fallback: self.fallback,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.trace_relief().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.trace_relief().complete()
    }
}

impl PipelineStage for ReliefTraced {
    const NAME: &str = "trace_relief";
    const INDEX: usize = 7;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(polygon_counts(&self.relief))
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.build_solids().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.build_solids().complete()
    }
}

impl PipelineStage for SolidsBuilt {
    const NAME: &str = "build_solids";
    const INDEX: usize = 8;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::BuildSolids {
            shape: self.settings.shape,
            stamp_triangles: self.solids.stamp.triangle_count(),
            wall_triangles: self.solids.wall.triangle_count(),
            base_triangles: self.solids.base.triangle_count(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.normalize().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.normalize().complete()
    }
}

impl PipelineStage for Normalized {
    const NAME: &str = "normalize";
    const INDEX: usize = 9;

    fn metrics(&self) -> Option<StageMetrics> {
        let bounds = self.assembly.bounds();
        Some(StageMetrics::Normalize {
            applied_scale: self.assembly.applied_scale,
            width: bounds.map_or(0.0, |b| b.width()),
            depth: bounds.map_or(0.0, |b| b.depth()),
            height: bounds.map_or(0.0, |b| b.height()),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Type-erased pipeline stage for loop-driven execution.
///
/// ```rust
/// # use stampcut_pipeline::{CutterSettings, Pipeline, PipelineConfig, PipelineError};
/// # use stampcut_pipeline::pipeline::{Advance, Stage};
/// # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
/// let mut stage: Stage =
///     Pipeline::new(png, CutterSettings::default(), PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Decoded`].
    Decoded(Decoded),
    /// See [`Resampled`].
    Resampled(Resampled),
    /// See [`Binarized`].
    Binarized(Binarized),
    /// See [`Expanded`].
    Expanded(Expanded),
    /// See [`SilhouetteTraced`].
    SilhouetteTraced(SilhouetteTraced),
    /// See [`SilhouetteSelected`].
    SilhouetteSelected(SilhouetteSelected),
    /// See [`ReliefTraced`].
    ReliefTraced(ReliefTraced),
    /// See [`SolidsBuilt`].
    SolidsBuilt(SolidsBuilt),
    /// See [`Normalized`].
    Normalized(Normalized),
}

/// Compile-time guard: adding a [`Stage`] variant breaks this match,
/// a reminder to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Decoded(_)
        | Stage::Resampled(_)
        | Stage::Binarized(_)
        | Stage::Expanded(_)
        | Stage::SilhouetteTraced(_)
        | Stage::SilhouetteSelected(_)
        | Stage::ReliefTraced(_)
        | Stage::SolidsBuilt(_)
        | Stage::Normalized(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Decoded(s) => s.$method($($arg),*),
            Self::Resampled(s) => s.$method($($arg),*),
            Self::Binarized(s) => s.$method($($arg),*),
            Self::Expanded(s) => s.$method($($arg),*),
            Self::SilhouetteTraced(s) => s.$method($($arg),*),
            Self::SilhouetteSelected(s) => s.$method($($arg),*),
            Self::ReliefTraced(s) => s.$method($($arg),*),
            Self::SolidsBuilt(s) => s.$method($($arg),*),
            Self::Normalized(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Normalized(_))
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if already
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        // Only the final stage returns Ok(None) from next().
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// The trait's associated constants aren't reachable through `self`, so
// the delegate macro calls these instead.
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

macro_rules! stage_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Stage {
                fn from(s: $variant) -> Self {
                    Self::$variant(s)
                }
            }
        )*
    };
}

stage_from!(
    Pending,
    Decoded,
    Resampled,
    Binarized,
    Expanded,
    SilhouetteTraced,
    SilhouetteSelected,
    ReliefTraced,
    SolidsBuilt,
    Normalized,
);

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental cutter generation pipeline.
///
/// Created via [`Pipeline::new`], which stores the source image, the
/// settings snapshot, and the tuning config without doing any work.
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline. No processing is performed.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(
        image_bytes: Vec<u8>,
        settings: CutterSettings,
        config: PipelineConfig,
    ) -> Pending {
        Pending {
            settings,
            config,
            source: image_bytes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            working_resolution: 128,
            expansion_radius: 4.0,
            ..PipelineConfig::default()
        }
    }

    /// Black square on white with a white square window.
    fn framed_square_png() -> Vec<u8> {
        let img = image::RgbaImage::from_fn(64, 64, |x, y| {
            let outer = (12..52).contains(&x) && (12..52).contains(&y);
            let window = (26..38).contains(&x) && (26..38).contains(&y);
            if outer && !window {
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

    fn pending(settings: CutterSettings) -> Pending {
        Pipeline::new(framed_square_png(), settings, small_config())
    }

    #[test]
    fn pending_exposes_source_bytes() {
        let png = framed_square_png();
        let p = Pipeline::new(png.clone(), CutterSettings::default(), small_config());
        assert_eq!(p.source(), png.as_slice());
    }

    #[test]
    fn decode_rejects_empty_and_corrupt_input() {
        let empty = Pipeline::new(vec![], CutterSettings::default(), small_config()).decode();
        assert!(matches!(empty, Err(PipelineError::EmptyInput)));
        let corrupt =
            Pipeline::new(vec![0xFF, 0x00], CutterSettings::default(), small_config()).decode();
        assert!(matches!(corrupt, Err(PipelineError::InvalidImage(_))));
    }

    #[test]
    fn decode_validates_settings_first() {
        let settings = CutterSettings {
            width: -1.0,
            ..CutterSettings::default()
        };
        assert!(matches!(
            pending(settings).decode(),
            Err(PipelineError::InvalidSettings(_))
        ));
    }

    #[test]
    fn decode_rejects_oversized_expansion_radius() {
        let config = PipelineConfig {
            expansion_radius: f32::MAX,
            ..small_config()
        };
        let result =
            Pipeline::new(framed_square_png(), CutterSettings::default(), config).decode();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn resample_reaches_working_width() {
        let resampled = pending(CutterSettings::default())
            .decode()
            .unwrap()
            .resample();
        assert_eq!(resampled.working().dimensions(), (128, 128));
    }

    #[test]
    fn primitive_shape_skips_expansion() {
        let settings = CutterSettings {
            shape: ShapeKind::Rectangle,
            ..CutterSettings::default()
        };
        let traced = pending(settings)
            .decode()
            .unwrap()
            .resample()
            .binarize()
            .expand()
            .trace_silhouette();
        assert!(traced.candidates().is_none());
        let selected = traced.select();
        assert!(selected.silhouette().is_none());
        assert!(!selected.fallback());
    }

    #[test]
    fn outline_silhouette_is_in_working_frame() {
        let selected = pending(CutterSettings::default())
            .decode()
            .unwrap()
            .resample()
            .binarize()
            .expand()
            .trace_silhouette()
            .select();
        let silhouette = selected.silhouette().unwrap();
        let rect = silhouette.bounding_rect().unwrap();
        // The square spans 24..104 in working pixels; the bubble grows
        // past it on every side but stays near the frame.
        assert!(rect.min().x < 24.0 && rect.min().x > -8.0);
        assert!(rect.max().x > 104.0 && rect.max().x < 136.0);
        // The window's leftover hole is too short for the silhouette tracer.
        assert!(silhouette.holes().is_empty());
    }

    #[test]
    fn relief_keeps_window_as_hole() {
        let traced = pending(CutterSettings::default())
            .decode()
            .unwrap()
            .resample()
            .binarize()
            .expand()
            .trace_silhouette()
            .select()
            .trace_relief();
        assert_eq!(traced.relief().len(), 1);
        assert_eq!(traced.relief()[0].holes().len(), 1);
    }

    #[test]
    fn stage_loop_matches_typed_chain() {
        let mut stage: Stage = pending(CutterSettings::default()).into();
        let mut seen = vec![stage.index()];
        loop {
            match stage.advance().unwrap() {
                Advance::Next(next) => {
                    seen.push(next.index());
                    stage = next;
                }
                Advance::Complete(done) => {
                    stage = done;
                    break;
                }
            }
        }
        assert_eq!(seen, (0..STAGE_COUNT).collect::<Vec<_>>());
        assert_eq!(stage.name(), "normalize");
        let looped = stage.complete().unwrap();

        let chained = pending(CutterSettings::default()).complete().unwrap();
        assert_eq!(looped.assembly, chained.assembly);
    }

    #[test]
    fn into_result_carries_intermediates() {
        let result = pending(CutterSettings::default()).complete().unwrap();
        assert_eq!(result.dimensions, Dimensions { width: 64, height: 64 });
        assert_eq!(result.mask.dimensions().width, 128);
        assert!(result.expansion.is_some());
        assert!(result.silhouette.is_some());
        assert_eq!(result.shape, ShapeKind::Outline);
        assert!(!result.assembly.wall.is_empty());
    }
}
