//! Shared types for the stampcut pipeline.

use geo::{Area, BoundingRect, Centroid};
use serde::{Deserialize, Serialize};

use crate::trace::TracerConfig;

/// Re-export `RgbaImage` so downstream crates can reference the
/// working raster without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in tracing space (pixels, origin top-left, +Y down) or in
/// physical space (millimeters, origin at the assembly center, +Y up).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Move this point toward `center` so its distance shrinks by `factor`.
    ///
    /// A factor of 1.0 leaves the point unchanged, 0.0 collapses it onto
    /// `center`.
    #[must_use]
    pub fn scaled_toward(self, center: Self, factor: f64) -> Self {
        Self::new(
            (self.x - center.x).mul_add(factor, center.x),
            (self.y - center.y).mul_add(factor, center.y),
        )
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<geo::Coord<f64>> for Point {
    fn from(c: geo::Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

/// Orientation of a closed contour.
///
/// Defined by the sign of the shoelace area in the contour's own
/// coordinates: counter-clockwise is positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winding {
    /// Positive signed area. Used for outer boundaries.
    CounterClockwise,
    /// Negative signed area. Used for holes.
    Clockwise,
}

impl Winding {
    /// The opposite orientation.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::CounterClockwise => Self::Clockwise,
            Self::Clockwise => Self::CounterClockwise,
        }
    }
}

/// An ordered, closed ring of 2D points.
///
/// The closing edge from the last point back to the first is implicit:
/// the point list never repeats its first point at the end. Construction
/// drops consecutive duplicates and exactly collinear vertices so every
/// stored vertex is a real corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a contour from a point list, closing it if needed.
    #[must_use]
    pub fn new(points: Vec<Point>) -> Self {
        Self(clean_ring(points))
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of distinct vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all vertices (without the closing repeat).
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the contour and returns the underlying vertices.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// A contour needs at least three corners and non-zero area to
    /// bound a region.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0.len() >= 3 && self.signed_area().abs() > f64::EPSILON
    }

    /// Shoelace area; positive for counter-clockwise rings.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        self.to_geo_polygon().signed_area()
    }

    /// Area regardless of orientation.
    #[must_use]
    pub fn unsigned_area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Orientation of the ring, or `None` for degenerate (zero-area) rings.
    #[must_use]
    pub fn winding(&self) -> Option<Winding> {
        let area = self.signed_area();
        if area > 0.0 {
            Some(Winding::CounterClockwise)
        } else if area < 0.0 {
            Some(Winding::Clockwise)
        } else {
            None
        }
    }

    /// Return this contour reoriented to `winding`.
    ///
    /// Degenerate rings are returned unchanged.
    #[must_use]
    pub fn with_winding(mut self, winding: Winding) -> Self {
        if self.winding() == Some(winding.reversed()) {
            self.0.reverse();
        }
        self
    }

    /// Length of the closed ring, including the closing edge.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        let n = self.0.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.0[i].distance(self.0[(i + 1) % n]))
            .sum()
    }

    /// Area centroid of the enclosed region.
    ///
    /// Falls back to the vertex mean for zero-area rings; `None` only for
    /// an empty contour.
    #[must_use]
    pub fn centroid(&self) -> Option<Point> {
        if self.0.is_empty() {
            return None;
        }
        if self.is_valid()
            && let Some(c) = self.to_geo_polygon().centroid()
        {
            return Some(Point::new(c.x(), c.y()));
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.0.len() as f64;
        let (sx, sy) = self
            .0
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }

    /// Axis-aligned bounding rectangle, `None` when empty.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<geo::Rect<f64>> {
        self.to_line_string().bounding_rect()
    }

    /// Every vertex moved toward `center` by `factor`.
    #[must_use]
    pub fn scaled_toward(&self, center: Point, factor: f64) -> Self {
        Self::new(
            self.0
                .iter()
                .map(|p| p.scaled_toward(center, factor))
                .collect(),
        )
    }

    /// Every vertex offset by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self(
            self.0
                .iter()
                .map(|p| Point::new(p.x + dx, p.y + dy))
                .collect(),
        )
    }

    /// Closed `geo::LineString` (first point repeated at the end).
    #[must_use]
    pub fn to_line_string(&self) -> geo::LineString<f64> {
        let mut coords: Vec<geo::Coord<f64>> = self.0.iter().map(|&p| p.into()).collect();
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
        geo::LineString::new(coords)
    }

    fn to_geo_polygon(&self) -> geo::Polygon<f64> {
        geo::Polygon::new(self.to_line_string(), Vec::new())
    }
}

/// An outer contour with zero or more holes.
///
/// The outer ring is always counter-clockwise and every hole clockwise;
/// [`Polygon::new`] enforces this regardless of the input orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    outer: Contour,
    holes: Vec<Contour>,
}

impl Polygon {
    /// Create a polygon, reorienting rings to the canonical winding.
    #[must_use]
    pub fn new(outer: Contour, holes: Vec<Contour>) -> Self {
        Self {
            outer: outer.with_winding(Winding::CounterClockwise),
            holes: holes
                .into_iter()
                .map(|h| h.with_winding(Winding::Clockwise))
                .collect(),
        }
    }

    /// A polygon with no holes.
    #[must_use]
    pub fn solid(outer: Contour) -> Self {
        Self::new(outer, Vec::new())
    }

    /// The outer boundary.
    #[must_use]
    pub const fn outer(&self) -> &Contour {
        &self.outer
    }

    /// The holes, each wound opposite to the outer boundary.
    #[must_use]
    pub fn holes(&self) -> &[Contour] {
        &self.holes
    }

    /// Outer boundary followed by every hole.
    pub fn rings(&self) -> impl Iterator<Item = &Contour> {
        std::iter::once(&self.outer).chain(&self.holes)
    }

    /// Unsigned area of the outer boundary alone.
    #[must_use]
    pub fn outer_area(&self) -> f64 {
        self.outer.unsigned_area()
    }

    /// Enclosed area: outer minus holes.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.to_geo().unsigned_area()
    }

    /// Axis-aligned bounding rectangle of the outer boundary.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<geo::Rect<f64>> {
        self.outer.bounding_rect()
    }

    /// Every ring offset by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            outer: self.outer.translated(dx, dy),
            holes: self.holes.iter().map(|h| h.translated(dx, dy)).collect(),
        }
    }

    /// Convert to a `geo::Polygon` with closed rings.
    #[must_use]
    pub fn to_geo(&self) -> geo::Polygon<f64> {
        geo::Polygon::new(
            self.outer.to_line_string(),
            self.holes.iter().map(Contour::to_line_string).collect(),
        )
    }
}

/// Drop a trailing closing repeat, consecutive duplicates, and vertices
/// lying exactly on the line through their neighbours.
fn clean_ring(points: Vec<Point>) -> Vec<Point> {
    let mut ring: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if ring.last() != Some(&p) {
            ring.push(p);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }

    // Repeat until stable: removing one vertex can make its neighbour
    // collinear.
    loop {
        let n = ring.len();
        if n < 3 {
            return ring;
        }
        let before = n;
        let mut kept = Vec::with_capacity(n);
        for i in 0..n {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let cross = (cur.x - prev.x).mul_add(next.y - prev.y, -((cur.y - prev.y) * (next.x - prev.x)));
            let scale = prev.distance(cur) * prev.distance(next);
            if cross.abs() > scale * 1e-12 {
                kept.push(cur);
            }
        }
        ring = kept;
        if ring.len() == before {
            return ring;
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Footprint shape of the base plate and cutting wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShapeKind {
    /// `width × height` rectangle.
    Rectangle,
    /// Disc of diameter `width`.
    Circle,
    /// The expanded silhouette traced from the image.
    #[default]
    Outline,
}

/// User-facing physical parameters for one generation request.
///
/// All lengths are millimeters. Treated as an immutable snapshot: the
/// pipeline never reads settings from anywhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutterSettings {
    /// Requested footprint width.
    pub width: f64,
    /// Requested footprint height (rectangle shape only).
    pub height: f64,
    /// Thickness of the base plate.
    pub base_thickness: f64,
    /// Height of the relief above the base plate.
    pub detail_height: f64,
    /// Radial thickness of the cutting wall.
    pub frame_thickness: f64,
    /// Height of the cutting wall above the base plate.
    pub frame_height: f64,
    /// Luminance below which a pixel counts as content (0-255).
    pub threshold: u8,
    /// Swap content and background.
    pub invert: bool,
    /// Footprint shape.
    pub shape: ShapeKind,
}

impl CutterSettings {
    /// Default footprint width (mm).
    pub const DEFAULT_WIDTH: f64 = 80.0;
    /// Default footprint height (mm).
    pub const DEFAULT_HEIGHT: f64 = 80.0;
    /// Default base plate thickness (mm).
    pub const DEFAULT_BASE_THICKNESS: f64 = 2.0;
    /// Default relief height (mm).
    pub const DEFAULT_DETAIL_HEIGHT: f64 = 1.5;
    /// Default wall thickness (mm).
    pub const DEFAULT_FRAME_THICKNESS: f64 = 1.2;
    /// Default wall height above the base (mm).
    pub const DEFAULT_FRAME_HEIGHT: f64 = 12.0;
    /// Default binarization threshold.
    pub const DEFAULT_THRESHOLD: u8 = 200;

    /// Height of the wall solid from the bottom of the base plate.
    #[must_use]
    pub fn wall_total_height(&self) -> f64 {
        self.frame_height + self.base_thickness
    }

    /// Check the physical dimensions are usable.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] when a length is
    /// non-finite or not strictly positive.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let lengths = [
            ("width", self.width),
            ("height", self.height),
            ("base_thickness", self.base_thickness),
            ("detail_height", self.detail_height),
            ("frame_thickness", self.frame_thickness),
            ("frame_height", self.frame_height),
        ];
        for (name, value) in lengths {
            if !value.is_finite() || value <= 0.0 {
                return Err(PipelineError::InvalidSettings(format!(
                    "{name} must be a positive length, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for CutterSettings {
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            base_thickness: Self::DEFAULT_BASE_THICKNESS,
            detail_height: Self::DEFAULT_DETAIL_HEIGHT,
            frame_thickness: Self::DEFAULT_FRAME_THICKNESS,
            frame_height: Self::DEFAULT_FRAME_HEIGHT,
            threshold: Self::DEFAULT_THRESHOLD,
            invert: false,
            shape: ShapeKind::default(),
        }
    }
}

/// Internal tuning knobs for the raster stages.
///
/// Not user-facing: these trade trace fidelity against speed and are
/// tuned together (the expansion radius is only meaningful relative to
/// the working resolution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Width in pixels the source is resampled to before any pixel work.
    pub working_resolution: u32,
    /// Blur radius (Gaussian sigma) of the silhouette expansion, in
    /// working-resolution pixels.
    pub expansion_radius: f32,
    /// How many times the blurred coverage is stacked before the cutoff.
    pub expansion_passes: u32,
    /// Luminance below which a blurred pixel counts as inside (0-255).
    pub expansion_cutoff: u8,
    /// Tracer settings for the single smooth silhouette blob.
    pub silhouette_tracer: TracerConfig,
    /// Tracer settings for the relief detail contours.
    pub relief_tracer: TracerConfig,
}

impl PipelineConfig {
    /// Default working resolution in pixels.
    pub const DEFAULT_WORKING_RESOLUTION: u32 = 1024;
    /// Default expansion radius in working-resolution pixels.
    pub const DEFAULT_EXPANSION_RADIUS: f32 = 30.0;
    /// Default number of stacked blur passes.
    pub const DEFAULT_EXPANSION_PASSES: u32 = 3;
    /// Default post-blur cutoff.
    pub const DEFAULT_EXPANSION_CUTOFF: u8 = 240;
    /// Largest accepted expansion radius in working-resolution pixels.
    pub const MAX_EXPANSION_RADIUS: f32 = 512.0;

    /// Check the tuning is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a zero working
    /// resolution or an expansion radius that is non-finite, negative,
    /// or above [`Self::MAX_EXPANSION_RADIUS`].
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.working_resolution == 0 {
            return Err(PipelineError::InvalidConfig(
                "working_resolution must be at least 1".to_string(),
            ));
        }
        let radius = self.expansion_radius;
        if !radius.is_finite() || !(0.0..=Self::MAX_EXPANSION_RADIUS).contains(&radius) {
            return Err(PipelineError::InvalidConfig(format!(
                "expansion_radius must be in 0..={}, got {radius}",
                Self::MAX_EXPANSION_RADIUS
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_resolution: Self::DEFAULT_WORKING_RESOLUTION,
            expansion_radius: Self::DEFAULT_EXPANSION_RADIUS,
            expansion_passes: Self::DEFAULT_EXPANSION_PASSES,
            expansion_cutoff: Self::DEFAULT_EXPANSION_CUTOFF,
            silhouette_tracer: TracerConfig::SILHOUETTE,
            relief_tracer: TracerConfig::RELIEF,
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Absent geometry is not an error: empty relief sets and degenerate
/// extrusions yield an empty [`SolidMesh`](crate::SolidMesh).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    InvalidImage(#[from] image::ImageError),

    /// Cutter settings are out of range.
    #[error("invalid cutter settings: {0}")]
    InvalidSettings(String),

    /// Pipeline tuning is out of range.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The silhouette pass traced no closed contour.
    #[error("no contour found in the image")]
    NoContourFound,
}
