//! Layout normalization: mirror, scale, and center the built parts.
//!
//! Tracing space has its origin top-left with Y down; solid space has Y
//! up. Every part built from traced contours is mirrored across the XZ
//! plane exactly once, before scaling. Scale is applied in the XY plane
//! only: heights are already in millimeters.

use nalgebra::Vector3;

use crate::mesh::{Aabb, SolidMesh};
use crate::solid::CutterSolids;
use crate::types::{CutterSettings, ShapeKind};

/// Fraction of each footprint axis the relief may occupy on a primitive
/// cutter (a 5% margin).
pub const FOOTPRINT_FILL: f64 = 0.95;

/// The finished cutter, in millimeters, centered on the origin in XY.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyResult {
    /// Relief imprint face.
    pub stamp: SolidMesh,
    /// Cutting wall.
    pub wall: SolidMesh,
    /// Base plate.
    pub base: SolidMesh,
    /// Planar scale applied to the traced geometry (millimeters per
    /// working pixel).
    pub applied_scale: f64,
}

impl AssemblyResult {
    /// All non-empty parts merged into one mesh, for export.
    #[must_use]
    pub fn combined(&self) -> SolidMesh {
        SolidMesh::merge([&self.stamp, &self.wall, &self.base])
    }

    /// Bounds of every non-empty part, `None` if all are empty.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        [&self.stamp, &self.wall, &self.base]
            .into_iter()
            .filter_map(SolidMesh::bounds)
            .reduce(|a, b| a.union(&b))
    }
}

/// Place the parts built for `settings.shape`.
///
/// Outline cutters scale all three parts together so the wall's width is
/// exactly `settings.width`. Primitive cutters are already in
/// millimeters; only the relief is mirrored and fit inside the footprint.
/// An outline request whose wall is empty is laid out as a rectangle.
#[must_use]
pub fn normalize(solids: CutterSolids, settings: &CutterSettings) -> AssemblyResult {
    let result = match settings.shape {
        ShapeKind::Outline if !solids.wall.is_empty() => normalize_outline(solids, settings),
        ShapeKind::Outline => normalize_primitive(solids, ShapeKind::Rectangle, settings),
        shape => normalize_primitive(solids, shape, settings),
    };
    tracing::debug!(
        applied_scale = result.applied_scale,
        width = result.bounds().map(|b| b.width()),
        "normalized layout"
    );
    result
}

fn normalize_outline(solids: CutterSolids, settings: &CutterSettings) -> AssemblyResult {
    let CutterSolids { stamp, wall, base } = solids;
    let (stamp, wall, base) = (stamp.mirrored_y(), wall.mirrored_y(), base.mirrored_y());

    let scale = wall
        .bounds()
        .map(|b| b.width())
        .filter(|w| *w > 0.0)
        .map_or(1.0, |w| settings.width / w);
    let (stamp, wall, base) = (
        stamp.scaled_planar(scale),
        wall.scaled_planar(scale),
        base.scaled_planar(scale),
    );

    let offset = wall.bounds().map_or_else(Vector3::zeros, |b| {
        let c = b.center();
        Vector3::new(-c.x, -c.y, 0.0)
    });
    AssemblyResult {
        stamp: stamp.translated(offset),
        wall: wall.translated(offset),
        base: base.translated(offset),
        applied_scale: scale,
    }
}

fn normalize_primitive(
    solids: CutterSolids,
    shape: ShapeKind,
    settings: &CutterSettings,
) -> AssemblyResult {
    let CutterSolids { stamp, wall, base } = solids;
    let stamp = stamp.mirrored_y();
    let Some(bounds) = stamp.bounds() else {
        return AssemblyResult {
            stamp,
            wall,
            base,
            applied_scale: 1.0,
        };
    };

    let scale = fit_scale(&bounds, shape, settings);
    let stamp = stamp.scaled_planar(scale);
    let offset = stamp.bounds().map_or_else(Vector3::zeros, |b| {
        let c = b.center();
        Vector3::new(-c.x, -c.y, 0.0)
    });
    AssemblyResult {
        stamp: stamp.translated(offset),
        wall,
        base,
        applied_scale: scale,
    }
}

/// Uniform scale fitting `bounds` inside the footprint less the margin.
///
/// Rectangles fit each axis independently; circles fit the box's
/// diagonal to the diameter so every corner lands inside the disc.
fn fit_scale(bounds: &Aabb, shape: ShapeKind, settings: &CutterSettings) -> f64 {
    let ratio = |available: f64, extent: f64| {
        if extent > 0.0 {
            available / extent
        } else {
            f64::INFINITY
        }
    };
    let scale = match shape {
        ShapeKind::Circle => ratio(
            FOOTPRINT_FILL * settings.width,
            bounds.width().hypot(bounds.depth()),
        ),
        ShapeKind::Rectangle | ShapeKind::Outline => ratio(
            FOOTPRINT_FILL * settings.width,
            bounds.width(),
        )
        .min(ratio(FOOTPRINT_FILL * settings.height, bounds.depth())),
    };
    if scale.is_finite() { scale } else { 1.0 }
}
