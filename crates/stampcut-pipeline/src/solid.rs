//! Solid construction: relief stamp, base plate, and cutting wall.
//!
//! Every builder is a pure function of its contours and the
//! [`CutterSettings`] snapshot. The three parts share one frame: the top
//! of the base plate is z = 0, the relief rises from it, and the base and
//! wall both bottom out at `-base_thickness`.
//!
//! Outline parts are built in tracing space (pixels) and scaled later by
//! [`crate::layout`]. Rectangle and circle parts are built in millimeters
//! centered on the origin.

use std::f64::consts::TAU;

use geo::{Area, BooleanOps, Buffer, Contains};
use nalgebra::Vector3;

use crate::extrude::extrude;
use crate::mesh::SolidMesh;
use crate::types::{Contour, CutterSettings, Point, Polygon, ShapeKind};

/// Radial segments used for circular footprints.
pub const CIRCLE_SEGMENTS: usize = 96;

/// Lower bound on the wall's inner hole scale.
pub const MIN_HOLE_SCALE: f64 = 0.5;

/// Share of `frame_thickness` kept as the thinnest outline wall where
/// the scaled hole would otherwise reach the outline.
pub const MIN_WALL_FRACTION: f64 = 0.5;

/// The three parts of a cutter before layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutterSolids {
    /// Relief imprint face.
    pub stamp: SolidMesh,
    /// Cutting wall.
    pub wall: SolidMesh,
    /// Base plate.
    pub base: SolidMesh,
}

/// Scale applied to an outline wall's outer ring to carve its hole:
/// `max(0.5, 1 - 2 * frame_thickness / width)`.
#[must_use]
pub fn hole_scale(frame_thickness: f64, width: f64) -> f64 {
    // f64::max discards a NaN operand.
    (1.0 - 2.0 * frame_thickness / width).max(MIN_HOLE_SCALE)
}

/// Counter-clockwise `width × height` rectangle centered on the origin.
#[must_use]
pub fn rectangle(width: f64, height: f64) -> Contour {
    let (hw, hh) = (width / 2.0, height / 2.0);
    Contour::new(vec![
        Point::new(-hw, -hh),
        Point::new(hw, -hh),
        Point::new(hw, hh),
        Point::new(-hw, hh),
    ])
}

/// Counter-clockwise regular polygon approximating a circle centered on
/// the origin.
#[must_use]
pub fn circle(radius: f64, segments: usize) -> Contour {
    let segments = segments.max(3);
    #[allow(clippy::cast_precision_loss)]
    let step = TAU / segments as f64;
    Contour::new(
        (0..segments)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let angle = step * i as f64;
                Point::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect(),
    )
}

/// Footprint of a primitive base, centered on the origin.
fn primitive_footprint(shape: ShapeKind, settings: &CutterSettings) -> Contour {
    match shape {
        ShapeKind::Circle => circle(settings.width / 2.0, CIRCLE_SEGMENTS),
        ShapeKind::Rectangle | ShapeKind::Outline => rectangle(settings.width, settings.height),
    }
}

/// Footprint grown outward by `frame_thickness`, centered on the origin.
fn primitive_wall_outer(shape: ShapeKind, settings: &CutterSettings) -> Contour {
    let t = settings.frame_thickness;
    match shape {
        ShapeKind::Circle => circle(settings.width / 2.0 + t, CIRCLE_SEGMENTS),
        ShapeKind::Rectangle | ShapeKind::Outline => {
            rectangle(settings.width + 2.0 * t, settings.height + 2.0 * t)
        }
    }
}

fn drop_below_zero(mesh: SolidMesh, settings: &CutterSettings) -> SolidMesh {
    mesh.translated(Vector3::new(0.0, 0.0, -settings.base_thickness))
}

/// Extrude the relief contour set by `detail_height` from z = 0.
///
/// An empty set gives an empty mesh.
#[must_use]
pub fn build_relief(relief: &[Polygon], settings: &CutterSettings) -> SolidMesh {
    extrude(relief, settings.detail_height)
}

/// Build the base plate with its top face at z = 0.
///
/// An outline shape without a silhouette falls back to the rectangle.
#[must_use]
pub fn build_base(silhouette: Option<&Polygon>, settings: &CutterSettings) -> SolidMesh {
    let footprint = match (settings.shape, silhouette) {
        (ShapeKind::Outline, Some(silhouette)) => silhouette.clone(),
        (ShapeKind::Outline, None) => {
            Polygon::solid(primitive_footprint(ShapeKind::Rectangle, settings))
        }
        (shape, _) => Polygon::solid(primitive_footprint(shape, settings)),
    };
    drop_below_zero(
        extrude(std::slice::from_ref(&footprint), settings.base_thickness),
        settings,
    )
}

/// Build the cutting wall, `frame_height + base_thickness` tall, with its
/// bottom flush with the bottom of the base plate.
///
/// For an outline the hole is the silhouette's outer ring shrunk toward
/// its centroid by [`hole_scale`], clipped so the wall is never thinner
/// than [`MIN_WALL_FRACTION`] of `frame_thickness`. An outline too thin
/// to hold a hole gives an empty mesh. For primitives the hole matches
/// the base footprint exactly.
#[must_use]
pub fn build_wall(silhouette: Option<&Polygon>, settings: &CutterSettings) -> SolidMesh {
    let profile = match (settings.shape, silhouette) {
        (ShapeKind::Outline, Some(silhouette)) => outline_wall_profile(silhouette, settings),
        (ShapeKind::Outline, None) => Some(primitive_wall_profile(ShapeKind::Rectangle, settings)),
        (shape, _) => Some(primitive_wall_profile(shape, settings)),
    };
    let Some(profile) = profile else {
        return SolidMesh::empty();
    };
    drop_below_zero(
        extrude(std::slice::from_ref(&profile), settings.wall_total_height()),
        settings,
    )
}

fn outline_wall_profile(silhouette: &Polygon, settings: &CutterSettings) -> Option<Polygon> {
    let outer = silhouette.outer();
    let center = outer.centroid()?;
    let span = outer.bounding_rect()?.width();
    let scale = hole_scale(settings.frame_thickness, settings.width);
    let scaled = outer.scaled_toward(center, scale);

    // Layout maps the outline's width to `settings.width`, so this is the
    // thinnest wall allowed, in tracing pixels.
    let min_wall = MIN_WALL_FRACTION * settings.frame_thickness * span / settings.width;
    let inset = Polygon::solid(outer.clone()).to_geo().buffer(-min_wall);

    // In concavities the scaled ring crosses the outline; clip it to the
    // inset and keep the largest piece.
    let scaled_geo = Polygon::solid(scaled.clone()).to_geo();
    let hole = if inset.contains(&scaled_geo) {
        Some(scaled)
    } else {
        scaled_geo
            .intersection(&inset)
            .into_iter()
            .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
            .map(|piece| Contour::new(piece.exterior().coords().map(|&c| Point::from(c)).collect()))
    };
    let Some(hole) = hole.filter(Contour::is_valid) else {
        tracing::debug!(min_wall, "outline too thin to carve a wall hole");
        return None;
    };
    tracing::debug!(
        scale,
        min_wall,
        hole_area = hole.unsigned_area(),
        center_x = center.x,
        center_y = center.y,
        "outline wall hole"
    );
    Some(Polygon::new(outer.clone(), vec![hole]))
}

fn primitive_wall_profile(shape: ShapeKind, settings: &CutterSettings) -> Polygon {
    Polygon::new(
        primitive_wall_outer(shape, settings),
        vec![primitive_footprint(shape, settings)],
    )
}

/// Build all three parts.
#[must_use]
pub fn build_solids(
    silhouette: Option<&Polygon>,
    relief: &[Polygon],
    settings: &CutterSettings,
) -> CutterSolids {
    let solids = CutterSolids {
        stamp: build_relief(relief, settings),
        wall: build_wall(silhouette, settings),
        base: build_base(silhouette, settings),
    };
    tracing::debug!(
        shape = ?settings.shape,
        stamp_triangles = solids.stamp.triangle_count(),
        wall_triangles = solids.wall.triangle_count(),
        base_triangles = solids.base.triangle_count(),
        "built solids"
    );
    solids
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings(shape: ShapeKind) -> CutterSettings {
        CutterSettings {
            shape,
            ..CutterSettings::default()
        }
    }

    fn square_silhouette(size: f64) -> Polygon {
        Polygon::solid(Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
        ]))
    }

    #[test]
    fn hole_scale_formula_and_clamp() {
        assert!((hole_scale(1.2, 80.0) - 0.97).abs() < 1e-12);
        assert!((hole_scale(30.0, 80.0) - MIN_HOLE_SCALE).abs() < f64::EPSILON);
        assert!((hole_scale(1.0, 0.0) - MIN_HOLE_SCALE).abs() < f64::EPSILON);
    }

    #[test]
    fn circle_has_requested_segments() {
        let c = circle(10.0, CIRCLE_SEGMENTS);
        assert_eq!(c.len(), CIRCLE_SEGMENTS);
        assert!(CIRCLE_SEGMENTS >= 64);
        let exact = std::f64::consts::PI * 100.0;
        assert!((c.unsigned_area() - exact).abs() / exact < 0.002);
    }

    #[test]
    fn empty_relief_is_empty_mesh() {
        assert!(build_relief(&[], &CutterSettings::default()).is_empty());
    }

    #[test]
    fn relief_rises_from_zero() {
        let s = CutterSettings::default();
        let b = build_relief(&[square_silhouette(5.0)], &s).bounds().unwrap();
        assert!(b.min.z.abs() < 1e-12);
        assert!((b.max.z - s.detail_height).abs() < 1e-12);
    }

    #[test]
    fn rectangle_base_is_box_below_zero() {
        let s = settings(ShapeKind::Rectangle);
        let base = build_base(None, &s);
        assert!(base.is_watertight());
        let expected = s.width * s.height * s.base_thickness;
        assert!((base.signed_volume() - expected).abs() < 1e-6);
        let b = base.bounds().unwrap();
        assert!(b.max.z.abs() < 1e-12);
        assert!((b.min.z + s.base_thickness).abs() < 1e-12);
        assert!((b.width() - s.width).abs() < 1e-9);
    }

    #[test]
    fn circle_base_is_cylinder() {
        let s = settings(ShapeKind::Circle);
        let base = build_base(None, &s);
        assert!(base.is_watertight());
        let b = base.bounds().unwrap();
        assert!((b.width() - s.width).abs() < 1e-9);
        let exact = std::f64::consts::PI * (s.width / 2.0).powi(2) * s.base_thickness;
        assert!((base.signed_volume() - exact).abs() / exact < 0.002);
    }

    #[test]
    fn outline_without_silhouette_builds_rectangle() {
        let s = settings(ShapeKind::Outline);
        let outline = build_base(None, &s);
        let rect = build_base(None, &settings(ShapeKind::Rectangle));
        assert_eq!(outline, rect);
    }

    #[test]
    fn outline_base_follows_silhouette() {
        let s = settings(ShapeKind::Outline);
        let base = build_base(Some(&square_silhouette(100.0)), &s);
        assert!(base.is_watertight());
        assert!((base.signed_volume() - 100.0 * 100.0 * s.base_thickness).abs() < 1e-6);
    }

    #[test]
    fn rectangle_wall_surrounds_footprint() {
        let s = settings(ShapeKind::Rectangle);
        let wall = build_wall(None, &s);
        assert!(wall.is_watertight());
        let t = s.frame_thickness;
        let ring = (s.width + 2.0 * t) * (s.height + 2.0 * t) - s.width * s.height;
        assert!((wall.signed_volume() - ring * s.wall_total_height()).abs() < 1e-6);
        let b = wall.bounds().unwrap();
        assert!((b.min.z + s.base_thickness).abs() < 1e-12);
        assert!((b.max.z - s.frame_height).abs() < 1e-12);
        assert!((b.width() - (s.width + 2.0 * t)).abs() < 1e-9);
    }

    #[test]
    fn circle_wall_is_annulus() {
        let s = settings(ShapeKind::Circle);
        let wall = build_wall(None, &s);
        assert!(wall.is_watertight());
        assert!(wall.signed_volume() > 0.0);
        let b = wall.bounds().unwrap();
        assert!((b.width() - (s.width + 2.0 * s.frame_thickness)).abs() < 1e-9);
    }

    #[test]
    fn outline_wall_hole_is_scaled_silhouette() {
        let s = settings(ShapeKind::Outline);
        let wall = build_wall(Some(&square_silhouette(100.0)), &s);
        assert!(wall.is_watertight());
        let k = hole_scale(s.frame_thickness, s.width);
        let ring = 100.0 * 100.0 * (1.0 - k * k);
        assert!(ring > 0.0);
        assert!((wall.signed_volume() - ring * s.wall_total_height()).abs() < 1e-6);
    }

    /// Two 30-wide bars meeting at the origin corner.
    fn l_silhouette() -> Polygon {
        Polygon::solid(Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 30.0),
            Point::new(30.0, 30.0),
            Point::new(30.0, 100.0),
            Point::new(0.0, 100.0),
        ]))
    }

    #[test]
    fn concave_outline_hole_stays_inside() {
        let s = settings(ShapeKind::Outline);
        let silhouette = l_silhouette();
        let outer = silhouette.outer();

        // Scaling alone pushes the inner corner out of the outline.
        let center = outer.centroid().unwrap();
        let scaled = outer.scaled_toward(center, hole_scale(s.frame_thickness, s.width));
        let geo_outer = silhouette.to_geo();
        assert!(
            scaled
                .points()
                .iter()
                .any(|&p| !geo_outer.contains(&geo::Point::from(geo::Coord::from(p))))
        );

        let profile = outline_wall_profile(&silhouette, &s).unwrap();
        let hole = &profile.holes()[0];
        assert!(hole.unsigned_area() < scaled.unsigned_area());
        for &p in hole.points() {
            assert!(geo_outer.contains(&geo::Point::from(geo::Coord::from(p))), "{p:?} outside outline");
        }

        let wall = build_wall(Some(&silhouette), &s);
        assert!(wall.is_watertight());
        let expected = (outer.unsigned_area() - hole.unsigned_area()) * s.wall_total_height();
        assert!((wall.signed_volume() - expected).abs() / expected < 1e-9);
    }

    #[test]
    fn hairline_outline_has_no_wall() {
        let s = settings(ShapeKind::Outline);
        let strip = Polygon::solid(Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 1.0),
            Point::new(0.0, 1.0),
        ]));
        assert!(build_wall(Some(&strip), &s).is_empty());
    }

    #[test]
    fn build_solids_shares_frame() {
        let s = settings(ShapeKind::Outline);
        let silhouette = square_silhouette(100.0);
        let solids = build_solids(Some(&silhouette), &[square_silhouette(20.0)], &s);
        let base = solids.base.bounds().unwrap();
        let wall = solids.wall.bounds().unwrap();
        let stamp = solids.stamp.bounds().unwrap();
        assert!((base.min.z - wall.min.z).abs() < 1e-12);
        assert!((stamp.min.z - base.max.z).abs() < 1e-12);
    }
}
