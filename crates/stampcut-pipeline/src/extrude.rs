//! Linear extrusion of 2D polygons into closed solids.
//!
//! Each polygon becomes a prism from z = 0 to z = `depth`: a bottom cap,
//! a top cap, and one quad per ring edge. Caps are triangulated with
//! earcut (holes included) and reuse the ring vertices, so the result is
//! watertight with outward-facing triangles.

use std::collections::HashMap;

use geo::TriangulateEarcut;
use nalgebra::Point3;

use crate::mesh::SolidMesh;
use crate::types::{Point, Polygon};

/// Extrude every polygon by `depth` along +Z.
///
/// Returns an empty mesh for an empty set or a non-positive (or
/// non-finite) depth: an absent part, not an error.
#[must_use]
pub fn extrude(polygons: &[Polygon], depth: f64) -> SolidMesh {
    if polygons.is_empty() || !depth.is_finite() || depth <= 0.0 {
        tracing::debug!(
            polygons = polygons.len(),
            depth,
            "degenerate extrusion, no geometry"
        );
        return SolidMesh::empty();
    }

    let mut mesh = SolidMesh::empty();
    for polygon in polygons {
        extrude_polygon(&mut mesh, polygon, depth);
    }
    mesh
}

fn coord_key(p: Point) -> (u64, u64) {
    (p.x.to_bits(), p.y.to_bits())
}

fn extrude_polygon(mesh: &mut SolidMesh, polygon: &Polygon, depth: f64) {
    if !polygon.outer().is_valid() {
        return;
    }
    let rings: Vec<&[Point]> = polygon
        .rings()
        .filter(|r| r.is_valid())
        .map(crate::types::Contour::points)
        .collect();
    let ring_total: usize = rings.iter().map(|r| r.len()).sum();
    let (Ok(base), Ok(count)) = (
        u32::try_from(mesh.positions.len()),
        u32::try_from(ring_total),
    ) else {
        return;
    };
    let bottom = |i: u32| base + i;
    let top = |i: u32| base + count + i;

    // Ring vertices: all bottoms, then all tops, in ring order.
    let mut lookup: HashMap<(u64, u64), u32> = HashMap::with_capacity(ring_total);
    let mut ring_ranges = Vec::with_capacity(rings.len());
    let mut next = 0u32;
    for ring in &rings {
        let start = next;
        for &p in *ring {
            lookup.entry(coord_key(p)).or_insert(next);
            mesh.positions.push(Point3::new(p.x, p.y, 0.0));
            next += 1;
        }
        ring_ranges.push((start, next - start));
    }
    for ring in &rings {
        for &p in *ring {
            mesh.positions.push(Point3::new(p.x, p.y, depth));
        }
    }

    // Caps.
    let cap = geo::Polygon::new(
        polygon.outer().to_line_string(),
        polygon
            .holes()
            .iter()
            .filter(|h| h.is_valid())
            .map(crate::types::Contour::to_line_string)
            .collect(),
    );
    let raw = cap.earcut_triangles_raw();
    let vertex = |i: usize| Point::new(raw.vertices[2 * i], raw.vertices[2 * i + 1]);
    for tri in raw.triangle_indices.chunks_exact(3) {
        let corners = [vertex(tri[0]), vertex(tri[1]), vertex(tri[2])];
        let Some(ids) = corners
            .iter()
            .map(|&p| lookup.get(&coord_key(p)).copied())
            .collect::<Option<Vec<u32>>>()
        else {
            continue;
        };
        let [p0, p1, p2] = corners;
        let ccw = (p1.x - p0.x).mul_add(p2.y - p0.y, -((p1.y - p0.y) * (p2.x - p0.x))) >= 0.0;
        let (a, b, c) = if ccw {
            (ids[0], ids[1], ids[2])
        } else {
            (ids[0], ids[2], ids[1])
        };
        mesh.triangles.push([top(a), top(b), top(c)]);
        mesh.triangles.push([bottom(a), bottom(c), bottom(b)]);
    }

    // Side walls. Outer rings are counter-clockwise and holes clockwise,
    // so walking each ring in order puts the material on the left.
    for (start, len) in ring_ranges {
        for j in 0..len {
            let a = start + j;
            let b = start + (j + 1) % len;
            mesh.triangles.push([bottom(a), bottom(b), top(b)]);
            mesh.triangles.push([bottom(a), top(b), top(a)]);
        }
    }
}
