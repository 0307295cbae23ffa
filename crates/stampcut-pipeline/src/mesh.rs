//! Indexed triangle meshes for the cutter solids.
//!
//! Triangles are wound counter-clockwise when seen from outside, so face
//! normals point out of the solid. Normals are derived on demand rather
//! than stored; every transform that mirrors space reverses triangle
//! winding to keep that invariant.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Extent along X.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Extent along Y.
    #[must_use]
    pub fn depth(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Extent along Z.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.z - self.min.z
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Smallest box containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }
}

/// A triangulated surface.
///
/// An empty mesh stands for "this part is absent" (zero-depth extrusion,
/// empty contour set) and is skipped by layout and export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolidMesh {
    /// Vertex positions.
    pub positions: Vec<Point3<f64>>,
    /// Vertex index triples, counter-clockwise from outside.
    pub triangles: Vec<[u32; 3]>,
}

impl SolidMesh {
    /// A mesh with no geometry.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            positions: Vec::new(),
            triangles: Vec::new(),
        }
    }

    /// Whether the mesh carries no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    fn corners(&self, tri: [u32; 3]) -> [Point3<f64>; 3] {
        tri.map(|i| self.positions[i as usize])
    }

    /// Unit normal of each triangle. Degenerate triangles get a zero vector.
    #[must_use]
    pub fn face_normals(&self) -> Vec<Vector3<f64>> {
        self.triangles
            .iter()
            .map(|&tri| {
                let [a, b, c] = self.corners(tri);
                (b - a).cross(&(c - a)).try_normalize(0.0).unwrap_or_else(Vector3::zeros)
            })
            .collect()
    }

    /// Area-weighted unit normal at each vertex.
    #[must_use]
    pub fn vertex_normals(&self) -> Vec<Vector3<f64>> {
        let mut sums = vec![Vector3::zeros(); self.positions.len()];
        for &tri in &self.triangles {
            let [a, b, c] = self.corners(tri);
            let weighted = (b - a).cross(&(c - a));
            for i in tri {
                sums[i as usize] += weighted;
            }
        }
        sums.into_iter()
            .map(|n| n.try_normalize(0.0).unwrap_or_else(Vector3::zeros))
            .collect()
    }

    /// Bounding box, `None` for an empty mesh.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        if self.is_empty() {
            return None;
        }
        let first = *self.positions.first()?;
        Some(self.positions.iter().fold(
            Aabb {
                min: first,
                max: first,
            },
            |acc, p| Aabb {
                min: acc.min.inf(p),
                max: acc.max.sup(p),
            },
        ))
    }

    /// Enclosed volume by the divergence theorem.
    ///
    /// Positive when triangles face outward.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|&tri| {
                let [a, b, c] = self.corners(tri);
                a.coords.dot(&b.coords.cross(&c.coords))
            })
            .sum::<f64>()
            / 6.0
    }

    /// Whether every directed edge is matched by exactly one reversed
    /// edge: closed, consistently oriented, and edge-manifold.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
        for &[a, b, c] in &self.triangles {
            for edge in [(a, b), (b, c), (c, a)] {
                *directed.entry(edge).or_default() += 1;
            }
        }
        !directed.is_empty()
            && directed
                .iter()
                .all(|(&(a, b), &count)| count == 1 && directed.get(&(b, a)) == Some(&1))
    }

    /// Offset every vertex.
    #[must_use]
    pub fn translated(mut self, offset: Vector3<f64>) -> Self {
        for p in &mut self.positions {
            *p += offset;
        }
        self
    }

    /// Scale X and Y by `factor` about the origin; Z is untouched.
    #[must_use]
    pub fn scaled_planar(mut self, factor: f64) -> Self {
        for p in &mut self.positions {
            p.x *= factor;
            p.y *= factor;
        }
        self
    }

    /// Mirror across the XZ plane (negate Y).
    ///
    /// Reverses every triangle so normals still point outward.
    #[must_use]
    pub fn mirrored_y(mut self) -> Self {
        for p in &mut self.positions {
            p.y = -p.y;
        }
        for tri in &mut self.triangles {
            tri.swap(1, 2);
        }
        self
    }

    /// Concatenate meshes into one, skipping empty parts.
    #[must_use]
    pub fn merge<'a>(parts: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut merged = Self::empty();
        for part in parts {
            if part.is_empty() {
                continue;
            }
            let base = u32::try_from(merged.positions.len()).unwrap_or(u32::MAX);
            merged.positions.extend_from_slice(&part.positions);
            merged
                .triangles
                .extend(part.triangles.iter().map(|t| t.map(|i| i + base)));
        }
        merged
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Unit tetrahedron with outward-facing triangles.
    fn tetra() -> SolidMesh {
        SolidMesh {
            positions: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            triangles: vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        }
    }

    #[test]
    fn empty_mesh_has_no_bounds() {
        let m = SolidMesh::empty();
        assert!(m.is_empty());
        assert!(m.bounds().is_none());
        assert!(!m.is_watertight());
        assert!(m.signed_volume().abs() < f64::EPSILON);
    }

    #[test]
    fn tetra_is_watertight_with_positive_volume() {
        let t = tetra();
        assert!(t.is_watertight());
        assert!((t.signed_volume() - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn open_surface_is_not_watertight() {
        let mut t = tetra();
        t.triangles.pop();
        assert!(!t.is_watertight());
    }

    #[test]
    fn face_normal_points_outward() {
        let normals = tetra().face_normals();
        // Bottom face [0, 2, 1] lies in z = 0 and faces -Z.
        assert!((normals[0] - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-12);
    }

    #[test]
    fn vertex_normals_are_unit() {
        for n in tetra().vertex_normals() {
            assert!((n.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn mirror_keeps_volume_positive() {
        let mirrored = tetra().mirrored_y();
        assert!(mirrored.is_watertight());
        assert!((mirrored.signed_volume() - 1.0 / 6.0).abs() < 1e-12);
        let b = mirrored.bounds().unwrap();
        assert!((b.min.y + 1.0).abs() < 1e-12);
    }

    #[test]
    fn planar_scale_leaves_z() {
        let b = tetra().scaled_planar(10.0).bounds().unwrap();
        assert!((b.width() - 10.0).abs() < 1e-12);
        assert!((b.depth() - 10.0).abs() < 1e-12);
        assert!((b.height() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn translate_moves_bounds() {
        let b = tetra()
            .translated(Vector3::new(1.0, 2.0, 3.0))
            .bounds()
            .unwrap();
        assert_eq!(b.min, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(b.center(), Point3::new(1.5, 2.5, 3.5));
    }

    #[test]
    fn merge_skips_empty_and_reindexes() {
        let a = tetra();
        let b = tetra().translated(Vector3::new(5.0, 0.0, 0.0));
        let merged = SolidMesh::merge([&a, &SolidMesh::empty(), &b]);
        assert_eq!(merged.vertex_count(), 8);
        assert_eq!(merged.triangle_count(), 8);
        assert!(merged.is_watertight());
        assert!((merged.signed_volume() - 2.0 / 6.0).abs() < 1e-12);
        assert!((merged.bounds().unwrap().width() - 6.0).abs() < 1e-12);
    }
}
