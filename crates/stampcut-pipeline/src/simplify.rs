//! Ring simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Traced pixel borders are staircases: one vertex per boundary pixel.
//! Removing vertices within a tolerance of the chord between their
//! neighbours keeps the corners that matter and drops the stepping,
//! which the smoothing pass would otherwise turn into ripples.

use geo::{LineString, Simplify};

use crate::types::Point;

/// Simplify a closed ring (no repeated closing point).
///
/// The ring is split at vertex 0 and at the vertex farthest from it, and
/// each half is simplified as an open polyline so the result does not
/// depend on an arbitrary closing chord. A tolerance of 0.0 preserves
/// all points. Rings with fewer than 4 points are returned unchanged.
#[must_use = "returns the simplified ring"]
pub fn simplify_ring(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 4 || tolerance <= 0.0 {
        return points.to_vec();
    }

    let anchor = points[0];
    let far = points
        .iter()
        .enumerate()
        .skip(1)
        .fold((1, 0.0), |(best, best_d), (i, p)| {
            let d = p.distance_squared(anchor);
            if d > best_d { (i, d) } else { (best, best_d) }
        })
        .0;

    // Walk the ring once, closing back onto the anchor.
    let closed: Vec<geo::Coord<f64>> = points
        .iter()
        .chain(std::iter::once(&anchor))
        .map(|&p| p.into())
        .collect();
    let there = LineString::from(closed[..=far].to_vec()).simplify(tolerance);
    let back = LineString::from(closed[far..].to_vec()).simplify(tolerance);

    // `there` ends where `back` starts, and `back` ends on the anchor.
    let back_len = back.0.len();
    there
        .0
        .into_iter()
        .chain(back.0.into_iter().take(back_len.saturating_sub(1)).skip(1))
        .map(Point::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pixel staircase around a 10x10 square: one point per unit step.
    fn staircase_square() -> Vec<Point> {
        let mut pts = Vec::new();
        for x in 0..10 {
            pts.push(Point::new(f64::from(x), 0.0));
        }
        for y in 0..10 {
            pts.push(Point::new(10.0, f64::from(y)));
        }
        for x in (1..=10).rev() {
            pts.push(Point::new(f64::from(x), 10.0));
        }
        for y in (1..=10).rev() {
            pts.push(Point::new(0.0, f64::from(y)));
        }
        pts
    }

    #[test]
    fn short_rings_unchanged() {
        let tri = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
        ];
        assert_eq!(simplify_ring(&tri, 5.0), tri);
    }

    #[test]
    fn zero_tolerance_preserves_all_points() {
        let pts = staircase_square();
        assert_eq!(simplify_ring(&pts, 0.0).len(), pts.len());
    }

    #[test]
    fn collinear_runs_collapse_to_corners() {
        let simplified = simplify_ring(&staircase_square(), 0.5);
        assert_eq!(simplified.len(), 4, "got {simplified:?}");
        for corner in [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ] {
            assert!(simplified.contains(&corner), "missing {corner:?}");
        }
    }

    #[test]
    fn large_tolerance_keeps_anchor_and_far_point() {
        let simplified = simplify_ring(&staircase_square(), 100.0);
        assert_eq!(simplified.len(), 2);
        assert_eq!(simplified[0], Point::new(0.0, 0.0));
        assert_eq!(simplified[1], Point::new(10.0, 10.0));
    }
}
