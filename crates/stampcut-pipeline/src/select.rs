//! Contour selection policies.
//!
//! The silhouette pass keeps only the dominant blob; the relief pass
//! keeps everything it traced.

use crate::types::{PipelineError, Polygon};

/// Return the polygon whose outer boundary has the strictly largest
/// unsigned area. Ties resolve to the first encountered.
///
/// # Errors
///
/// Returns [`PipelineError::NoContourFound`] if `polygons` is empty.
pub fn largest_area(polygons: Vec<Polygon>) -> Result<Polygon, PipelineError> {
    let mut best: Option<(f64, Polygon)> = None;
    for polygon in polygons {
        let area = polygon.outer_area();
        if best.as_ref().is_none_or(|(best_area, _)| area > *best_area) {
            best = Some((area, polygon));
        }
    }
    best.map(|(_, polygon)| polygon)
        .ok_or(PipelineError::NoContourFound)
}

/// Keep the whole set, to be extruded together as one solid.
///
/// An empty set is valid and yields no relief geometry.
#[must_use]
pub fn full_set(polygons: Vec<Polygon>) -> Vec<Polygon> {
    polygons
}
