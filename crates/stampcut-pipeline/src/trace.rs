//! Vector tracing: closed polygons from a two-tone bitmap.
//!
//! Each trace runs the same four steps with different tuning:
//!
//! 1. Blur the mask and rethreshold at half intensity to remove pixel
//!    stepping.
//! 2. Follow borders (Suzuki-Abe via `imageproc::contours::find_contours`),
//!    which also reports which hole borders belong to which outer border.
//! 3. Reject borders shorter than the minimum length (noise).
//! 4. Simplify corners with RDP, then round them with Chaikin smoothing.
//!
//! Outer borders become [`Polygon`]s; hole borders attach to the outer
//! border that directly contains them. An island inside a hole is its
//! own top-level polygon.

use geo::ChaikinSmoothing;
use imageproc::contours::{BorderType, Contour as PixelContour};
use serde::{Deserialize, Serialize};

use crate::blur::gaussian_blur;
use crate::mask::BinaryMask;
use crate::simplify::simplify_ring;
use crate::types::{Contour, Point, Polygon};

/// Tuning for one tracing pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracerConfig {
    /// Gaussian sigma applied before border following. Zero disables it.
    pub pre_blur_sigma: f32,
    /// RDP tolerance in pixels. Lower keeps more corners.
    pub corner_tolerance: f64,
    /// Chaikin corner-cutting iterations. Higher is rounder.
    pub smoothing_iterations: usize,
    /// Borders with a shorter pixel perimeter are discarded.
    pub min_contour_length: f64,
}

impl TracerConfig {
    /// Coarse settings for the single smooth silhouette blob.
    pub const SILHOUETTE: Self = Self {
        pre_blur_sigma: 2.0,
        corner_tolerance: 1.5,
        smoothing_iterations: 2,
        min_contour_length: 120.0,
    };

    /// Fine settings that keep small interior features such as eyes or
    /// letter counters.
    pub const RELIEF: Self = Self {
        pre_blur_sigma: 0.7,
        corner_tolerance: 0.6,
        smoothing_iterations: 1,
        min_contour_length: 12.0,
    };
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self::RELIEF
    }
}

/// Trace every closed region of `mask` into polygons.
///
/// An all-background mask yields no polygons and an all-content mask
/// yields one polygon bounded by the image frame. Neither fails.
#[must_use]
pub fn trace(mask: &BinaryMask, config: &TracerConfig) -> Vec<Polygon> {
    let prepared = destep(mask, config.pre_blur_sigma);
    let borders: Vec<PixelContour<u32>> = imageproc::contours::find_contours(prepared.as_gray());

    let rings: Vec<Option<Contour>> = borders
        .iter()
        .map(|border| vectorize(border, config))
        .collect();

    let polygons: Vec<Polygon> = borders
        .iter()
        .enumerate()
        .filter(|(_, border)| border.border_type == BorderType::Outer)
        .filter_map(|(i, _)| {
            let outer = rings[i].clone()?;
            let holes = borders
                .iter()
                .enumerate()
                .filter(|(_, b)| b.border_type == BorderType::Hole && b.parent == Some(i))
                .filter_map(|(j, _)| rings[j].clone())
                .collect();
            Some(Polygon::new(outer, holes))
        })
        .collect();

    tracing::debug!(
        borders = borders.len(),
        polygons = polygons.len(),
        holes = polygons.iter().map(|p| p.holes().len()).sum::<usize>(),
        "traced mask"
    );
    polygons
}

/// Blur and rethreshold at half intensity.
fn destep(mask: &BinaryMask, sigma: f32) -> BinaryMask {
    let blurred = gaussian_blur(mask.as_gray(), sigma);
    BinaryMask::from_fn(blurred.width(), blurred.height(), |x, y| {
        blurred.get_pixel(x, y).0[0] >= 128
    })
}

/// Turn one pixel border into a smoothed ring, or `None` if it is noise
/// or degenerate.
fn vectorize(border: &PixelContour<u32>, config: &TracerConfig) -> Option<Contour> {
    // Border points are pixel indices; use pixel centers.
    let raw = Contour::new(
        border
            .points
            .iter()
            .map(|p| Point::new(f64::from(p.x) + 0.5, f64::from(p.y) + 0.5))
            .collect(),
    );
    if raw.perimeter() < config.min_contour_length || !raw.is_valid() {
        return None;
    }

    let simplified = Contour::new(simplify_ring(raw.points(), config.corner_tolerance));
    if !simplified.is_valid() {
        return None;
    }

    let smoothed = simplified
        .to_line_string()
        .chaikin_smoothing(config.smoothing_iterations);
    let ring = Contour::new(smoothed.coords().map(|&c| Point::from(c)).collect());
    ring.is_valid().then_some(ring)
}
