//! Silhouette expansion: approximate outward offset by blur and rethreshold.
//!
//! The mask is rendered as ink (content black on white), blurred with a
//! Gaussian of the requested radius, and the blurred coverage is stacked
//! `passes` times so the soft falloff crosses a clean cutoff. Pixels
//! still slightly darker than the loose cutoff count as inside, which
//! grows the content region outward with rounded corners.
//!
//! This is not a distance transform. The effective offset depends on the
//! radius, the number of passes, the cutoff, and the local shape (thin
//! features spread less than large blobs), so callers must tolerate
//! smoothing error on the order of the radius.

use image::{GrayImage, Luma};

use crate::blur::{blur_reach, gaussian_blur};
use crate::mask::BinaryMask;

/// An expanded mask and where the input sits inside it.
///
/// The canvas grows by `offset` pixels on every side so the expansion is
/// never clipped by the image border. Subtract `offset` from traced
/// coordinates to return to the input mask's frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// The enlarged bubble mask.
    pub mask: BinaryMask,
    /// Padding added on each side, in pixels.
    pub offset: u32,
}

/// Grow the content region of `mask` outward by roughly `radius` pixels.
///
/// The result always contains the original content. A non-positive
/// radius returns the mask unchanged with zero offset.
#[must_use = "returns the expanded mask"]
pub fn expand(mask: &BinaryMask, radius: f32, passes: u32, cutoff: u8) -> Expansion {
    let offset = blur_reach(radius);
    if offset == 0 {
        return Expansion {
            mask: mask.clone(),
            offset: 0,
        };
    }

    let padded = mask.padded(offset);
    let blurred = gaussian_blur(&padded.to_ink(), radius);
    let stacked = stack_coverage(&blurred, passes.max(1));
    let grown = BinaryMask::from_ink(&stacked, cutoff).union(&padded);

    Expansion {
        mask: grown,
        offset,
    }
}

/// Composite the ink coverage of `image` over itself `passes` times.
///
/// With coverage `c = 1 - v/255`, stacking gives `1 - (1 - c)^passes`,
/// i.e. `v' = 255 · (v/255)^passes`.
fn stack_coverage(image: &GrayImage, passes: u32) -> GrayImage {
    let exponent = i32::try_from(passes).unwrap_or(i32::MAX);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = f64::from(image.get_pixel(x, y).0[0]) / 255.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let stacked = (255.0 * v.powi(exponent)).round().clamp(0.0, 255.0) as u8;
        Luma([stacked])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disc(size: u32, radius: f64) -> BinaryMask {
        let c = f64::from(size) / 2.0;
        BinaryMask::from_fn(size, size, |x, y| {
            let dx = f64::from(x) + 0.5 - c;
            let dy = f64::from(y) + 0.5 - c;
            dx.hypot(dy) <= radius
        })
    }

    fn bounds_area(mask: &BinaryMask) -> u64 {
        mask.content_bounds().map_or(0, |(x0, y0, x1, y1)| {
            u64::from(x1 - x0 + 1) * u64::from(y1 - y0 + 1)
        })
    }

    #[test]
    fn zero_radius_is_identity() {
        let mask = disc(20, 5.0);
        let e = expand(&mask, 0.0, 3, 240);
        assert_eq!(e.offset, 0);
        assert_eq!(e.mask, mask);
    }

    #[test]
    fn expansion_contains_original() {
        let mask = disc(40, 8.0);
        let e = expand(&mask, 3.0, 3, 240);
        for y in 0..mask.height() {
            for x in 0..mask.width() {
                if mask.is_content(x, y) {
                    assert!(e.mask.is_content(x + e.offset, y + e.offset), "lost ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn expansion_grows_outward() {
        let mask = disc(40, 8.0);
        let e = expand(&mask, 3.0, 3, 240);
        assert!(e.mask.content_count() > mask.content_count());
        // A pixel just outside the original disc is now inside.
        let c = 20 + e.offset;
        assert!(!mask.is_content(20 + 9, 20));
        assert!(e.mask.is_content(c + 9, c));
    }

    #[test]
    fn empty_mask_stays_empty() {
        let e = expand(&BinaryMask::empty(16, 16), 3.0, 3, 240);
        assert_eq!(e.mask.content_count(), 0);
    }

    #[test]
    fn larger_radius_never_shrinks_bounds() {
        let mask = disc(48, 10.0);
        let mut previous = 0;
        for radius in [1.0, 2.0, 4.0, 6.0] {
            let area = bounds_area(&expand(&mask, radius, 3, 240).mask);
            assert!(area >= previous, "radius {radius}: {area} < {previous}");
            previous = area;
        }
    }

    #[test]
    fn more_passes_spread_further() {
        let mask = disc(40, 8.0);
        let one = expand(&mask, 3.0, 1, 240).mask.content_count();
        let three = expand(&mask, 3.0, 3, 240).mask.content_count();
        assert!(three >= one);
    }

    #[test]
    fn stacking_darkens_partial_coverage() {
        let img = GrayImage::from_pixel(1, 1, Luma([128]));
        let stacked = stack_coverage(&img, 2);
        assert_eq!(stacked.get_pixel(0, 0).0[0], 64);
        let white = GrayImage::from_pixel(1, 1, Luma([255]));
        assert_eq!(stack_coverage(&white, 3).get_pixel(0, 0).0[0], 255);
    }
}
