//! Two-tone content/background bitmap.
//!
//! [`BinaryMask`] wraps a `GrayImage` in which content pixels are 255
//! and background pixels are 0. That is the polarity
//! `imageproc::contours::find_contours` treats as foreground. For the
//! blur-based stages the mask is also available as an "ink" rendering
//! (content black on white), which is what the expansion cutoff is
//! expressed against.

use image::{GrayImage, Luma};

use crate::types::Dimensions;

/// Pixel value marking content.
pub const CONTENT: u8 = 255;
/// Pixel value marking background.
pub const BACKGROUND: u8 = 0;

/// A bitmap classifying every pixel as content or background.
///
/// Derived per request and never persisted. Every transform returns a
/// new mask; nothing mutates a mask in place after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask(GrayImage);

impl BinaryMask {
    /// Build a mask by classifying each pixel coordinate.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut is_content: impl FnMut(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(width, height, |x, y| {
            Luma([if is_content(x, y) { CONTENT } else { BACKGROUND }])
        }))
    }

    /// An all-background mask.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Classify an ink rendering: pixels darker than `cutoff` are content.
    #[must_use]
    pub fn from_ink(ink: &GrayImage, cutoff: u8) -> Self {
        Self::from_fn(ink.width(), ink.height(), |x, y| {
            ink.get_pixel(x, y).0[0] < cutoff
        })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Mask dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Whether the pixel at `(x, y)` is content. Out-of-range is background.
    #[must_use]
    pub fn is_content(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.0.get_pixel(x, y).0[0] == CONTENT
    }

    /// Number of content pixels.
    #[must_use]
    pub fn content_count(&self) -> u64 {
        self.0
            .pixels()
            .map(|p| u64::from(u8::from(p.0[0] == CONTENT)))
            .sum()
    }

    /// Content rendered black on a white background.
    #[must_use]
    pub fn to_ink(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            Luma([CONTENT - self.0.get_pixel(x, y).0[0]])
        })
    }

    /// A copy surrounded by `pad` background pixels on every side.
    #[must_use]
    pub fn padded(&self, pad: u32) -> Self {
        Self::from_fn(self.width() + 2 * pad, self.height() + 2 * pad, |x, y| {
            x >= pad && y >= pad && self.is_content(x - pad, y - pad)
        })
    }

    /// Pixelwise union with another mask of the same size.
    ///
    /// Pixels outside `other` count as background.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::from_fn(self.width(), self.height(), |x, y| {
            self.is_content(x, y) || other.is_content(x, y)
        })
    }

    /// Inclusive bounding box of the content as `(min_x, min_y, max_x, max_y)`.
    #[must_use]
    pub fn content_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        self.0
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == CONTENT)
            .fold(None, |acc, (x, y, _)| {
                Some(match acc {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                })
            })
    }

    /// The underlying bitmap (content = 255).
    #[must_use]
    pub const fn as_gray(&self) -> &GrayImage {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_mask() -> BinaryMask {
        BinaryMask::from_fn(10, 10, |x, y| (3..6).contains(&x) && (2..8).contains(&y))
    }

    #[test]
    fn content_count_matches_block() {
        assert_eq!(block_mask().content_count(), 18);
        assert_eq!(BinaryMask::empty(4, 4).content_count(), 0);
    }

    #[test]
    fn ink_round_trip_preserves_classification() {
        let mask = block_mask();
        let ink = mask.to_ink();
        assert_eq!(ink.get_pixel(4, 4).0[0], 0);
        assert_eq!(ink.get_pixel(0, 0).0[0], 255);
        assert_eq!(BinaryMask::from_ink(&ink, 128), mask);
    }

    #[test]
    fn out_of_range_is_background() {
        let mask = block_mask();
        assert!(!mask.is_content(100, 100));
    }

    #[test]
    fn padding_shifts_content() {
        let padded = block_mask().padded(5);
        assert_eq!(padded.width(), 20);
        assert_eq!(padded.height(), 20);
        assert!(padded.is_content(8, 7));
        assert!(!padded.is_content(3, 2));
        assert_eq!(padded.content_count(), 18);
    }

    #[test]
    fn union_contains_both() {
        let a = BinaryMask::from_fn(6, 6, |x, _| x < 2);
        let b = BinaryMask::from_fn(6, 6, |_, y| y < 2);
        let u = a.union(&b);
        assert!(u.is_content(0, 5));
        assert!(u.is_content(5, 0));
        assert!(!u.is_content(5, 5));
        assert_eq!(u.content_count(), 20);
    }

    #[test]
    fn content_bounds_of_block() {
        assert_eq!(block_mask().content_bounds(), Some((3, 2, 5, 7)));
        assert_eq!(BinaryMask::empty(3, 3).content_bounds(), None);
    }
}
