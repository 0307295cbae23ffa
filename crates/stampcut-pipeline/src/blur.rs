//! Gaussian blur on single-channel rasters.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. Used twice: as the
//! spreading step of silhouette expansion and as the de-stepping pass
//! the tracer runs before following borders.

use image::GrayImage;

/// Apply Gaussian blur to a grayscale image.
///
/// Higher `sigma` values produce more smoothing. Non-positive or
/// non-finite sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if !sigma.is_finite() || sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// How far (in pixels) a blur of `sigma` visibly spreads a hard edge.
#[must_use]
pub fn blur_reach(sigma: f32) -> u32 {
    if !sigma.is_finite() || sigma <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let reach = (sigma * 3.0).ceil() as u32;
    reach.saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a test image with a sharp black-to-white boundary at x=5.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn zero_sigma_returns_identical_image() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur(&img, 0.0), img);
    }

    #[test]
    fn nan_sigma_returns_identical_image() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur(&img, f32::NAN), img);
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let blurred = gaussian_blur(&sharp_edge_image(), 2.0);
        let left_of_edge = blurred.get_pixel(4, 5).0[0];
        let right_of_edge = blurred.get_pixel(5, 5).0[0];
        assert!(left_of_edge > 0, "got {left_of_edge}");
        assert!(right_of_edge < 255, "got {right_of_edge}");
    }

    #[test]
    fn output_dimensions_preserved() {
        let blurred = gaussian_blur(&GrayImage::new(17, 31), 1.4);
        assert_eq!(blurred.dimensions(), (17, 31));
    }

    #[test]
    fn reach_grows_with_sigma() {
        assert_eq!(blur_reach(0.0), 0);
        assert_eq!(blur_reach(1.0), 4);
        assert!(blur_reach(30.0) > blur_reach(10.0));
    }

    #[test]
    fn reach_saturates_for_huge_sigma() {
        assert_eq!(blur_reach(f32::MAX), u32::MAX);
        assert_eq!(blur_reach(f32::INFINITY), 0);
    }
}
