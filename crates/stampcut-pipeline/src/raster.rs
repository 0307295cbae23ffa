//! Raster preprocessing: decode, resample to working resolution, binarize.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP), resamples the decoded
//! image to a fixed working width so trace fidelity does not depend on
//! the source size, and classifies each pixel as content or background
//! by average luminance.

use image::RgbaImage;
use image::imageops::FilterType;

use crate::mask::BinaryMask;
use crate::types::PipelineError;

/// Resampling filter used for the working-resolution resize.
const RESAMPLE_FILTER: FilterType = FilterType::Triangle;

/// Decode raw image bytes into RGBA.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::InvalidImage`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Working-resolution size for a `width × height` source: the width
/// becomes `working_width` and the height follows the aspect ratio.
#[must_use]
pub fn working_size(width: u32, height: u32, working_width: u32) -> (u32, u32) {
    let working_width = working_width.max(1);
    if width == 0 {
        return (working_width, working_width);
    }
    let scaled = f64::from(working_width) * f64::from(height) / f64::from(width);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let working_height = scaled.round().max(1.0) as u32;
    (working_width, working_height)
}

/// Resample an image to `(working_width, working_width · aspect)`.
///
/// Both down- and up-sampling happen: every request works on the same
/// pixel grid regardless of source size.
#[must_use = "returns the resampled image"]
pub fn resample(image: &RgbaImage, working_width: u32) -> RgbaImage {
    let (w, h) = working_size(image.width(), image.height(), working_width);
    if (w, h) == image.dimensions() {
        return image.clone();
    }
    image::imageops::resize(image, w, h, RESAMPLE_FILTER)
}

/// Average luminance of a pixel composited over white.
///
/// Fully transparent pixels read as white (background).
#[must_use]
pub fn luminance(pixel: image::Rgba<u8>) -> f64 {
    let [r, g, b, a] = pixel.0;
    let alpha = f64::from(a) / 255.0;
    let over_white = |c: u8| f64::from(c).mul_add(alpha, 255.0 * (1.0 - alpha));
    (over_white(r) + over_white(g) + over_white(b)) / 3.0
}

/// Classify pixels with luminance strictly below `threshold` as content.
///
/// With `invert` set, bright pixels are content instead.
#[must_use = "returns the binarized mask"]
pub fn binarize(image: &RgbaImage, threshold: u8, invert: bool) -> BinaryMask {
    let threshold = f64::from(threshold);
    BinaryMask::from_fn(image.width(), image.height(), |x, y| {
        let dark = luminance(*image.get_pixel(x, y)) < threshold;
        dark != invert
    })
}
