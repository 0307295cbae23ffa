//! stampcut-pipeline: raster image to cookie-stamp cutter solids (sans-IO).
//!
//! Converts an image into three watertight solids (relief stamp, cutting
//! wall, base plate) sized to a physical footprint, through:
//! decode -> resample -> binarize -> expand -> trace silhouette ->
//! select -> trace relief -> build solids -> normalize.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! byte slices and returns structured data. Rendering and mesh export
//! belong to the caller.

pub mod blur;
pub mod diagnostics;
pub mod epoch;
pub mod expand;
pub mod extrude;
pub mod layout;
pub mod mask;
pub mod mesh;
pub mod pipeline;
pub mod raster;
pub mod select;
pub mod simplify;
pub mod solid;
pub mod trace;
pub mod types;

pub use epoch::{Epoch, EpochOutcome, EpochSlot, GenerationSlot, run_epoch};
pub use layout::AssemblyResult;
pub use mask::BinaryMask;
pub use mesh::{Aabb, SolidMesh};
pub use pipeline::{Pipeline, StagedResult};
pub use trace::TracerConfig;
pub use types::{
    Contour, CutterSettings, Dimensions, PipelineConfig, PipelineError, Point, Polygon, ShapeKind,
    Winding,
};

/// Generate a cutter with the default tuning.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and one settings
/// snapshot and returns the laid-out assembly. An outline request whose
/// silhouette pass finds nothing falls back to a rectangle cutter rather
/// than failing.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidSettings`] for unusable lengths,
/// [`PipelineError::InvalidConfig`] for out-of-range tuning,
/// [`PipelineError::EmptyInput`] if `image_bytes` is empty, and
/// [`PipelineError::InvalidImage`] if the image does not decode.
pub fn generate(
    image_bytes: &[u8],
    settings: &CutterSettings,
) -> Result<AssemblyResult, PipelineError> {
    generate_with_config(image_bytes, settings, &PipelineConfig::default())
}

/// [`generate`] with explicit tuning.
///
/// # Errors
///
/// Same as [`generate`].
pub fn generate_with_config(
    image_bytes: &[u8],
    settings: &CutterSettings,
    config: &PipelineConfig,
) -> Result<AssemblyResult, PipelineError> {
    generate_staged(image_bytes, settings, config).map(|staged| staged.assembly)
}

/// Run the full pipeline and keep every intermediate.
///
/// # Errors
///
/// Same as [`generate`].
pub fn generate_staged(
    image_bytes: &[u8],
    settings: &CutterSettings,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(
        Pipeline::new(image_bytes.to_vec(), settings.clone(), config.clone())
            .decode()?
            .resample()
            .binarize()
            .expand()
            .trace_silhouette()
            .select()
            .trace_relief()
            .build_solids()
            .normalize()
            .into_result(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            working_resolution: 96,
            expansion_radius: 3.0,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn generate_empty_input() {
        let result = generate(&[], &CutterSettings::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn generate_corrupt_input() {
        let result = generate(&[0xFF, 0x00], &CutterSettings::default());
        assert!(matches!(result, Err(PipelineError::InvalidImage(_))));
    }

    #[test]
    fn generate_uniform_image_falls_back() {
        let img = image::RgbaImage::from_pixel(20, 20, image::Rgba([255, 255, 255, 255]));
        let staged =
            generate_staged(&encode_png(&img), &CutterSettings::default(), &small_config())
                .unwrap();
        assert!(staged.fallback);
        assert_eq!(staged.shape, ShapeKind::Rectangle);
        assert!(staged.assembly.stamp.is_empty());
        assert!(!staged.assembly.wall.is_empty());
    }

    #[test]
    fn generate_with_config_matches_staged() {
        let img = image::RgbaImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let png = encode_png(&img);
        let settings = CutterSettings::default();
        let assembly = generate_with_config(&png, &settings, &small_config()).unwrap();
        let staged = generate_staged(&png, &settings, &small_config()).unwrap();
        assert_eq!(assembly, staged.assembly);
        assert!(assembly.combined().is_watertight());
    }
}
