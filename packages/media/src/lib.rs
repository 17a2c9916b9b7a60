#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Media decoding and preprocessing for the ingestion pipeline.
//!
//! Covers the `Validated` and `Preprocessed` phases (accepted extensions,
//! decode, RGB conversion, dimension cap), embedded GPS extraction for
//! the `Geotagged` phase, a local contrast enhancer for the `Enhanced`
//! phase, and an `ffmpeg`-backed frame decoder for video input.

pub mod enhance;
pub mod exif_gps;
pub mod video;

use image::RgbImage;
use thiserror::Error;

/// Longer image dimension is capped here during preprocessing,
/// preserving aspect ratio.
pub const MAX_DIMENSION: u32 = 1024;

/// Accepted image file extensions (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Accepted video file extensions (lowercase).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

/// What kind of media a filename refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Still image.
    Image,
    /// Video container.
    Video,
}

/// Errors from media decoding and preprocessing.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The file extension is not in the accepted set.
    #[error("Invalid file type: {extension:?}")]
    UnsupportedExtension {
        /// The offending extension (may be empty).
        extension: String,
    },

    /// Image decoding or encoding failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O failure while staging temp files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extracts the lowercase extension from a filename.
#[must_use]
pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Classifies a filename by its extension.
///
/// # Errors
///
/// Returns [`MediaError::UnsupportedExtension`] when the extension is
/// missing or not in either accepted set.
pub fn media_kind(filename: &str) -> Result<MediaKind, MediaError> {
    let extension = file_extension(filename);
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        Ok(MediaKind::Video)
    } else {
        Err(MediaError::UnsupportedExtension { extension })
    }
}

/// Decodes and normalizes an image for detection: forces RGB and caps
/// the longer dimension at [`MAX_DIMENSION`], preserving aspect ratio.
///
/// # Errors
///
/// Returns [`MediaError::Image`] if the bytes cannot be decoded.
pub fn preprocess(data: &[u8]) -> Result<RgbImage, MediaError> {
    let decoded = image::load_from_memory(data)?;
    let rgb = decoded.to_rgb8();
    Ok(cap_dimensions(rgb))
}

/// Downscales an image so its longer side is at most [`MAX_DIMENSION`].
#[must_use]
pub fn cap_dimensions(image: RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let longer = width.max(height);
    if longer <= MAX_DIMENSION {
        return image;
    }

    let scale = f64::from(MAX_DIMENSION) / f64::from(longer);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (new_width, new_height) = (
        ((f64::from(width) * scale).round() as u32).max(1),
        ((f64::from(height) * scale).round() as u32).max(1),
    );

    log::debug!("Resizing image from {width}x{height} to {new_width}x{new_height}");

    image::imageops::resize(
        &image,
        new_width,
        new_height,
        image::imageops::FilterType::Triangle,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_classification() {
        assert_eq!(media_kind("road.JPG").unwrap(), MediaKind::Image);
        assert_eq!(media_kind("road.jpeg").unwrap(), MediaKind::Image);
        assert_eq!(media_kind("clip.webm").unwrap(), MediaKind::Video);
        assert!(matches!(
            media_kind("notes.txt"),
            Err(MediaError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            media_kind("no_extension"),
            Err(MediaError::UnsupportedExtension { extension }) if extension.is_empty()
        ));
    }

    #[test]
    fn small_images_are_untouched() {
        let image = RgbImage::new(640, 480);
        let processed = cap_dimensions(image);
        assert_eq!(processed.dimensions(), (640, 480));
    }

    #[test]
    fn large_images_cap_longer_dimension() {
        let image = RgbImage::new(2048, 1024);
        let processed = cap_dimensions(image);
        assert_eq!(processed.dimensions(), (1024, 512));
    }

    #[test]
    fn portrait_images_preserve_aspect() {
        let image = RgbImage::new(1000, 4000);
        let processed = cap_dimensions(image);
        assert_eq!(processed.dimensions(), (256, 1024));
    }

    #[test]
    fn preprocess_decodes_png() {
        let mut buffer = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(RgbImage::new(16, 8))
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();

        let processed = preprocess(buffer.get_ref()).unwrap();
        assert_eq!(processed.dimensions(), (16, 8));
    }

    #[test]
    fn preprocess_rejects_garbage() {
        assert!(matches!(
            preprocess(b"definitely not an image"),
            Err(MediaError::Image(_))
        ));
    }
}
