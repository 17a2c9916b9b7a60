//! Local contrast normalization.
//!
//! Histogram-equalizes the luminance channel and rescales RGB
//! proportionally, brightening shadowed road surface so the detector
//! sees defect edges in low-light shots. Implements the enhancement
//! collaborator seam; deployments with a dedicated enhancement model
//! swap in their own [`ImageEnhancer`].

use image::RgbImage;
use pothole_map_detect::{DetectError, ImageEnhancer};

/// Luminance histogram equalization enhancer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContrastEnhancer;

#[async_trait::async_trait]
impl ImageEnhancer for ContrastEnhancer {
    async fn enhance(&self, image: &RgbImage) -> Result<RgbImage, DetectError> {
        Ok(equalize_luminance(image))
    }
}

/// Rec. 601 luma from an RGB pixel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn luma(pixel: &image::Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    let value =
        0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    value.round().clamp(0.0, 255.0) as u8
}

/// Equalizes the luminance histogram, keeping chroma ratios intact.
///
/// Output dimensions always match the input.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn equalize_luminance(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let total = u64::from(width) * u64::from(height);
    if total == 0 {
        return image.clone();
    }

    // Luma histogram -> cumulative distribution -> remap table.
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[usize::from(luma(pixel))] += 1;
    }

    let mut cdf = [0u64; 256];
    let mut running = 0u64;
    for (level, count) in histogram.iter().enumerate() {
        running += count;
        cdf[level] = running;
    }

    let cdf_min = cdf
        .iter()
        .copied()
        .find(|&count| count > 0)
        .unwrap_or(0);
    let denom = total.saturating_sub(cdf_min).max(1);

    let mut remap = [0u8; 256];
    for level in 0..256 {
        let scaled = (cdf[level].saturating_sub(cdf_min) as f64 / denom as f64) * 255.0;
        remap[level] = scaled.round().clamp(0.0, 255.0) as u8;
    }

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let old_luma = luma(pixel);
        if old_luma == 0 {
            continue;
        }
        let new_luma = remap[usize::from(old_luma)];
        let gain = f64::from(new_luma) / f64::from(old_luma);
        for channel in &mut pixel.0 {
            *channel = (f64::from(*channel) * gain).round().clamp(0.0, 255.0) as u8;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn dimensions_are_preserved() {
        let image = RgbImage::new(33, 17);
        let enhanced = equalize_luminance(&image);
        assert_eq!(enhanced.dimensions(), (33, 17));
    }

    #[test]
    fn stretches_narrow_ranges() {
        // Two-tone image crammed into a dim band: equalization should
        // push the tones apart.
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([40, 40, 40]));
        image.put_pixel(1, 0, Rgb([60, 60, 60]));

        let enhanced = equalize_luminance(&image);
        let low = enhanced.get_pixel(0, 0).0[0];
        let high = enhanced.get_pixel(1, 0).0[0];
        assert!(high > low);
        assert!(i32::from(high) - i32::from(low) > 20);
    }

    #[test]
    fn empty_image_is_a_noop() {
        let image = RgbImage::new(0, 0);
        let enhanced = equalize_luminance(&image);
        assert_eq!(enhanced.dimensions(), (0, 0));
    }
}
