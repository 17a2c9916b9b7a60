//! Embedded GPS extraction from image metadata.
//!
//! Reads the EXIF GPS IFD (degrees/minutes/seconds rationals plus
//! hemisphere refs) and converts to signed decimal degrees. Absent or
//! invalid metadata yields `None` - the `Geotagged` phase never blocks
//! the pipeline.

use std::io::Cursor;

use exif::{In, Tag, Value};
use pothole_map_database_models::Coordinate;

/// Extracts a validated GPS coordinate from embedded image metadata.
///
/// Returns `None` when the media carries no EXIF data, no GPS IFD, or
/// coordinates outside valid latitude/longitude bounds.
#[must_use]
pub fn extract_gps(data: &[u8]) -> Option<Coordinate> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;

    let latitude = signed_degrees(
        &exif,
        Tag::GPSLatitude,
        Tag::GPSLatitudeRef,
        b'S',
    )?;
    let longitude = signed_degrees(
        &exif,
        Tag::GPSLongitude,
        Tag::GPSLongitudeRef,
        b'W',
    )?;

    let coordinate = Coordinate::new(latitude, longitude);
    if coordinate.is_valid() {
        Some(coordinate)
    } else {
        log::debug!("Discarding out-of-bounds EXIF coordinate ({latitude}, {longitude})");
        None
    }
}

/// Reads one GPS axis: DMS rationals combined into decimal degrees,
/// negated when the hemisphere ref matches `negative_ref`.
fn signed_degrees(
    exif: &exif::Exif,
    value_tag: Tag,
    ref_tag: Tag,
    negative_ref: u8,
) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let degrees = dms_to_degrees(&field.value)?;

    let negative = exif
        .get_field(ref_tag, In::PRIMARY)
        .is_some_and(|field| match &field.value {
            Value::Ascii(parts) => parts
                .first()
                .and_then(|part| part.first())
                .is_some_and(|byte| byte.eq_ignore_ascii_case(&negative_ref)),
            _ => false,
        });

    Some(if negative { -degrees } else { degrees })
}

/// Converts a `[degrees, minutes, seconds]` rational triple to decimal
/// degrees. Tolerates shorter tuples (some devices omit seconds).
fn dms_to_degrees(value: &Value) -> Option<f64> {
    let Value::Rational(parts) = value else {
        return None;
    };

    let degrees = parts.first()?.to_f64();
    let minutes = parts.get(1).map_or(0.0, exif::Rational::to_f64);
    let seconds = parts.get(2).map_or(0.0, exif::Rational::to_f64);

    Some(degrees + minutes / 60.0 + seconds / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::Rational;

    fn rational(num: u32, denom: u32) -> Rational {
        Rational { num, denom }
    }

    #[test]
    fn dms_conversion() {
        let value = Value::Rational(vec![
            rational(12, 1),
            rational(58, 1),
            rational(1260, 100),
        ]);
        let degrees = dms_to_degrees(&value).unwrap();
        assert!((degrees - (12.0 + 58.0 / 60.0 + 12.6 / 3600.0)).abs() < 1e-9);
    }

    #[test]
    fn dms_tolerates_missing_seconds() {
        let value = Value::Rational(vec![rational(77, 1), rational(30, 1)]);
        let degrees = dms_to_degrees(&value).unwrap();
        assert!((degrees - 77.5).abs() < 1e-9);
    }

    #[test]
    fn non_rational_value_is_rejected() {
        assert!(dms_to_degrees(&Value::Byte(vec![1, 2, 3])).is_none());
    }

    #[test]
    fn plain_image_without_exif_yields_none() {
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image::RgbImage::new(8, 8))
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();

        assert!(extract_gps(buffer.get_ref()).is_none());
    }
}
