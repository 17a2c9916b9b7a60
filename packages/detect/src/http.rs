//! HTTP client for a remote inference service.
//!
//! The detection model runs as a separate service (GPU box or managed
//! endpoint); this client posts a JPEG and gets detections back as JSON.
//! The service contract mirrors [`crate::RawDetection`] plus an optional
//! base64 annotated preview.

use std::io::Cursor;

use image::RgbImage;
use serde::Deserialize;

use crate::{DefectDetector, DetectError, DetectionOutcome, RawDetection};

/// Default inference endpoint. Override with `DETECTOR_URL`.
pub const DEFAULT_DETECTOR_URL: &str = "http://127.0.0.1:9090/detect";

/// Remote detection model client.
pub struct HttpDetector {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    detections: Vec<RawDetection>,
    #[serde(default)]
    annotated_image: Option<String>,
}

impl HttpDetector {
    /// Creates a client for the inference service at `base_url`.
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Creates a client from the `DETECTOR_URL` environment variable.
    #[must_use]
    pub fn from_env(client: reqwest::Client) -> Self {
        let base_url =
            std::env::var("DETECTOR_URL").unwrap_or_else(|_| DEFAULT_DETECTOR_URL.to_string());
        Self::new(client, base_url)
    }

    async fn request(&self, image: &RgbImage, overlay: bool) -> Result<DetectResponse, DetectError> {
        let jpeg = encode_jpeg(image)?;

        let resp = self
            .client
            .post(&self.base_url)
            .query(&[("overlay", if overlay { "true" } else { "false" })])
            .header("content-type", "image/jpeg")
            .body(jpeg)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json().await?)
    }
}

#[async_trait::async_trait]
impl DefectDetector for HttpDetector {
    async fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectError> {
        Ok(self.request(image, false).await?.detections)
    }

    async fn detect_with_overlay(&self, image: &RgbImage) -> Result<DetectionOutcome, DetectError> {
        let resp = self.request(image, true).await?;

        let annotated_jpeg = resp
            .annotated_image
            .as_deref()
            .map(decode_base64_jpeg)
            .transpose()?;

        Ok(DetectionOutcome {
            detections: resp.detections,
            annotated_jpeg,
        })
    }
}

/// Encodes an RGB image as JPEG for the request body.
fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, DetectError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Jpeg)?;
    Ok(buffer.into_inner())
}

/// Decodes the service's base64 annotated preview, tolerating an
/// optional `data:image/jpeg;base64,` prefix.
fn decode_base64_jpeg(encoded: &str) -> Result<Vec<u8>, DetectError> {
    use base64::Engine as _;

    let payload = encoded.rsplit(',').next().unwrap_or(encoded);

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| DetectError::Inference {
            message: format!("Annotated image is not valid base64: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_base64() {
        assert_eq!(decode_base64_jpeg("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn strips_data_url_prefix() {
        let decoded = decode_base64_jpeg("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(decode_base64_jpeg("not base64 !!!").is_err());
    }
}
