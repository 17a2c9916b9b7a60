#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Detection and enhancement collaborator seams.
//!
//! The detection model, the contrast-normalization filter, and the video
//! frame decoder are external collaborators consumed behind traits. The
//! pipeline depends only on these traits; concrete implementations (the
//! HTTP inference client here, the local enhancer in
//! `pothole_map_media`) are wired in at startup.

pub mod http;

use image::RgbImage;
use pothole_map_incident_models::severity::{self, CONFIDENCE_NOISE_FLOOR};
use pothole_map_incident_models::{DefectClass, SeverityTier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A normalized bounding box with corners in percent coordinates (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge (percent of image width).
    pub x1: f64,
    /// Top edge (percent of image height).
    pub y1: f64,
    /// Right edge (percent of image width).
    pub x2: f64,
    /// Bottom edge (percent of image height).
    pub y2: f64,
}

impl BoundingBox {
    /// Normalized area in percent-squared units (width% x height%).
    #[must_use]
    pub fn area(self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// A raw model detection before severity classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Model class label (e.g. `severe_pothole`).
    pub label: String,
    /// Confidence as a fraction in `[0, 1]`.
    pub confidence: f64,
    /// Normalized bounding box.
    pub bbox: BoundingBox,
}

/// A classified detection as emitted by the `Detected` phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Parsed defect class.
    pub class: DefectClass,
    /// Confidence as a fraction in `[0, 1]`.
    pub confidence: f64,
    /// Normalized bounding box.
    pub bbox: BoundingBox,
    /// Confidence-derived severity tier.
    pub severity: SeverityTier,
}

/// Result of a detection call that also produced an annotated preview.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    /// Raw detections from the model.
    pub detections: Vec<RawDetection>,
    /// JPEG-encoded annotated image, when the model rendered one.
    pub annotated_jpeg: Option<Vec<u8>>,
}

/// Errors from detection, enhancement, or frame decoding collaborators.
#[derive(Debug, Error)]
pub enum DetectError {
    /// HTTP request to the inference service failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Inference service refused or returned garbage.
    #[error("Inference error: {message}")]
    Inference {
        /// Description of the failure.
        message: String,
    },

    /// Image encoding/decoding failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O failure (frame extraction temp files, subprocess).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for the detection model collaborator.
///
/// Implementations must tolerate any RGB image and return an empty list,
/// not an error, when no defects are found.
#[async_trait::async_trait]
pub trait DefectDetector: Send + Sync {
    /// Runs detection on one image or frame.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError`] if the model cannot be invoked at all.
    async fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectError>;

    /// Runs detection and also renders an annotated preview.
    ///
    /// The default implementation detects without a preview; services
    /// that can draw overlays override this.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError`] if the model cannot be invoked at all.
    async fn detect_with_overlay(&self, image: &RgbImage) -> Result<DetectionOutcome, DetectError> {
        Ok(DetectionOutcome {
            detections: self.detect(image).await?,
            annotated_jpeg: None,
        })
    }
}

/// Trait for the contrast-normalization collaborator.
#[async_trait::async_trait]
pub trait ImageEnhancer: Send + Sync {
    /// Returns a contrast-normalized copy of the image, same dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError`] if the filter fails.
    async fn enhance(&self, image: &RgbImage) -> Result<RgbImage, DetectError>;
}

/// Trait for the video frame decoder collaborator.
#[async_trait::async_trait]
pub trait FrameDecoder: Send + Sync {
    /// Decodes a video into an ordered frame sequence.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError`] if the container cannot be decoded.
    async fn frames(&self, data: &[u8], extension: &str) -> Result<Vec<RgbImage>, DetectError>;
}

/// Applies the `Detected` phase filter and classification: detections
/// below the noise floor are dropped entirely; survivors get a severity
/// tier from the confidence-driven classifier.
#[must_use]
pub fn classify_detections(raw: Vec<RawDetection>) -> Vec<Detection> {
    raw.into_iter()
        .filter_map(|detection| {
            if detection.confidence < CONFIDENCE_NOISE_FLOOR {
                log::debug!(
                    "Skipping low confidence detection: class={}, confidence={:.2}",
                    detection.label,
                    detection.confidence
                );
                return None;
            }

            let class = DefectClass::from_label(&detection.label);
            let assessment =
                severity::classify(class, detection.confidence, detection.bbox.area());

            log::debug!(
                "Detection: class={class}, confidence={:.2}, area={:.1}, score={:.2}, severity={}",
                detection.confidence,
                detection.bbox.area(),
                assessment.diagnostic_score,
                assessment.tier
            );

            Some(Detection {
                class,
                confidence: detection.confidence,
                bbox: detection.bbox,
                severity: assessment.tier,
            })
        })
        .collect()
}
