#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Multi-phase ingestion pipeline.
//!
//! Turns an uploaded photo or video into authoritative, deduplicated
//! incident records. Phases run strictly in order on the calling task:
//!
//! `Received -> Validated -> Geotagged -> Preprocessed -> Enhanced ->
//! Detected -> DedupChecked -> Persisted`
//!
//! Validation and the three processing phases fail the request with the
//! failing phase tagged on the error. Geotagging never blocks: a record
//! created without a usable coordinate simply carries none. Geocoding
//! and image upload degrade gracefully. Persistence failures after a
//! successful detection are logged but do not fail the request - the
//! detections are still useful to the caller.
//!
//! The dedup-check-then-persist sequence takes no locks and is not
//! atomic: two concurrent submissions for the same spot can both pass
//! the check and both create records. Duplicate suppression here is
//! best-effort; merging is on demand via [`Pipeline::boost_priority`].

pub mod error;
pub mod reference;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use image::RgbImage;
use pothole_map_database::RegistryStore;
use pothole_map_database_models::{Coordinate, IncidentRecord, NewIncident};
use pothole_map_detect::{
    classify_detections, DefectDetector, Detection, FrameDecoder, ImageEnhancer,
};
use pothole_map_geocoder::RegionResolver;
use pothole_map_incident_models::{DetectionMethod, IncidentStatus, SeverityTier};
use pothole_map_media::{media_kind, MediaKind};
use pothole_map_r2::ObjectStore;
use pothole_map_spatial::{find_nearby, NearbyIncident, DEDUP_RADIUS_M};

pub use error::{codes, Phase, PipelineError};

/// Identity recorded as the reporter on automatically created records.
pub const SYSTEM_REPORTER: &str = "ai_system";

/// The ingestion pipeline with its injected collaborators.
pub struct Pipeline {
    store: Arc<dyn RegistryStore>,
    detector: Arc<dyn DefectDetector>,
    enhancer: Arc<dyn ImageEnhancer>,
    frame_decoder: Arc<dyn FrameDecoder>,
    regions: Arc<dyn RegionResolver>,
    objects: Option<Arc<dyn ObjectStore>>,
    dedup_radius_m: f64,
}

/// Duplicate candidates found during the dedup check, returned to the
/// caller for confirmation instead of persisting.
#[derive(Debug, Clone)]
pub struct DuplicateCandidates {
    /// The coordinate the check ran against.
    pub location: Coordinate,
    /// Nearby non-`fixed` incidents, closest first.
    pub candidates: Vec<NearbyIncident>,
}

/// Result of a completed single-image analysis.
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    /// Resolved coordinate, if any.
    pub coordinate: Option<Coordinate>,
    /// Whether manual coordinates were substituted for embedded GPS.
    pub detection_method: DetectionMethod,
    /// Detections surviving the noise floor.
    pub detections: Vec<Detection>,
    /// Public URL of the uploaded annotated preview, if any.
    pub annotated_image_url: Option<String>,
    /// Records persisted from this analysis (may be empty when the
    /// image had no usable coordinate or persistence degraded).
    pub created: Vec<IncidentRecord>,
}

/// Outcome of a single-image analysis.
#[derive(Debug, Clone)]
pub enum AnalyzeOutcome {
    /// The pipeline ran to completion.
    Completed(ImageAnalysis),
    /// Duplicates were found; the caller must confirm before anything
    /// is persisted (resubmit with `force_create`, or boost an existing
    /// candidate).
    PendingConfirmation {
        /// The duplicate candidates.
        duplicates: DuplicateCandidates,
        /// Detections surviving the noise floor.
        detections: Vec<Detection>,
        /// Public URL of the uploaded annotated preview, if any.
        annotated_image_url: Option<String>,
    },
}

/// One detection within a processed video, tagged with its frame.
#[derive(Debug, Clone)]
pub struct FrameDetection {
    /// 1-based frame number within the sampled sequence.
    pub frame_number: u64,
    /// The classified detection.
    pub detection: Detection,
}

/// Result of a completed video analysis.
#[derive(Debug, Clone)]
pub struct VideoAnalysis {
    /// Resolved coordinate, if any.
    pub coordinate: Option<Coordinate>,
    /// Whether manual coordinates were substituted for embedded GPS.
    pub detection_method: DetectionMethod,
    /// Number of frames run through detection.
    pub frames_processed: u64,
    /// Total detections across all frames.
    pub total_detections: u64,
    /// Severity-tier histogram across all frames.
    pub summary: BTreeMap<SeverityTier, u64>,
    /// Every detection with its frame number.
    pub detections: Vec<FrameDetection>,
    /// Public URL of the uploaded preview frame, if any.
    pub preview_url: Option<String>,
    /// The aggregate record persisted for this video, when the
    /// detections warranted one.
    pub created: Option<IncidentRecord>,
}

/// A manual report submission.
#[derive(Debug, Clone)]
pub struct ManualReport {
    /// Reported location.
    pub coordinate: Coordinate,
    /// Caller-assessed severity.
    pub severity: SeverityTier,
    /// Free-text description.
    pub description: String,
    /// Reporter identity.
    pub reporter_name: String,
    /// Optional photo: (extension, bytes).
    pub image: Option<(String, Vec<u8>)>,
    /// Bypass the dedup check.
    pub force_create: bool,
}

/// Outcome of a manual report submission.
#[derive(Debug, Clone)]
pub enum ReportOutcome {
    /// The record was created.
    Created(IncidentRecord),
    /// Duplicates were found; nothing was persisted.
    PendingConfirmation(DuplicateCandidates),
}

impl Pipeline {
    /// Wires the pipeline with its collaborators. `objects` is optional:
    /// without an object store, analyses still complete but records
    /// carry no image URL.
    #[must_use]
    pub fn new(
        store: Arc<dyn RegistryStore>,
        detector: Arc<dyn DefectDetector>,
        enhancer: Arc<dyn ImageEnhancer>,
        frame_decoder: Arc<dyn FrameDecoder>,
        regions: Arc<dyn RegionResolver>,
        objects: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self {
            store,
            detector,
            enhancer,
            frame_decoder,
            regions,
            objects,
            dedup_radius_m: DEDUP_RADIUS_M,
        }
    }

    /// Overrides the dedup search radius (meters). Defaults to 25.
    #[must_use]
    pub const fn with_dedup_radius(mut self, radius_m: f64) -> Self {
        self.dedup_radius_m = radius_m;
        self
    }

    /// Analyzes a single image: validate, geotag, preprocess, enhance,
    /// detect, dedup-check, persist.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when validation or one of the
    /// processing phases fails. Dedup candidates are not an error; see
    /// [`AnalyzeOutcome::PendingConfirmation`].
    pub async fn analyze_image(
        &self,
        filename: &str,
        data: &[u8],
        manual_coordinate: Option<Coordinate>,
        force_create: bool,
    ) -> Result<AnalyzeOutcome, PipelineError> {
        log::info!("Starting image analysis for {filename}");

        validate_media(filename, data, MediaKind::Image, codes::IMAGE_MISSING)?;

        let (coordinate, detection_method) = self.geotag(data, manual_coordinate);

        let preprocessed = pothole_map_media::preprocess(data).map_err(|e| {
            PipelineError::Processing {
                phase: Phase::Processing,
                source: Box::new(e),
            }
        })?;

        let enhanced = self.enhance(&preprocessed).await?;

        let outcome = self
            .detector
            .detect_with_overlay(&enhanced)
            .await
            .map_err(|e| PipelineError::Processing {
                phase: Phase::Detection,
                source: Box::new(e),
            })?;
        let detections = classify_detections(outcome.detections);
        log::info!("Found {} detections in {filename}", detections.len());

        let annotated_jpeg = outcome.annotated_jpeg;

        // Dedup check: image path only, skipped without a usable
        // coordinate or detections, and bypassed by force_create.
        if let Some(coordinate) = coordinate
            && !detections.is_empty()
            && !force_create
        {
            let candidates = self.find_duplicates(coordinate).await?;
            if !candidates.is_empty() {
                log::info!(
                    "Found {} incident(s) within {}m; awaiting confirmation",
                    candidates.len(),
                    self.dedup_radius_m
                );
                let annotated_image_url = self
                    .upload_jpeg("annotated", annotated_jpeg.clone())
                    .await;
                return Ok(AnalyzeOutcome::PendingConfirmation {
                    duplicates: DuplicateCandidates {
                        location: coordinate,
                        candidates,
                    },
                    detections,
                    annotated_image_url,
                });
            }
        }

        let mut created = Vec::new();
        let mut annotated_image_url = None;

        if let Some(coordinate) = coordinate {
            if detections.is_empty() {
                log::info!("No detections above the noise floor; nothing to persist");
            } else {
                annotated_image_url = self.upload_jpeg("annotated", annotated_jpeg).await;
                created = self
                    .persist_detections(
                        coordinate,
                        detection_method,
                        &detections,
                        annotated_image_url.clone(),
                    )
                    .await;
            }
        } else {
            log::info!("No valid coordinate found; detections returned without persisting");
        }

        Ok(AnalyzeOutcome::Completed(ImageAnalysis {
            coordinate,
            detection_method,
            detections,
            annotated_image_url,
            created,
        }))
    }

    /// Analyzes a video as an ordered frame sequence. Per-frame
    /// detections are merged into an aggregate count and severity
    /// histogram; a single record is persisted when the aggregate
    /// contains severe detections. The dedup check does not run on the
    /// video path.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when validation, frame extraction, or
    /// any per-frame processing phase fails.
    pub async fn analyze_video(
        &self,
        filename: &str,
        data: &[u8],
        manual_coordinate: Option<Coordinate>,
    ) -> Result<VideoAnalysis, PipelineError> {
        log::info!("Starting video analysis for {filename}");

        validate_media(filename, data, MediaKind::Video, codes::VIDEO_MISSING)?;

        let (coordinate, detection_method) = self.geotag(data, manual_coordinate);

        let extension = pothole_map_media::file_extension(filename);
        let frames = self
            .frame_decoder
            .frames(data, &extension)
            .await
            .map_err(|e| PipelineError::Processing {
                phase: Phase::VideoProcessing,
                source: Box::new(e),
            })?;

        let mut summary: BTreeMap<SeverityTier, u64> = BTreeMap::new();
        let mut all_detections: Vec<FrameDetection> = Vec::new();
        let mut representative_frame: Option<usize> = None;

        // The detection model is a shared, non-reentrant resource:
        // frames run through it sequentially, never fanned out.
        for (index, frame) in frames.iter().enumerate() {
            let prepared = pothole_map_media::cap_dimensions(frame.clone());
            let enhanced = self.enhance(&prepared).await?;

            let raw = self.detector.detect(&enhanced).await.map_err(|e| {
                PipelineError::Processing {
                    phase: Phase::Detection,
                    source: Box::new(e),
                }
            })?;
            let detections = classify_detections(raw);

            if !detections.is_empty() && representative_frame.is_none() {
                representative_frame = Some(index);
            }

            for detection in detections {
                *summary.entry(detection.severity).or_insert(0) += 1;
                all_detections.push(FrameDetection {
                    frame_number: index as u64 + 1,
                    detection,
                });
            }

            if (index + 1) % 30 == 0 {
                log::info!("Processed {}/{} frames", index + 1, frames.len());
            }
        }

        let frames_processed = frames.len() as u64;
        let total_detections = all_detections.len() as u64;
        log::info!(
            "Video processing complete: {total_detections} detections across {frames_processed} frames"
        );

        let critical = summary.get(&SeverityTier::Critical).copied().unwrap_or(0);
        let high = summary.get(&SeverityTier::High).copied().unwrap_or(0);

        let mut preview_url = None;
        let mut created = None;

        if let Some(coordinate) = coordinate
            && critical + high > 0
        {
            // Annotated preview from one representative frame.
            if let Some(index) = representative_frame
                && let Some(frame) = frames.get(index)
            {
                let prepared = pothole_map_media::cap_dimensions(frame.clone());
                if let Ok(outcome) = self.detector.detect_with_overlay(&prepared).await {
                    preview_url = self.upload_jpeg("video_preview", outcome.annotated_jpeg).await;
                }
            }

            let severity = if critical > 0 {
                SeverityTier::Critical
            } else {
                SeverityTier::High
            };

            let incident = NewIncident {
                reference_number: reference::generate_reference(self.store.as_ref()).await?,
                coordinate: Some(coordinate),
                severity,
                confidence: 90.0,
                description: format!(
                    "Video analysis detected {total_detections} potholes across {frames_processed} frames"
                ),
                detection_method,
                reporter: SYSTEM_REPORTER.to_string(),
                region: self
                    .regions
                    .resolve(coordinate.latitude, coordinate.longitude)
                    .await,
                image_url: preview_url.clone(),
            };

            match self.store.create_incident(&incident).await {
                Ok(record) => created = Some(record),
                Err(e) => log::error!("Failed to save video detection: {e}"),
            }
        }

        Ok(VideoAnalysis {
            coordinate,
            detection_method,
            frames_processed,
            total_detections,
            summary,
            detections: all_detections,
            preview_url,
            created,
        })
    }

    /// Submits a manual report: dedup-check, then persist with
    /// caller-supplied severity and description at 100% confidence.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on validation failure or when the
    /// record cannot be persisted (unlike the automatic path, a manual
    /// report without a stored record is worthless to the caller).
    pub async fn submit_manual_report(
        &self,
        report: ManualReport,
    ) -> Result<ReportOutcome, PipelineError> {
        log::info!(
            "Manual report at ({}, {}) from {}",
            report.coordinate.latitude,
            report.coordinate.longitude,
            report.reporter_name
        );

        if !report.coordinate.is_valid() {
            return Err(PipelineError::Validation {
                code: codes::INVALID_FIELD,
                message: "Invalid coordinates".to_string(),
            });
        }
        if report.description.trim().is_empty() || report.reporter_name.trim().is_empty() {
            return Err(PipelineError::Validation {
                code: codes::INVALID_FIELD,
                message: "Missing required fields".to_string(),
            });
        }

        if !report.force_create {
            let candidates = self.find_duplicates(report.coordinate).await?;
            if !candidates.is_empty() {
                log::info!(
                    "Found {} incident(s) within {}m of manual report; awaiting confirmation",
                    candidates.len(),
                    self.dedup_radius_m
                );
                return Ok(ReportOutcome::PendingConfirmation(DuplicateCandidates {
                    location: report.coordinate,
                    candidates,
                }));
            }
        }

        let image_url = match report.image {
            Some((extension, data)) => {
                let name = object_name("pothole", &extension);
                self.upload_object(name, data).await
            }
            None => None,
        };

        let incident = NewIncident {
            reference_number: reference::generate_reference(self.store.as_ref()).await?,
            coordinate: Some(report.coordinate),
            severity: report.severity,
            confidence: 100.0,
            description: report.description,
            detection_method: DetectionMethod::Manual,
            reporter: report.reporter_name,
            region: self
                .regions
                .resolve(report.coordinate.latitude, report.coordinate.longitude)
                .await,
            image_url,
        };

        let record = self.store.create_incident(&incident).await?;
        log::info!("Manual report created as {}", record.reference_number);
        Ok(ReportOutcome::Created(record))
    }

    /// Merges a new observation into an existing record: increments the
    /// priority score by `boost`, appends the reporter, and refreshes
    /// the update timestamp. Severity is not recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] for an unknown id,
    /// [`PipelineError::ImmutableState`] when the record is `fixed`, and
    /// [`PipelineError::Store`] when the update fails.
    pub async fn boost_priority(
        &self,
        id: i64,
        boost: i64,
        reporter: &str,
    ) -> Result<IncidentRecord, PipelineError> {
        let record = self
            .store
            .incident_by_id(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound {
                what: format!("Incident {id}"),
            })?;

        if record.status == IncidentStatus::Fixed {
            return Err(PipelineError::ImmutableState);
        }

        let updated = self
            .store
            .boost_priority(id, boost, reporter)
            .await?
            .ok_or_else(|| PipelineError::NotFound {
                what: format!("Incident {id}"),
            })?;

        log::info!(
            "Incident {id} priority boosted to {} ({} reports)",
            updated.priority_score,
            updated.report_count
        );
        Ok(updated)
    }

    /// `Geotagged` phase: embedded GPS first, then caller-supplied
    /// manual coordinates. Never blocks the pipeline.
    fn geotag(
        &self,
        data: &[u8],
        manual_coordinate: Option<Coordinate>,
    ) -> (Option<Coordinate>, DetectionMethod) {
        if let Some(embedded) = pothole_map_media::exif_gps::extract_gps(data) {
            log::info!(
                "Embedded GPS: ({}, {})",
                embedded.latitude,
                embedded.longitude
            );
            return (Some(embedded), DetectionMethod::Automatic);
        }

        if let Some(manual) = manual_coordinate
            && manual.is_valid()
        {
            log::info!(
                "Using manual coordinates: ({}, {})",
                manual.latitude,
                manual.longitude
            );
            return (Some(manual), DetectionMethod::Manual);
        }

        (None, DetectionMethod::Automatic)
    }

    /// `Enhanced` phase wrapper with its error tag.
    async fn enhance(&self, image: &RgbImage) -> Result<RgbImage, PipelineError> {
        self.enhancer
            .enhance(image)
            .await
            .map_err(|e| PipelineError::Processing {
                phase: Phase::Enhancement,
                source: Box::new(e),
            })
    }

    /// `DedupChecked` phase: candidates from the store, distances from
    /// the spatial engine.
    async fn find_duplicates(
        &self,
        coordinate: Coordinate,
    ) -> Result<Vec<NearbyIncident>, PipelineError> {
        let candidates = self.store.dedup_candidates().await?;
        Ok(find_nearby(coordinate, self.dedup_radius_m, candidates))
    }

    /// `Persisted` phase for the image path: one record per surviving
    /// detection. Individual failures are logged, never fatal.
    async fn persist_detections(
        &self,
        coordinate: Coordinate,
        detection_method: DetectionMethod,
        detections: &[Detection],
        image_url: Option<String>,
    ) -> Vec<IncidentRecord> {
        let region = self
            .regions
            .resolve(coordinate.latitude, coordinate.longitude)
            .await;

        let mut created = Vec::with_capacity(detections.len());

        for detection in detections {
            let reference = match reference::generate_reference(self.store.as_ref()).await {
                Ok(reference) => reference,
                Err(e) => {
                    log::error!("Failed to generate reference code: {e}");
                    continue;
                }
            };

            let confidence_pct = detection.confidence * 100.0;
            let incident = NewIncident {
                reference_number: reference,
                coordinate: Some(coordinate),
                severity: detection.severity,
                confidence: confidence_pct,
                description: format!(
                    "Auto-detected {} pothole ({confidence_pct:.1}% confidence)",
                    detection.severity
                ),
                detection_method,
                reporter: SYSTEM_REPORTER.to_string(),
                region: region.clone(),
                image_url: image_url.clone(),
            };

            match self.store.create_incident(&incident).await {
                Ok(record) => created.push(record),
                Err(e) => log::error!("Failed to save auto-detected pothole: {e}"),
            }
        }

        created
    }

    /// Best-effort JPEG upload; `None` when no object store is wired or
    /// the upload fails.
    async fn upload_jpeg(&self, prefix: &str, jpeg: Option<Vec<u8>>) -> Option<String> {
        let data = jpeg?;
        self.upload_object(object_name(prefix, "jpg"), data).await
    }

    async fn upload_object(&self, name: String, data: Vec<u8>) -> Option<String> {
        let objects = self.objects.as_ref()?;
        match objects.upload(&name, data, "image/jpeg").await {
            Ok(url) => {
                log::info!("Uploaded {name} -> {url}");
                Some(url)
            }
            Err(e) => {
                log::warn!("Failed to upload {name}: {e}");
                None
            }
        }
    }
}

/// Builds a unique object name like `annotated_1a2b3c4d_1767225600.jpg`.
fn object_name(prefix: &str, extension: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{prefix}_{}_{}.{extension}",
        &id[..8],
        Utc::now().timestamp()
    )
}

/// `Validated` phase: non-empty payload with an accepted extension of
/// the expected media kind.
fn validate_media(
    filename: &str,
    data: &[u8],
    expected: MediaKind,
    missing_code: &'static str,
) -> Result<(), PipelineError> {
    if filename.trim().is_empty() {
        return Err(PipelineError::Validation {
            code: missing_code,
            message: "Empty file provided".to_string(),
        });
    }

    if data.is_empty() {
        return Err(PipelineError::Validation {
            code: codes::EMPTY_FILE,
            message: "Empty file provided".to_string(),
        });
    }

    match media_kind(filename) {
        Ok(kind) if kind == expected => Ok(()),
        _ => Err(PipelineError::Validation {
            code: codes::INVALID_FILE_TYPE,
            message: format!("Invalid file type for {filename}"),
        }),
    }
}

#[cfg(test)]
mod tests;
