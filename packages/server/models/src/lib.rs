#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the pothole map server.
//!
//! These types are serialized to JSON for the REST API. They are
//! separate from the database row types to allow independent evolution
//! of the API contract. Enum values keep their `snake_case` wire names;
//! field names are `camelCase`.

use chrono::{DateTime, Utc};
use pothole_map_database_models::{Coordinate, IncidentRecord};
use pothole_map_detect::Detection;
use pothole_map_incident_models::{DetectionMethod, IncidentStatus, SeverityTier};
use pothole_map_pipeline::{DuplicateCandidates, FrameDetection};
use pothole_map_priority::{PriorityLevel, RankedIncident};
use pothole_map_spatial::NearbyIncident;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Stable error body: `{ error, code, phase? }`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable description.
    pub error: String,
    /// Stable machine-readable code.
    pub code: String,
    /// Pipeline phase tag, where one applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// A coordinate on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLocation {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl From<Coordinate> for ApiLocation {
    fn from(coordinate: Coordinate) -> Self {
        Self {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
        }
    }
}

/// An incident record as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncident {
    /// Unique incident ID.
    pub id: i64,
    /// Human-shareable tracking code.
    pub reference_number: String,
    /// Latitude, when the record carries a coordinate.
    pub latitude: Option<f64>,
    /// Longitude, when the record carries a coordinate.
    pub longitude: Option<f64>,
    /// Severity tier.
    pub severity: SeverityTier,
    /// Stored confidence percentage (0-100).
    pub confidence: f64,
    /// Free-text description.
    pub description: String,
    /// Lifecycle status.
    pub status: IncidentStatus,
    /// How the incident entered the registry.
    pub detection_method: DetectionMethod,
    /// Accumulated priority score.
    pub priority_score: i64,
    /// Number of merged reports.
    pub report_count: i64,
    /// Ordered reporter identities.
    pub reporters: Vec<String>,
    /// State region tag.
    pub state: String,
    /// District region tag.
    pub district: String,
    /// Mandal region tag.
    pub mandal: String,
    /// Public image URL, if any.
    pub image_url: Option<String>,
    /// First-report timestamp (ISO 8601).
    pub reported_date: DateTime<Utc>,
    /// Last-change timestamp (ISO 8601).
    pub last_update: DateTime<Utc>,
}

impl From<IncidentRecord> for ApiIncident {
    fn from(record: IncidentRecord) -> Self {
        Self {
            id: record.id,
            reference_number: record.reference_number,
            latitude: record.coordinate.map(|c| c.latitude),
            longitude: record.coordinate.map(|c| c.longitude),
            severity: record.severity,
            confidence: record.confidence,
            description: record.description,
            status: record.status,
            detection_method: record.detection_method,
            priority_score: record.priority_score,
            report_count: record.report_count,
            reporters: record.reporters,
            state: record.region.state,
            district: record.region.district,
            mandal: record.region.mandal,
            image_url: record.image_url,
            reported_date: record.reported_date,
            last_update: record.last_update,
        }
    }
}

/// A classified detection on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDetection {
    /// Defect class.
    pub class: String,
    /// Confidence as a fraction in `[0, 1]`.
    pub confidence: f64,
    /// Normalized bounding box `[x1, y1, x2, y2]` in percent.
    pub bbox: [f64; 4],
    /// Derived severity tier.
    pub severity: SeverityTier,
}

impl From<&Detection> for ApiDetection {
    fn from(detection: &Detection) -> Self {
        Self {
            class: detection.class.to_string(),
            confidence: detection.confidence,
            bbox: [
                detection.bbox.x1,
                detection.bbox.y1,
                detection.bbox.x2,
                detection.bbox.y2,
            ],
            severity: detection.severity,
        }
    }
}

/// One duplicate candidate in a `nearby_found` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyCandidate {
    /// Candidate record id.
    pub id: i64,
    /// Distance from the submitted location, e.g. `"12.3m"`.
    pub distance: String,
    /// Candidate severity tier.
    pub severity: SeverityTier,
    /// Candidate description.
    pub description: String,
    /// When the candidate was first reported.
    pub reported_date: DateTime<Utc>,
    /// Candidate's accumulated priority score.
    pub priority_score: i64,
    /// Candidate's merged report count.
    pub report_count: i64,
}

impl From<&NearbyIncident> for NearbyCandidate {
    fn from(nearby: &NearbyIncident) -> Self {
        Self {
            id: nearby.incident.id,
            distance: format!("{}m", nearby.distance_m),
            severity: nearby.incident.severity,
            description: nearby.incident.description.clone(),
            reported_date: nearby.incident.reported_date,
            priority_score: nearby.incident.priority_score,
            report_count: nearby.incident.report_count,
        }
    }
}

/// Query parameters for the analyze endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeQueryParams {
    /// Original filename of the uploaded media (extension matters).
    pub filename: Option<String>,
    /// Manual latitude, used when the media carries no GPS metadata.
    pub manual_latitude: Option<f64>,
    /// Manual longitude, used when the media carries no GPS metadata.
    pub manual_longitude: Option<f64>,
    /// Bypass the duplicate check and create an independent record.
    #[serde(default)]
    pub force_create: bool,
}

/// Successful analyze response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    /// `"success"`.
    pub status: String,
    /// Resolved location, if any.
    pub gps_info: Option<ApiLocation>,
    /// Detections surviving the noise floor.
    pub detections: Vec<ApiDetection>,
    /// Annotated preview URL, if uploaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_image_url: Option<String>,
    /// Records persisted from this analysis.
    pub created: Vec<ApiIncident>,
    /// Wall-clock processing time in seconds.
    pub processing_time: f64,
}

/// Duplicate-candidate analyze/report response - a control outcome, not
/// an error, so clients can present a confirmation UI.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyFoundResponse {
    /// `"nearby_found"`.
    pub status: String,
    /// Human-readable summary.
    pub message: String,
    /// The duplicate candidates, closest first.
    pub nearby_potholes: Vec<NearbyCandidate>,
    /// The submitted location.
    pub location: ApiLocation,
    /// Detections from this submission (empty for manual reports).
    pub detections: Vec<ApiDetection>,
    /// Annotated preview URL, if uploaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_image_url: Option<String>,
}

impl NearbyFoundResponse {
    /// Builds the response from pipeline duplicate candidates.
    #[must_use]
    pub fn from_duplicates(
        duplicates: &DuplicateCandidates,
        detections: &[Detection],
        annotated_image_url: Option<String>,
    ) -> Self {
        Self {
            status: "nearby_found".to_string(),
            message: format!(
                "Found {} pothole(s) within 25 meters",
                duplicates.candidates.len()
            ),
            nearby_potholes: duplicates.candidates.iter().map(Into::into).collect(),
            location: duplicates.location.into(),
            detections: detections.iter().map(Into::into).collect(),
            annotated_image_url,
        }
    }
}

/// One detection within a processed video.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFrameDetection {
    /// 1-based frame number.
    pub frame_number: u64,
    /// The detection.
    #[serde(flatten)]
    pub detection: ApiDetection,
}

impl From<&FrameDetection> for ApiFrameDetection {
    fn from(frame: &FrameDetection) -> Self {
        Self {
            frame_number: frame.frame_number,
            detection: (&frame.detection).into(),
        }
    }
}

/// Video analyze response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnalyzeResponse {
    /// `"success"`.
    pub status: String,
    /// Always `"video"`.
    pub r#type: String,
    /// Resolved location, if any.
    pub gps_info: Option<ApiLocation>,
    /// Total detections across all frames.
    pub total_detections: u64,
    /// Number of frames run through detection.
    pub frames_processed: u64,
    /// Severity-tier histogram.
    pub detection_summary: BTreeMap<SeverityTier, u64>,
    /// Every detection with its frame number.
    pub all_detections: Vec<ApiFrameDetection>,
    /// Preview frame URL, if uploaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_image_url: Option<String>,
    /// The aggregate record persisted for this video, if any.
    pub created: Option<ApiIncident>,
    /// Wall-clock processing time in seconds.
    pub processing_time: f64,
}

/// Manual report request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualReportRequest {
    /// Reported latitude.
    pub latitude: f64,
    /// Reported longitude.
    pub longitude: f64,
    /// Caller-assessed severity tier.
    pub severity: String,
    /// Free-text description.
    pub description: String,
    /// Reporter identity.
    pub reporter_name: String,
    /// Optional photo as base64.
    pub image_base64: Option<String>,
    /// Extension for the optional photo (defaults to `jpg`).
    pub image_extension: Option<String>,
    /// Bypass the duplicate check.
    #[serde(default)]
    pub force_create: bool,
}

/// Manual report success response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    /// `"success"`.
    pub status: String,
    /// Human-readable summary.
    pub message: String,
    /// The created record.
    pub pothole: ApiIncident,
}

/// Query parameters for the incident listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotholesQueryParams {
    /// Minimum reported date (`YYYY-MM-DD` or RFC 3339).
    pub date_from: Option<String>,
    /// Maximum reported date, inclusive (`YYYY-MM-DD` or RFC 3339).
    pub date_to: Option<String>,
}

/// Incident listing response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PotholesResponse {
    /// Visible incidents, newest first.
    pub potholes: Vec<ApiIncident>,
    /// Count of visible incidents.
    pub total_count: usize,
}

/// Status transition request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    /// Target status.
    pub status: String,
}

/// Priority boost (merge) request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityBoostRequest {
    /// Target incident id.
    pub pothole_id: i64,
    /// Score increment (defaults to 1).
    pub priority_boost: Option<i64>,
    /// Reporter to append (defaults to `anonymous`).
    pub reporter_name: Option<String>,
}

/// A ranked incident in the prioritize response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRankedIncident {
    /// The record.
    pub pothole: ApiIncident,
    /// Computed urgency score.
    pub priority_score: f64,
    /// Urgency band.
    pub priority_level: PriorityLevel,
    /// 1-based rank.
    pub priority_rank: u32,
    /// Human repair-window estimate.
    pub estimated_urgency: String,
}

impl From<RankedIncident> for ApiRankedIncident {
    fn from(ranked: RankedIncident) -> Self {
        Self {
            pothole: ranked.incident.into(),
            priority_score: ranked.score,
            priority_level: ranked.level,
            priority_rank: ranked.rank,
            estimated_urgency: format!(
                "{} - {}",
                ranked.level.as_ref(),
                ranked.level.repair_window()
            ),
        }
    }
}

/// Prioritize response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizeResponse {
    /// `"success"`.
    pub status: String,
    /// Records ordered by computed urgency.
    pub prioritized_potholes: Vec<ApiRankedIncident>,
    /// Count of ranked records.
    pub total_count: usize,
    /// Ranking algorithm identifier.
    pub algorithm: String,
}

/// Public landing-page statistics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStats {
    /// All records ever created.
    pub total_detected: usize,
    /// Records marked fixed.
    pub fixed_count: usize,
    /// Records still reported/verified/in-progress.
    pub pending_count: usize,
    /// Mean days from report to fix, over fixed records.
    pub avg_response_days: f64,
}

/// Invitation generation request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationRequest {
    /// Role granted by the code.
    pub role: String,
    /// Jurisdiction granted alongside the role.
    #[serde(default)]
    pub jurisdiction: String,
}

/// An invitation code on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInvitation {
    /// The code itself.
    pub code: String,
    /// Role granted by the code.
    pub role: String,
    /// Jurisdiction granted alongside the role.
    pub jurisdiction: String,
    /// Email of the generating admin.
    pub created_by: String,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Whether the code has been redeemed.
    pub is_used: bool,
    /// Email the code was redeemed by, if any.
    pub used_by: Option<String>,
}

impl From<pothole_map_database_models::InvitationRow> for ApiInvitation {
    fn from(row: pothole_map_database_models::InvitationRow) -> Self {
        Self {
            code: row.code,
            role: row.role,
            jurisdiction: row.jurisdiction,
            created_by: row.created_by,
            expires_at: row.expires_at,
            is_used: row.is_used,
            used_by: row.used_by,
        }
    }
}
