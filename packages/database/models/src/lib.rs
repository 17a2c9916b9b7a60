#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database row types and query parameter definitions.
//!
//! These types represent the shapes of data as stored in and retrieved
//! from the registry database. They are distinct from the API response
//! types in `pothole_map_server_models` and from the ephemeral detection
//! types in `pothole_map_detect`.

use chrono::{DateTime, Utc};
use pothole_map_incident_models::region::{RegionField, RegionTags};
use pothole_map_incident_models::{DetectionMethod, IncidentStatus, SeverityTier};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a new coordinate from the given decimal degrees.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether the coordinate is within valid latitude/longitude bounds.
    #[must_use]
    pub fn is_valid(self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// An incident record as stored in the `incidents` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Primary key.
    pub id: i64,
    /// Human-shareable tracking code (`PH-<year>-<6 alphanumeric>`).
    pub reference_number: String,
    /// Location, when one could be resolved. Records without a
    /// coordinate are excluded from map displays and dedup checks.
    pub coordinate: Option<Coordinate>,
    /// Severity tier.
    pub severity: SeverityTier,
    /// Detection confidence as a percentage (0-100). Manual reports are
    /// stored at 100.
    pub confidence: f64,
    /// Free-text description.
    pub description: String,
    /// Lifecycle status.
    pub status: IncidentStatus,
    /// How the incident entered the registry.
    pub detection_method: DetectionMethod,
    /// Accumulated priority score; starts at 1 and only ever increases.
    pub priority_score: i64,
    /// Number of reports merged into this record; equals `reporters.len()`.
    pub report_count: i64,
    /// Ordered, append-only list of reporter identities.
    pub reporters: Vec<String>,
    /// Administrative region tags, set once at creation.
    pub region: RegionTags,
    /// Public URL of the (annotated) report image, if uploaded.
    pub image_url: Option<String>,
    /// When the incident was first reported.
    pub reported_date: DateTime<Utc>,
    /// When the record last changed (status or priority).
    pub last_update: DateTime<Utc>,
}

/// Insert shape for a new incident record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncident {
    /// Pre-generated unique reference code.
    pub reference_number: String,
    /// Location, when one could be resolved.
    pub coordinate: Option<Coordinate>,
    /// Severity tier.
    pub severity: SeverityTier,
    /// Detection confidence as a percentage (0-100).
    pub confidence: f64,
    /// Free-text description.
    pub description: String,
    /// How the incident entered the registry.
    pub detection_method: DetectionMethod,
    /// Identity of the first reporter.
    pub reporter: String,
    /// Administrative region tags.
    pub region: RegionTags,
    /// Public URL of the report image, if uploaded.
    pub image_url: Option<String>,
}

/// Parameters for listing incident records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentQuery {
    /// Region-field-equality filter (case-insensitive).
    pub region: Option<RegionEquals>,
    /// Minimum reported date (inclusive).
    pub date_from: Option<DateTime<Utc>>,
    /// Maximum reported date (inclusive - the whole end day is kept).
    pub date_to: Option<DateTime<Utc>>,
}

/// A single region-field-equality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEquals {
    /// Which region field to compare.
    pub field: RegionField,
    /// Value to compare against, case-insensitively.
    pub value: String,
}

/// A user account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    /// Primary key.
    pub id: i64,
    /// Unique email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Role string from the closed role set (parsed by consumers).
    pub role: String,
    /// Region name the account is scoped to, if any.
    pub jurisdiction_area: Option<String>,
    /// Whether the account may authenticate.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a new user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Unique email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Role string from the closed role set.
    pub role: String,
    /// Region name the account is scoped to, if any.
    pub jurisdiction_area: Option<String>,
    /// Opaque bearer token the auth collaborator resolves.
    pub api_token: String,
}

/// An invitation code row for onboarding authority accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationRow {
    /// The code itself (`GOV-<8 alphanumeric>`), primary key.
    pub code: String,
    /// Role granted to the account registered with this code.
    pub role: String,
    /// Jurisdiction area granted alongside the role.
    pub jurisdiction: String,
    /// Email of the admin who generated the code.
    pub created_by: String,
    /// Expiry timestamp (30 days after creation).
    pub expires_at: DateTime<Utc>,
    /// Whether the code has been redeemed.
    pub is_used: bool,
    /// Email the code was redeemed by.
    pub used_by: Option<String>,
    /// When the code was redeemed.
    pub used_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_bounds() {
        assert!(Coordinate::new(12.97, 77.59).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
        assert!(!Coordinate::new(90.1, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
    }
}
