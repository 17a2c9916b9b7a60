#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Urgency scoring and ranking for incident record sets.
//!
//! Severity dominates the score; stored confidence nudges it. The sort
//! is stable, so records with identical scores keep their original
//! relative order and ranks are reproducible across calls.
//!
//! Ranking is read-only: the accumulated `priority_score` on a record
//! (boosted by merged reports) is a separate counter and is not touched
//! here.

use pothole_map_database_models::IncidentRecord;
use pothole_map_incident_models::SeverityTier;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Urgency bands derived from the computed score.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriorityLevel {
    /// Score >= 90.
    Urgent,
    /// Score >= 70.
    High,
    /// Score >= 50.
    Medium,
    /// Everything below 50.
    Low,
}

impl PriorityLevel {
    /// Band lookup for a computed score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Urgent
        } else if score >= 70.0 {
            Self::High
        } else if score >= 50.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Human repair-window estimate shown alongside the band.
    #[must_use]
    pub const fn repair_window(self) -> &'static str {
        match self {
            Self::Urgent => "Complete within 1 day",
            Self::High => "Complete within 1 week",
            Self::Medium | Self::Low => "Complete within 1 month",
        }
    }
}

/// Base score contribution per severity tier.
#[must_use]
pub const fn severity_base(severity: SeverityTier) -> f64 {
    match severity {
        SeverityTier::Critical => 100.0,
        SeverityTier::High => 75.0,
        SeverityTier::Medium => 50.0,
        SeverityTier::Low => 25.0,
    }
}

/// Computed score: severity base plus a small confidence nudge.
/// `confidence` is the stored percentage (0-100).
#[must_use]
pub fn priority_score(severity: SeverityTier, confidence: f64) -> f64 {
    severity_base(severity) + confidence * 0.2
}

/// A record annotated with its computed urgency and 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedIncident {
    /// The underlying record.
    pub incident: IncidentRecord,
    /// Computed urgency score.
    pub score: f64,
    /// Urgency band.
    pub level: PriorityLevel,
    /// 1-based rank after the descending sort.
    pub rank: u32,
}

/// Ranks a record set by computed urgency, descending.
///
/// The sort is stable: ties keep their input order.
#[must_use]
pub fn prioritize(records: Vec<IncidentRecord>) -> Vec<RankedIncident> {
    let mut ranked: Vec<RankedIncident> = records
        .into_iter()
        .map(|incident| {
            let score = priority_score(incident.severity, incident.confidence);
            RankedIncident {
                score,
                level: PriorityLevel::from_score(score),
                rank: 0,
                incident,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    for (index, entry) in ranked.iter_mut().enumerate() {
        entry.rank = u32::try_from(index + 1).unwrap_or(u32::MAX);
    }

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pothole_map_incident_models::region::RegionTags;
    use pothole_map_incident_models::{DetectionMethod, IncidentStatus};

    fn record(id: i64, severity: SeverityTier, confidence: f64) -> IncidentRecord {
        IncidentRecord {
            id,
            reference_number: format!("PH-2026-RANK{id:02}"),
            coordinate: None,
            severity,
            confidence,
            description: "test".to_string(),
            status: IncidentStatus::Reported,
            detection_method: DetectionMethod::Manual,
            priority_score: 1,
            report_count: 1,
            reporters: vec!["tester".to_string()],
            region: RegionTags {
                state: "Karnataka".to_string(),
                district: "Bengaluru Urban".to_string(),
                mandal: "Bengaluru".to_string(),
            },
            image_url: None,
            reported_date: Utc::now(),
            last_update: Utc::now(),
        }
    }

    #[test]
    fn severity_orders_equal_confidence() {
        let ranked = prioritize(vec![
            record(1, SeverityTier::Low, 80.0),
            record(2, SeverityTier::Critical, 80.0),
            record(3, SeverityTier::Medium, 80.0),
            record(4, SeverityTier::High, 80.0),
        ]);

        let ids: Vec<i64> = ranked.iter().map(|r| r.incident.id).collect();
        assert_eq!(ids, vec![2, 4, 3, 1]);
        assert_eq!(
            ranked.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = prioritize(vec![
            record(10, SeverityTier::High, 60.0),
            record(11, SeverityTier::High, 60.0),
            record(12, SeverityTier::High, 60.0),
        ]);

        let ids: Vec<i64> = ranked.iter().map(|r| r.incident.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);

        // Re-ranking the already-sorted set must not reshuffle ties.
        let again = prioritize(ranked.into_iter().map(|r| r.incident).collect());
        let ids: Vec<i64> = again.iter().map(|r| r.incident.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[test]
    fn level_bands() {
        assert_eq!(PriorityLevel::from_score(90.0), PriorityLevel::Urgent);
        assert_eq!(PriorityLevel::from_score(89.9), PriorityLevel::High);
        assert_eq!(PriorityLevel::from_score(70.0), PriorityLevel::High);
        assert_eq!(PriorityLevel::from_score(50.0), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::from_score(49.9), PriorityLevel::Low);
    }

    #[test]
    fn score_composition() {
        // critical base 100 + 94.2 * 0.2
        let score = priority_score(SeverityTier::Critical, 94.2);
        assert!((score - 118.84).abs() < 1e-9);
        assert_eq!(PriorityLevel::from_score(score), PriorityLevel::Urgent);

        // low base 25 + 100 * 0.2 stays in the low band
        let score = priority_score(SeverityTier::Low, 100.0);
        assert!((score - 45.0).abs() < 1e-9);
        assert_eq!(PriorityLevel::from_score(score), PriorityLevel::Low);
    }
}
