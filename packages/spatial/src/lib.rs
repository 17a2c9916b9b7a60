#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geospatial dedup engine.
//!
//! Decides whether a new observation is close enough to an existing
//! incident to be the same physical defect. Given a coordinate and a
//! candidate set, returns the nearby non-`fixed` incidents ordered by
//! great-circle distance. This engine never mutates state: the decision
//! to merge (boost priority, append reporter) versus create anew belongs
//! to the caller.

use pothole_map_database_models::{Coordinate, IncidentRecord};
use pothole_map_incident_models::IncidentStatus;

/// Mean Earth radius in meters, as used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default search radius: two observations within 25 meters are treated
/// as the same physical defect.
pub const DEDUP_RADIUS_M: f64 = 25.0;

/// A candidate incident paired with its distance from the query point.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyIncident {
    /// The candidate record.
    pub incident: IncidentRecord,
    /// Great-circle distance in meters, rounded to 1 decimal place.
    pub distance_m: f64,
}

/// Great-circle distance in meters between two coordinates (haversine).
#[must_use]
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);

    2.0 * h.sqrt().asin() * EARTH_RADIUS_M
}

/// Finds all non-`fixed` candidates within `radius_m` of `origin`,
/// sorted ascending by distance.
///
/// Candidates without a coordinate are skipped. Distances are rounded to
/// 1 decimal place; the sort is stable so equidistant candidates keep
/// their input order.
#[must_use]
pub fn find_nearby(
    origin: Coordinate,
    radius_m: f64,
    candidates: Vec<IncidentRecord>,
) -> Vec<NearbyIncident> {
    let mut nearby: Vec<NearbyIncident> = candidates
        .into_iter()
        .filter(|candidate| candidate.status != IncidentStatus::Fixed)
        .filter_map(|candidate| {
            let coordinate = candidate.coordinate?;
            let distance = haversine_distance(origin, coordinate);
            (distance <= radius_m).then(|| NearbyIncident {
                incident: candidate,
                distance_m: (distance * 10.0).round() / 10.0,
            })
        })
        .collect();

    nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

    log::debug!(
        "Found {} incidents within {radius_m}m of ({}, {})",
        nearby.len(),
        origin.latitude,
        origin.longitude
    );

    nearby
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pothole_map_incident_models::region::RegionTags;
    use pothole_map_incident_models::{DetectionMethod, SeverityTier};

    fn record(id: i64, coordinate: Option<Coordinate>, status: IncidentStatus) -> IncidentRecord {
        IncidentRecord {
            id,
            reference_number: format!("PH-2026-TEST{id:02}"),
            coordinate,
            severity: SeverityTier::High,
            confidence: 90.0,
            description: "test".to_string(),
            status,
            detection_method: DetectionMethod::Automatic,
            priority_score: 1,
            report_count: 1,
            reporters: vec!["ai_system".to_string()],
            region: RegionTags {
                state: "Tamil Nadu".to_string(),
                district: "Chennai".to_string(),
                mandal: "Egmore".to_string(),
            },
            image_url: None,
            reported_date: Utc::now(),
            last_update: Utc::now(),
        }
    }

    #[test]
    fn haversine_equator_reference_points() {
        let origin = Coordinate::new(0.0, 0.0);

        // ~22.2m: inside a 25m radius.
        let inside = haversine_distance(origin, Coordinate::new(0.0, 0.000_200));
        assert!((22.0..23.0).contains(&inside), "got {inside}");

        // ~25.02m: just outside a 25m radius.
        let outside = haversine_distance(origin, Coordinate::new(0.0, 0.000_225));
        assert!(outside > 25.0, "got {outside}");
        assert!(outside < 25.1, "got {outside}");
    }

    #[test]
    fn radius_boundary_classification() {
        let origin = Coordinate::new(0.0, 0.0);
        let candidates = vec![
            record(1, Some(Coordinate::new(0.0, 0.000_225)), IncidentStatus::Reported),
            record(2, Some(Coordinate::new(0.0, 0.000_200)), IncidentStatus::Reported),
        ];

        let nearby = find_nearby(origin, DEDUP_RADIUS_M, candidates);
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].incident.id, 2);
    }

    #[test]
    fn sorted_ascending_by_distance() {
        let origin = Coordinate::new(0.0, 0.0);
        let candidates = vec![
            record(1, Some(Coordinate::new(0.0, 0.000_150)), IncidentStatus::Reported),
            record(2, Some(Coordinate::new(0.0, 0.000_050)), IncidentStatus::Reported),
            record(3, Some(Coordinate::new(0.0, 0.000_100)), IncidentStatus::Reported),
        ];

        let nearby = find_nearby(origin, DEDUP_RADIUS_M, candidates);
        let ids: Vec<i64> = nearby.iter().map(|n| n.incident.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(nearby[0].distance_m < nearby[1].distance_m);
    }

    #[test]
    fn fixed_and_coordinate_less_candidates_are_excluded() {
        let origin = Coordinate::new(0.0, 0.0);
        let candidates = vec![
            record(1, Some(Coordinate::new(0.0, 0.000_050)), IncidentStatus::Fixed),
            record(2, None, IncidentStatus::Reported),
            record(3, Some(Coordinate::new(0.0, 0.000_050)), IncidentStatus::Reported),
        ];

        let nearby = find_nearby(origin, DEDUP_RADIUS_M, candidates);
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].incident.id, 3);
    }

    #[test]
    fn distance_is_rounded_to_one_decimal() {
        let origin = Coordinate::new(0.0, 0.0);
        let candidates = vec![record(
            1,
            Some(Coordinate::new(0.0, 0.000_200)),
            IncidentStatus::Reported,
        )];

        let nearby = find_nearby(origin, DEDUP_RADIUS_M, candidates);
        let distance = nearby[0].distance_m;
        assert!(((distance * 10.0).round() / 10.0 - distance).abs() < f64::EPSILON);
    }
}
