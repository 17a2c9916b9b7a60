//! Static coordinate-range fallback for region resolution.
//!
//! When the geocoding service is unavailable, a small table of known
//! coordinate bounding boxes supplies real region names for the major
//! covered cities, and anything unmapped gets synthesized generic tags
//! so the jurisdiction filter still has something consistent to match.

use pothole_map_incident_models::region::RegionTags;

/// A known region keyed by a coordinate bounding box.
struct RegionBounds {
    lat_min: f64,
    lat_max: f64,
    lng_min: f64,
    lng_max: f64,
    state: &'static str,
    district: &'static str,
    mandal: &'static str,
}

/// Sample coverage for the fallback path.
const REGIONS: &[RegionBounds] = &[
    RegionBounds {
        lat_min: 12.8,
        lat_max: 13.2,
        lng_min: 77.4,
        lng_max: 77.8,
        state: "Karnataka",
        district: "Bengaluru Urban",
        mandal: "Bengaluru",
    },
    RegionBounds {
        lat_min: 28.5,
        lat_max: 28.8,
        lng_min: 77.0,
        lng_max: 77.3,
        state: "Delhi",
        district: "Central Delhi",
        mandal: "Connaught Place",
    },
    RegionBounds {
        lat_min: 12.8,
        lat_max: 13.3,
        lng_min: 79.8,
        lng_max: 80.3,
        state: "Tamil Nadu",
        district: "Chennai",
        mandal: "Egmore",
    },
];

/// Maps a coordinate to region tags without any network access.
///
/// Coordinates inside a known bounding box get that region's names;
/// everything else gets generic `State_<lat>` / `District_<lat>_<lng>` /
/// `Mandal_<lat>_<lng>` tags from the integer-truncated coordinate.
#[must_use]
pub fn region_for_coordinates(latitude: f64, longitude: f64) -> RegionTags {
    for region in REGIONS {
        if (region.lat_min..=region.lat_max).contains(&latitude)
            && (region.lng_min..=region.lng_max).contains(&longitude)
        {
            return RegionTags {
                state: region.state.to_string(),
                district: region.district.to_string(),
                mandal: region.mandal.to_string(),
            };
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let (lat, lng) = (latitude as i64, longitude as i64);
    RegionTags {
        state: format!("State_{lat}"),
        district: format!("District_{lat}_{lng}"),
        mandal: format!("Mandal_{lat}_{lng}"),
    }
}
