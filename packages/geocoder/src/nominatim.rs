//! Nominatim / OpenStreetMap reverse geocoder client.
//!
//! See <https://nominatim.org/release-docs/develop/api/Reverse/>
//!
//! In India the mandal/tehsil/taluk level is usually stored in `county`
//! (sometimes `municipality` or a settlement field) in OSM data; the
//! hierarchy is state > district > mandal/tehsil > village/town. The
//! field preference chains below encode that.

use std::time::Duration;

use pothole_map_incident_models::region::RegionTags;
use serde::Deserialize;

use crate::{GEOCODE_TIMEOUT_SECS, GeocodeError};

/// Default public Nominatim instance. Override with `NOMINATIM_BASE_URL`
/// (e.g. a self-hosted mirror without the public rate limits).
pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    state: Option<String>,
    state_district: Option<String>,
    district: Option<String>,
    county: Option<String>,
    municipality: Option<String>,
    town: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    village: Option<String>,
}

/// Reverse-geocodes a coordinate into region tags.
///
/// Carries a bounded timeout ([`GEOCODE_TIMEOUT_SECS`]); the caller is
/// expected to degrade to the static fallback table on error.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request fails, times out, or the
/// response carries no address.
pub async fn reverse_geocode(
    client: &reqwest::Client,
    latitude: f64,
    longitude: f64,
) -> Result<RegionTags, GeocodeError> {
    let base_url = std::env::var("NOMINATIM_BASE_URL")
        .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

    let resp = client
        .get(&base_url)
        .query(&[
            ("lat", latitude.to_string().as_str()),
            ("lon", longitude.to_string().as_str()),
            ("format", "jsonv2"),
            ("accept-language", "en"),
        ])
        .timeout(Duration::from_secs(GEOCODE_TIMEOUT_SECS))
        .send()
        .await?
        .error_for_status()?;

    let body: ReverseResponse = resp.json().await?;

    let address = body.address.ok_or_else(|| GeocodeError::Parse {
        message: format!("No address in reverse geocode response for ({latitude}, {longitude})"),
    })?;

    Ok(region_from_address(&address))
}

/// Maps OSM address components onto the state/district/mandal hierarchy.
fn region_from_address(address: &Address) -> RegionTags {
    let mandal = [
        &address.county,
        &address.municipality,
        &address.town,
        &address.suburb,
        &address.city,
        &address.village,
    ]
    .into_iter()
    .find_map(|field| field.clone())
    .unwrap_or_else(|| "Unknown".to_string());

    let district = address
        .state_district
        .clone()
        .or_else(|| address.district.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let state = address
        .state
        .clone()
        .unwrap_or_else(|| "Unknown".to_string());

    RegionTags {
        state,
        district,
        mandal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_county_for_mandal() {
        let address = Address {
            state: Some("Telangana".to_string()),
            state_district: Some("Hyderabad".to_string()),
            county: Some("Shaikpet".to_string()),
            city: Some("Hyderabad".to_string()),
            ..Address::default()
        };

        let region = region_from_address(&address);
        assert_eq!(region.state, "Telangana");
        assert_eq!(region.district, "Hyderabad");
        assert_eq!(region.mandal, "Shaikpet");
    }

    #[test]
    fn falls_through_mandal_chain() {
        let address = Address {
            state: Some("Karnataka".to_string()),
            district: Some("Bengaluru Urban".to_string()),
            village: Some("Hoskote".to_string()),
            ..Address::default()
        };

        let region = region_from_address(&address);
        assert_eq!(region.district, "Bengaluru Urban");
        assert_eq!(region.mandal, "Hoskote");
    }

    #[test]
    fn missing_fields_become_unknown() {
        let region = region_from_address(&Address::default());
        assert_eq!(region.state, "Unknown");
        assert_eq!(region.district, "Unknown");
        assert_eq!(region.mandal, "Unknown");
    }
}
