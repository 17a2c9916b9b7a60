#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reverse geocoding for incident region tags.
//!
//! Converts a coordinate into `state` / `district` / `mandal` region
//! tags using Nominatim / OpenStreetMap, with a bounded request timeout.
//! When the service is unreachable, times out, or returns nothing
//! usable, a static coordinate-range table takes over - region
//! resolution never fails an ingestion request, it only degrades.

pub mod fallback;
pub mod nominatim;

use pothole_map_incident_models::region::RegionTags;
use thiserror::Error;

/// Bound on a single reverse-geocode request. Past this the static
/// fallback table is used instead of failing the request.
pub const GEOCODE_TIMEOUT_SECS: u64 = 10;

/// Errors from the Nominatim client. Absorbed by [`resolve_region`];
/// only surfaced to callers that use [`nominatim::reverse_geocode`]
/// directly.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response did not contain a usable address.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

/// Resolves region tags for a coordinate. Infallible: service errors and
/// timeouts degrade to the static fallback table, logged as warnings.
pub async fn resolve_region(client: &reqwest::Client, latitude: f64, longitude: f64) -> RegionTags {
    match nominatim::reverse_geocode(client, latitude, longitude).await {
        Ok(region) => {
            log::debug!(
                "Geocoded ({latitude}, {longitude}) -> {} / {} / {}",
                region.state,
                region.district,
                region.mandal
            );
            region
        }
        Err(e) => {
            log::warn!("Reverse geocoding degraded for ({latitude}, {longitude}): {e}");
            fallback::region_for_coordinates(latitude, longitude)
        }
    }
}

/// Trait for the geocoding collaborator. Implementations never fail:
/// degraded lookups fall back to the static table.
#[async_trait::async_trait]
pub trait RegionResolver: Send + Sync {
    /// Resolves region tags for a coordinate.
    async fn resolve(&self, latitude: f64, longitude: f64) -> RegionTags;
}

/// Nominatim-backed resolver with static-table degradation.
pub struct NominatimResolver {
    client: reqwest::Client,
}

impl NominatimResolver {
    /// Creates a resolver using the given HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RegionResolver for NominatimResolver {
    async fn resolve(&self, latitude: f64, longitude: f64) -> RegionTags {
        resolve_region(&self.client, latitude, longitude).await
    }
}

/// Offline resolver that only consults the static table. Useful for
/// air-gapped deployments and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticResolver;

#[async_trait::async_trait]
impl RegionResolver for StaticResolver {
    async fn resolve(&self, latitude: f64, longitude: f64) -> RegionTags {
        fallback::region_for_coordinates(latitude, longitude)
    }
}
