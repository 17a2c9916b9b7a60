#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Role taxonomy and jurisdiction-based access filtering.
//!
//! Visibility and mutability of incident records are partitioned by the
//! caller's role and jurisdiction area. The role-to-region-field mapping
//! is a closed lookup table so a new role cannot silently bypass
//! filtering: match arms are exhaustive and adding a variant fails to
//! compile until every site decides what it means.

use pothole_map_incident_models::region::{RegionField, RegionTags};
use pothole_map_incident_models::IncidentStatus;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Closed set of account roles.
///
/// The `*_authority` roles manage incident status within a jurisdiction;
/// the `*_admin` roles manage invitation codes for onboarding new
/// authority accounts.
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
pub enum Role {
    /// Ordinary reporter. Sees everything, mutates nothing.
    Citizen,
    /// Panchayat-level administration; scoped to a mandal.
    PanchayathAdmin,
    /// Municipal-level administration; scoped to a mandal.
    MunicipalityAdmin,
    /// District-level authority.
    DistrictAuthority,
    /// State-level authority.
    StateAuthority,
    /// National-level authority; unscoped.
    NationalAuthority,
    /// District-level invitation manager.
    DistrictAdmin,
    /// State-level invitation manager.
    StateAdmin,
    /// National-level invitation manager.
    NationalAdmin,
}

impl Role {
    /// The region field this role's visibility is compared against, or
    /// `None` when no filtering applies (national authority sees
    /// everything; citizens and invitation managers see the public set).
    #[must_use]
    pub const fn jurisdiction_field(self) -> Option<RegionField> {
        match self {
            Self::StateAuthority => Some(RegionField::State),
            Self::DistrictAuthority => Some(RegionField::District),
            Self::PanchayathAdmin | Self::MunicipalityAdmin => Some(RegionField::Mandal),
            Self::Citizen
            | Self::NationalAuthority
            | Self::DistrictAdmin
            | Self::StateAdmin
            | Self::NationalAdmin => None,
        }
    }

    /// Whether this role may transition incident status at all.
    #[must_use]
    pub const fn is_authority(self) -> bool {
        matches!(
            self,
            Self::PanchayathAdmin
                | Self::MunicipalityAdmin
                | Self::DistrictAuthority
                | Self::StateAuthority
                | Self::NationalAuthority
        )
    }

    /// Whether this role may generate, list, and revoke invitation codes.
    #[must_use]
    pub const fn is_invitation_admin(self) -> bool {
        matches!(self, Self::DistrictAdmin | Self::StateAdmin | Self::NationalAdmin)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Citizen,
            Self::PanchayathAdmin,
            Self::MunicipalityAdmin,
            Self::DistrictAuthority,
            Self::StateAuthority,
            Self::NationalAuthority,
            Self::DistrictAdmin,
            Self::StateAdmin,
            Self::NationalAdmin,
        ]
    }
}

/// The authenticated caller, as produced by the auth collaborator.
///
/// Handlers and the pipeline consume only this tuple - never token
/// internals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Account id.
    pub user_id: i64,
    /// Account email, used as the mutation audit identity.
    pub email: String,
    /// Account role.
    pub role: Role,
    /// Region name the account is scoped to, if any.
    pub jurisdiction_area: Option<String>,
}

/// A resolved visibility filter: compare this record field against this
/// value (case-insensitively) when listing incidents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JurisdictionFilter {
    /// Which region field to compare.
    pub field: RegionField,
    /// The caller's jurisdiction area.
    pub area: String,
}

/// Resolves the visibility filter for a caller, if any.
///
/// An unauthenticated caller (`None`) sees the unfiltered set. An
/// authority with no jurisdiction area on file also sees everything:
/// the filter fails open. That permissiveness is preserved deliberately
/// for parity with the deployed system.
#[must_use]
pub fn jurisdiction_filter(caller: Option<&CallerContext>) -> Option<JurisdictionFilter> {
    let caller = caller?;
    let field = caller.role.jurisdiction_field()?;
    let area = caller.jurisdiction_area.as_deref()?.trim();
    if area.is_empty() {
        return None;
    }
    Some(JurisdictionFilter {
        field,
        area: area.to_string(),
    })
}

/// Whether a record's region tags fall inside the caller's visibility.
#[must_use]
pub fn is_visible(caller: Option<&CallerContext>, region: &RegionTags) -> bool {
    jurisdiction_filter(caller)
        .is_none_or(|filter| region_matches(region.get(filter.field), &filter.area))
}

/// Case-insensitive, whitespace-trimmed region comparison.
#[must_use]
pub fn region_matches(record_value: &str, caller_area: &str) -> bool {
    record_value.trim().eq_ignore_ascii_case(caller_area.trim())
}

/// Errors from authorization checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// No valid credentials were presented.
    #[error("Valid token required")]
    Unauthorized,

    /// The caller's role lacks the privilege, or the record is outside
    /// their jurisdiction.
    #[error("{reason}")]
    Forbidden {
        /// Human-readable refusal reason.
        reason: String,
    },

    /// The record is `fixed` and permanently immutable.
    #[error("Fixed incidents are permanent and cannot be modified")]
    ImmutableState,
}

/// Authorizes a status transition on a record.
///
/// Rules, in order: `fixed` records are immutable for everyone; only
/// authority roles may transition status; a non-national authority may
/// only touch records inside their own jurisdiction. An authority with
/// no area on file passes the jurisdiction check (fail-open, as above).
///
/// # Errors
///
/// Returns [`AccessError`] when any rule refuses the transition.
pub fn authorize_status_update(
    caller: &CallerContext,
    status: IncidentStatus,
    region: &RegionTags,
) -> Result<(), AccessError> {
    if status == IncidentStatus::Fixed {
        return Err(AccessError::ImmutableState);
    }

    if !caller.role.is_authority() {
        return Err(AccessError::Forbidden {
            reason: "Only authorities can update incident status".to_string(),
        });
    }

    if let Some(field) = caller.role.jurisdiction_field()
        && let Some(area) = caller.jurisdiction_area.as_deref()
        && !area.trim().is_empty()
        && !region_matches(region.get(field), area)
    {
        return Err(AccessError::Forbidden {
            reason: format!(
                "You can only update incidents in your jurisdiction ({}). This incident is in {}.",
                area.trim(),
                region.get(field)
            ),
        });
    }

    Ok(())
}

/// Authorizes invitation-code management.
///
/// # Errors
///
/// Returns [`AccessError::Forbidden`] unless the caller holds an
/// invitation-admin role.
pub fn authorize_invitation_admin(caller: &CallerContext) -> Result<(), AccessError> {
    if caller.role.is_invitation_admin() {
        Ok(())
    } else {
        Err(AccessError::Forbidden {
            reason: "Insufficient privileges to manage invitation codes".to_string(),
        })
    }
}

/// Trait for the auth collaborator: resolves a bearer token into a
/// [`CallerContext`], or refuses.
#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verifies a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Unauthorized`] for unknown, expired, or
    /// malformed tokens.
    async fn verify(&self, token: &str) -> Result<CallerContext, AccessError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role, area: Option<&str>) -> CallerContext {
        CallerContext {
            user_id: 1,
            email: "authority@example.com".to_string(),
            role,
            jurisdiction_area: area.map(ToString::to_string),
        }
    }

    fn chennai() -> RegionTags {
        RegionTags {
            state: "Tamil Nadu".to_string(),
            district: "Chennai".to_string(),
            mandal: "Egmore".to_string(),
        }
    }

    #[test]
    fn scope_table_is_exhaustive() {
        for role in Role::all() {
            // Every role resolves without panicking; authorities below
            // national level are scoped, everything else is not.
            let field = role.jurisdiction_field();
            match role {
                Role::StateAuthority => assert_eq!(field, Some(RegionField::State)),
                Role::DistrictAuthority => assert_eq!(field, Some(RegionField::District)),
                Role::PanchayathAdmin | Role::MunicipalityAdmin => {
                    assert_eq!(field, Some(RegionField::Mandal));
                }
                _ => assert_eq!(field, None),
            }
        }
    }

    #[test]
    fn district_filter_is_case_insensitive() {
        let caller = caller(Role::DistrictAuthority, Some("chennai"));
        assert!(is_visible(Some(&caller), &chennai()));

        let elsewhere = RegionTags {
            district: "Bengaluru Urban".to_string(),
            ..chennai()
        };
        assert!(!is_visible(Some(&caller), &elsewhere));
    }

    #[test]
    fn national_authority_sees_everything() {
        let caller = caller(Role::NationalAuthority, Some("anything"));
        assert!(jurisdiction_filter(Some(&caller)).is_none());
        assert!(is_visible(Some(&caller), &chennai()));
    }

    #[test]
    fn unauthenticated_sees_everything() {
        assert!(jurisdiction_filter(None).is_none());
        assert!(is_visible(None, &chennai()));
    }

    #[test]
    fn authority_without_area_fails_open() {
        let missing = caller(Role::DistrictAuthority, None);
        assert!(jurisdiction_filter(Some(&missing)).is_none());

        let blank = caller(Role::DistrictAuthority, Some("   "));
        assert!(jurisdiction_filter(Some(&blank)).is_none());
    }

    #[test]
    fn fixed_records_are_immutable_for_everyone() {
        let national = caller(Role::NationalAuthority, None);
        let result = authorize_status_update(&national, IncidentStatus::Fixed, &chennai());
        assert_eq!(result, Err(AccessError::ImmutableState));
    }

    #[test]
    fn citizens_cannot_update_status() {
        let citizen = caller(Role::Citizen, None);
        let result = authorize_status_update(&citizen, IncidentStatus::Reported, &chennai());
        assert!(matches!(result, Err(AccessError::Forbidden { .. })));
    }

    #[test]
    fn jurisdiction_mismatch_is_forbidden() {
        let outsider = caller(Role::DistrictAuthority, Some("Bengaluru Urban"));
        let result = authorize_status_update(&outsider, IncidentStatus::Reported, &chennai());
        assert!(matches!(result, Err(AccessError::Forbidden { .. })));

        let matching = caller(Role::DistrictAuthority, Some(" CHENNAI "));
        assert_eq!(
            authorize_status_update(&matching, IncidentStatus::Reported, &chennai()),
            Ok(())
        );
    }

    #[test]
    fn invitation_admin_gate() {
        assert!(authorize_invitation_admin(&caller(Role::StateAdmin, None)).is_ok());
        assert!(authorize_invitation_admin(&caller(Role::StateAuthority, None)).is_err());
    }
}
