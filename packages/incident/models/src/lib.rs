#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Road defect taxonomy types and severity definitions.
//!
//! This crate defines the canonical defect classes emitted by the detection
//! model, the severity tiers attached to every incident, and the pure
//! severity classification function used by the ingestion pipeline. All
//! other crates in the system consume these shared types.

pub mod region;
pub mod severity;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Severity tier for a detected road defect, from `Low` to `Critical`.
///
/// This is the primary urgency label on an incident record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SeverityTier {
    /// Below the medium confidence band; still above the noise floor.
    Low = 1,
    /// Moderate-confidence detection.
    Medium = 2,
    /// High-confidence detection.
    High = 3,
    /// Very-high-confidence detection requiring urgent attention.
    Critical = 4,
}

impl SeverityTier {
    /// Returns the numeric value of this severity tier.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Medium, Self::High, Self::Critical]
    }
}

/// Lifecycle status of an incident record.
///
/// `Fixed` is terminal: once a record reaches it, no field may change.
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
pub enum IncidentStatus {
    /// Freshly reported, not yet looked at.
    Reported,
    /// Confirmed by an authority.
    Verified,
    /// Repair work underway.
    InProgress,
    /// Repaired. Terminal - the record is immutable from here on.
    Fixed,
}

impl IncidentStatus {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Reported, Self::Verified, Self::InProgress, Self::Fixed]
    }
}

/// How an incident entered the registry.
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
pub enum DetectionMethod {
    /// Reported by a person, or located via caller-supplied coordinates.
    Manual,
    /// Located via embedded media metadata and created by the pipeline.
    Automatic,
}

/// Defect classes emitted by the detection model.
///
/// The model is trained on three pothole classes; anything else it emits
/// maps to [`DefectClass::Unknown`] rather than failing the pipeline.
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
pub enum DefectClass {
    /// Shallow surface break.
    MinorPothole,
    /// Clearly formed pothole.
    MediumPothole,
    /// Deep or wide pothole.
    SeverePothole,
    /// Model class outside the trained taxonomy.
    Unknown,
}

impl DefectClass {
    /// Parses a raw model label, mapping unrecognized labels to
    /// [`DefectClass::Unknown`] instead of erroring.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Self::Unknown)
    }

    /// Base severity score (1-3) for this class, before area and
    /// confidence adjustments.
    #[must_use]
    pub const fn base_severity(self) -> u8 {
        match self {
            Self::MinorPothole => 1,
            Self::MediumPothole | Self::Unknown => 2,
            Self::SeverePothole => 3,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::MinorPothole,
            Self::MediumPothole,
            Self::SeverePothole,
            Self::Unknown,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_tier_ordering() {
        assert!(SeverityTier::Low < SeverityTier::Medium);
        assert!(SeverityTier::Medium < SeverityTier::High);
        assert!(SeverityTier::High < SeverityTier::Critical);
    }

    #[test]
    fn severity_tier_wire_names() {
        assert_eq!(SeverityTier::Critical.to_string(), "critical");
        assert_eq!("in_progress".parse::<IncidentStatus>().unwrap(), IncidentStatus::InProgress);
    }

    #[test]
    fn defect_class_from_label() {
        assert_eq!(
            DefectClass::from_label("severe_pothole"),
            DefectClass::SeverePothole
        );
        assert_eq!(DefectClass::from_label("class_7"), DefectClass::Unknown);
    }

    #[test]
    fn base_severity_in_range() {
        for class in DefectClass::all() {
            let val = class.base_severity();
            assert!((1..=3).contains(&val), "{class:?} base severity {val} out of range");
        }
    }
}
