//! Administrative region vocabulary.
//!
//! Every incident carries a three-level region tag resolved from its
//! coordinate at creation time: state > district > mandal. Mandal is the
//! most granular tag and is what panchayat/municipal administrations
//! filter on.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The three-level administrative region tag on an incident record.
///
/// Set once at creation from the geocoding collaborator; immutable after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTags {
    /// State name.
    pub state: String,
    /// District name.
    pub district: String,
    /// Mandal (tehsil/taluk) name.
    pub mandal: String,
}

impl RegionTags {
    /// Returns the value of the given region field.
    #[must_use]
    pub fn get(&self, field: RegionField) -> &str {
        match field {
            RegionField::State => &self.state,
            RegionField::District => &self.district,
            RegionField::Mandal => &self.mandal,
        }
    }
}

/// One level of the region hierarchy, used to scope jurisdiction filters.
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
pub enum RegionField {
    /// State-level scope.
    State,
    /// District-level scope.
    District,
    /// Mandal-level scope (panchayat/municipal administration).
    Mandal,
}

impl RegionField {
    /// Database column name holding this region field.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::District => "district",
            Self::Mandal => "mandal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_accessor_matches_column() {
        let tags = RegionTags {
            state: "Tamil Nadu".to_string(),
            district: "Chennai".to_string(),
            mandal: "Egmore".to_string(),
        };
        assert_eq!(tags.get(RegionField::State), "Tamil Nadu");
        assert_eq!(tags.get(RegionField::District), "Chennai");
        assert_eq!(tags.get(RegionField::Mandal), "Egmore");
        assert_eq!(RegionField::Mandal.column(), "mandal");
    }
}
