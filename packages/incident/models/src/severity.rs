//! Confidence-driven severity classification.
//!
//! The emitted tier is decided purely by the detection confidence:
//! confidence in the detection itself is treated as the dominant urgency
//! signal, overriding the model's class granularity. The class label and
//! bounding-box area still feed a numeric score, but that score is kept
//! for diagnostics only and never changes the tier.

use crate::{DefectClass, SeverityTier};

/// Detections below this confidence are treated as noise and dropped
/// entirely by the detection phase. They never reach classification.
pub const CONFIDENCE_NOISE_FLOOR: f64 = 0.4;

/// A classified detection: the emitted tier plus the diagnostic score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityAssessment {
    /// The severity tier attached to the detection.
    pub tier: SeverityTier,
    /// base severity x area multiplier x confidence multiplier.
    /// Logged for diagnosis; intentionally not used for the tier.
    pub diagnostic_score: f64,
}

/// Classifies a detection into a severity tier.
///
/// `confidence` is a fraction in `[0, 1]`; `area` is the normalized
/// bounding-box area in percent-squared units (width% x height%).
#[must_use]
pub fn classify(class: DefectClass, confidence: f64, area: f64) -> SeverityAssessment {
    let tier = tier_for_confidence(confidence);
    let diagnostic_score = f64::from(class.base_severity())
        * area_multiplier(area)
        * confidence_multiplier(confidence);

    SeverityAssessment {
        tier,
        diagnostic_score,
    }
}

/// Maps confidence to the emitted severity tier. Boundaries are inclusive
/// on the upper tier: 0.85 is `critical`, 0.84 is `high`.
#[must_use]
pub fn tier_for_confidence(confidence: f64) -> SeverityTier {
    if confidence >= 0.85 {
        SeverityTier::Critical
    } else if confidence >= 0.75 {
        SeverityTier::High
    } else if confidence >= 0.50 {
        SeverityTier::Medium
    } else {
        SeverityTier::Low
    }
}

/// Size adjustment: large defects weigh heavier in the diagnostic score.
#[must_use]
pub fn area_multiplier(area: f64) -> f64 {
    if area > 20.0 {
        1.5
    } else if area > 10.0 {
        1.2
    } else if area > 5.0 {
        1.1
    } else {
        1.0
    }
}

/// Confidence adjustment for the diagnostic score, stepped on the same
/// bands as [`tier_for_confidence`].
#[must_use]
pub fn confidence_multiplier(confidence: f64) -> f64 {
    if confidence >= 0.85 {
        4.0
    } else if confidence >= 0.75 {
        3.0
    } else if confidence >= 0.50 {
        2.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_boundary_is_inclusive() {
        assert_eq!(tier_for_confidence(0.84), SeverityTier::High);
        assert_eq!(tier_for_confidence(0.85), SeverityTier::Critical);
    }

    #[test]
    fn high_boundary_is_inclusive() {
        assert_eq!(tier_for_confidence(0.749), SeverityTier::Medium);
        assert_eq!(tier_for_confidence(0.75), SeverityTier::High);
    }

    #[test]
    fn medium_boundary_is_inclusive() {
        assert_eq!(tier_for_confidence(0.49), SeverityTier::Low);
        assert_eq!(tier_for_confidence(0.50), SeverityTier::Medium);
    }

    #[test]
    fn area_multiplier_bands() {
        assert!((area_multiplier(25.0) - 1.5).abs() < f64::EPSILON);
        assert!((area_multiplier(15.0) - 1.2).abs() < f64::EPSILON);
        assert!((area_multiplier(7.0) - 1.1).abs() < f64::EPSILON);
        assert!((area_multiplier(3.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tier_ignores_class_and_area() {
        // A severe class with a huge area still emits `low` when the
        // confidence is in the low band.
        let assessment = classify(DefectClass::SeverePothole, 0.45, 30.0);
        assert_eq!(assessment.tier, SeverityTier::Low);
        // ... while the diagnostic score reflects both: 3 * 1.5 * 1.0.
        assert!((assessment.diagnostic_score - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn diagnostic_score_composition() {
        // 2 (medium class) * 1.2 (area > 10) * 4.0 (confidence >= 0.85)
        let assessment = classify(DefectClass::MediumPothole, 0.9, 12.0);
        assert_eq!(assessment.tier, SeverityTier::Critical);
        assert!((assessment.diagnostic_score - 9.6).abs() < f64::EPSILON);
    }
}
