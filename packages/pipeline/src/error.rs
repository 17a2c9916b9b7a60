//! Pipeline error taxonomy.
//!
//! Terminal processing failures surface the failing phase to the caller
//! verbatim. Degraded services (geocoding) never appear here - they are
//! absorbed inside the pipeline. Duplicate candidates are not an error
//! either; they are a control outcome carried in the success type.

use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// The pipeline phase a terminal failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Input validation.
    Validation,
    /// Decode / color-space / resize preprocessing.
    Processing,
    /// Contrast normalization.
    Enhancement,
    /// Model inference.
    Detection,
    /// Video frame extraction and per-frame processing.
    VideoProcessing,
}

/// Stable machine-readable failure codes carried on error responses.
pub mod codes {
    /// No media file was provided.
    pub const IMAGE_MISSING: &str = "IMAGE_MISSING";
    /// No video file was provided.
    pub const VIDEO_MISSING: &str = "VIDEO_MISSING";
    /// The provided file was empty.
    pub const EMPTY_FILE: &str = "EMPTY_FILE";
    /// Extension outside the accepted set.
    pub const INVALID_FILE_TYPE: &str = "INVALID_FILE_TYPE";
    /// A required field was missing or malformed.
    pub const INVALID_FIELD: &str = "INVALID_FIELD";
    /// Preprocessing failed.
    pub const PROCESSING_ERROR: &str = "PROCESSING_ERROR";
    /// Enhancement failed.
    pub const ENHANCEMENT_ERROR: &str = "ENHANCEMENT_ERROR";
    /// Detection failed.
    pub const DETECTION_ERROR: &str = "DETECTION_ERROR";
    /// Record lookup failed.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// Mutation refused: the record is permanently fixed.
    pub const IMMUTABLE: &str = "IMMUTABLE";
    /// Persistence failed.
    pub const STORE_ERROR: &str = "STORE_ERROR";
}

/// Errors from ingestion and registry operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad or missing input; terminal at the `Validated` phase.
    #[error("{message}")]
    Validation {
        /// Stable machine-readable code (see [`codes`]).
        code: &'static str,
        /// Human-readable description.
        message: String,
    },

    /// A terminal processing failure, tagged with the phase it occurred
    /// in and carrying the underlying cause.
    #[error("{phase} failed: {source}")]
    Processing {
        /// Phase the failure occurred in.
        phase: Phase,
        /// Underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The referenced record does not exist.
    #[error("{what} not found")]
    NotFound {
        /// What was looked up (id or reference code).
        what: String,
    },

    /// Mutation attempted on a `fixed` record.
    #[error("Fixed incidents are permanent and cannot be modified")]
    ImmutableState,

    /// The store failed on an operation where persistence is required
    /// (manual report creation, priority boost).
    #[error(transparent)]
    Store(#[from] pothole_map_database::DbError),
}

impl PipelineError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } => *code,
            Self::Processing { phase, .. } => match phase {
                Phase::Validation => codes::INVALID_FIELD,
                Phase::Processing | Phase::VideoProcessing => codes::PROCESSING_ERROR,
                Phase::Enhancement => codes::ENHANCEMENT_ERROR,
                Phase::Detection => codes::DETECTION_ERROR,
            },
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::ImmutableState => codes::IMMUTABLE,
            Self::Store(_) => codes::STORE_ERROR,
        }
    }

    /// Phase tag for this error, when one applies.
    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        match self {
            Self::Validation { .. } => Some(Phase::Validation),
            Self::Processing { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_tags_are_snake_case() {
        assert_eq!(Phase::VideoProcessing.to_string(), "video_processing");
        assert_eq!(Phase::Enhancement.to_string(), "enhancement");
    }

    #[test]
    fn codes_follow_phases() {
        let err = PipelineError::Processing {
            phase: Phase::Detection,
            source: "model exploded".into(),
        };
        assert_eq!(err.code(), codes::DETECTION_ERROR);
        assert_eq!(err.phase(), Some(Phase::Detection));
    }
}
