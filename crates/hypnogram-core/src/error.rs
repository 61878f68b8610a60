//! Error type for hypnogram analysis.

use thiserror::Error;

/// Errors raised while validating input or configuration.
///
/// Only the first two variants can come out of [`crate::analyze`] once the
/// inputs are constructed; the rest are parse/configuration failures raised
/// before a run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HypnoError {
    /// A LightsOn run that touches neither end of the recording.
    #[error("lights-on epochs can only be at start and end of recording (run starting at epoch {epoch})")]
    StructuralViolation { epoch: usize },
    /// Stage sequence length differs from the caller's epoch count.
    #[error("bad number of stages, {actual} but expecting {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    /// Epoch duration must be finite and positive.
    #[error("invalid epoch duration: {0} seconds")]
    InvalidEpochDuration(f64),
    /// A threshold expressed in minutes is negative or not finite.
    #[error("invalid threshold {name}: {minutes} minutes")]
    InvalidThreshold { name: &'static str, minutes: f64 },
    /// Stage token not recognised by the parser.
    #[error("did not recognize stage '{0}'")]
    UnknownStage(String),
    /// Parameter key not recognised.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    /// Parameter value could not be parsed for its key.
    #[error("invalid value '{value}' for parameter '{key}'")]
    InvalidParameter { key: String, value: String },
}

impl HypnoError {
    /// Stable snake_case name of the variant, used by fixtures and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StructuralViolation { .. } => "structural_violation",
            Self::LengthMismatch { .. } => "length_mismatch",
            Self::InvalidEpochDuration(_) => "invalid_epoch_duration",
            Self::InvalidThreshold { .. } => "invalid_threshold",
            Self::UnknownStage(_) => "unknown_stage",
            Self::UnknownParameter(_) => "unknown_parameter",
            Self::InvalidParameter { .. } => "invalid_parameter",
        }
    }
}

/// Result alias for hypnogram operations.
pub type HypnoResult<T> = Result<T, HypnoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = HypnoError::LengthMismatch {
            expected: 10,
            actual: 9,
        };
        assert_eq!(err.to_string(), "bad number of stages, 9 but expecting 10");

        let err = HypnoError::StructuralViolation { epoch: 5 };
        assert!(err.to_string().contains("epoch 5"));
        assert_eq!(err.kind(), "structural_violation");
    }
}
