//! Build errors

use crate::pipeline::BuildStage;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GearError>;

/// Everything that can abort a gear build.
///
/// Every variant names the [`BuildStage`] that failed. Errors are never recovered
/// locally: the first one aborts the whole build and no partial mesh is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GearError {
    /// (InvalidParameter) An input parameter or build setting violates its constraint
    #[error("({stage}) invalid parameter `{parameter}`: {reason}")]
    InvalidParameter {
        stage: BuildStage,
        parameter: &'static str,
        reason: String,
    },
    /// (GeometryInconsistency) A structural checkpoint does not match the count predicted
    /// from the inputs and sampling resolution
    #[error("({stage}) geometry inconsistency in {check}: expected {expected}, found {actual}")]
    GeometryInconsistency {
        stage: BuildStage,
        check: &'static str,
        expected: usize,
        actual: usize,
    },
    /// (DegenerateGeometry) Zero-length edges or zero-area faces survived the weld and
    /// consistency passes
    #[error("({stage}) degenerate geometry: {reason}")]
    DegenerateGeometry { stage: BuildStage, reason: String },
    /// (Cancelled) The caller asked the build to stop; observed at a stage boundary
    #[error("({stage}) build cancelled")]
    Cancelled { stage: BuildStage },
}

impl GearError {
    pub fn invalid(stage: BuildStage, parameter: &'static str, reason: impl Into<String>) -> Self {
        GearError::InvalidParameter {
            stage,
            parameter,
            reason: reason.into(),
        }
    }

    pub const fn inconsistent(
        stage: BuildStage,
        check: &'static str,
        expected: usize,
        actual: usize,
    ) -> Self {
        GearError::GeometryInconsistency {
            stage,
            check,
            expected,
            actual,
        }
    }

    pub fn degenerate(stage: BuildStage, reason: impl Into<String>) -> Self {
        GearError::DegenerateGeometry {
            stage,
            reason: reason.into(),
        }
    }

    /// The stage the build was in when this error was raised.
    pub const fn stage(&self) -> BuildStage {
        match self {
            GearError::InvalidParameter { stage, .. }
            | GearError::GeometryInconsistency { stage, .. }
            | GearError::DegenerateGeometry { stage, .. }
            | GearError::Cancelled { stage } => *stage,
        }
    }

    /// Fail with `GeometryInconsistency` unless `actual == expected`.
    pub fn check_count(
        stage: BuildStage,
        check: &'static str,
        expected: usize,
        actual: usize,
    ) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(GearError::inconsistent(stage, check, expected, actual))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_is_reported_for_every_variant() {
        let errors = [
            GearError::invalid(BuildStage::Validating, "teeth", "must be at least 2"),
            GearError::inconsistent(BuildStage::OutlineAssembled, "outline vertices", 666, 665),
            GearError::degenerate(BuildStage::Beveled, "zero-area face"),
            GearError::Cancelled {
                stage: BuildStage::Extruded,
            },
        ];
        let stages: Vec<BuildStage> = errors.iter().map(GearError::stage).collect();
        assert_eq!(
            stages,
            vec![
                BuildStage::Validating,
                BuildStage::OutlineAssembled,
                BuildStage::Beveled,
                BuildStage::Extruded
            ]
        );
    }

    #[test]
    fn inconsistency_message_carries_counts() {
        let err = GearError::inconsistent(BuildStage::ProfileBuilt, "tooth vertices", 22, 21);
        let message = err.to_string();
        assert!(message.contains("expected 22"), "message was: {message}");
        assert!(message.contains("found 21"), "message was: {message}");
    }

    #[test]
    fn check_count_passes_only_on_equality() {
        assert!(GearError::check_count(BuildStage::Sampling, "flank", 11, 11).is_ok());
        assert_eq!(
            GearError::check_count(BuildStage::Sampling, "flank", 11, 10),
            Err(GearError::inconsistent(BuildStage::Sampling, "flank", 11, 10))
        );
    }
}
