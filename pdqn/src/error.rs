//! Error types for the P-DQN core.
//!
//! Configuration and shape problems are programmer errors and are reported
//! eagerly; numeric failures during a learning step abort the step before any
//! network is replaced.

use crate::checkpoint::CheckpointError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PdqnError>;

/// Error type for agent construction, sampling and training.
#[derive(Debug)]
pub enum PdqnError {
    /// The experience store holds fewer transitions than requested.
    InsufficientData {
        /// Number of transitions requested.
        requested: usize,
        /// Number of transitions currently stored.
        available: usize,
    },
    /// A vector length disagrees with the configured layout.
    ShapeMismatch {
        /// Which value had the wrong shape.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
    /// An action's parameter bounds have `max <= min`.
    DegenerateRange {
        /// Offending discrete action index.
        action: usize,
    },
    /// Invalid configuration value.
    InvalidConfig(String),
    /// A NaN or infinity showed up in a training quantity.
    NonFinite(&'static str),
    /// Autodiff produced no gradient for the parameter probe.
    MissingGradient,
    /// Tensor data could not be read back from the backend.
    Tensor(String),
    /// Failure reported by the environment collaborator.
    Environment(String),
    /// Checkpoint save/load failure.
    Checkpoint(CheckpointError),
}

impl std::fmt::Display for PdqnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdqnError::InsufficientData {
                requested,
                available,
            } => write!(
                f,
                "Insufficient data: requested {} transitions, {} available",
                requested, available
            ),
            PdqnError::ShapeMismatch {
                what,
                expected,
                actual,
            } => write!(
                f,
                "Shape mismatch for {}: expected {}, got {}",
                what, expected, actual
            ),
            PdqnError::DegenerateRange { action } => {
                write!(f, "Degenerate parameter range for action {}", action)
            }
            PdqnError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            PdqnError::NonFinite(what) => write!(f, "Non-finite value in {}", what),
            PdqnError::MissingGradient => write!(f, "No gradient recorded for action parameters"),
            PdqnError::Tensor(msg) => write!(f, "Tensor error: {}", msg),
            PdqnError::Environment(msg) => write!(f, "Environment error: {}", msg),
            PdqnError::Checkpoint(e) => write!(f, "Checkpoint error: {}", e),
        }
    }
}

impl std::error::Error for PdqnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PdqnError::Checkpoint(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CheckpointError> for PdqnError {
    fn from(e: CheckpointError) -> Self {
        PdqnError::Checkpoint(e)
    }
}

impl PdqnError {
    /// Shorthand for a shape mismatch.
    pub fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        PdqnError::ShapeMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Whether this error indicates a configuration/programming mistake
    /// rather than a runtime failure.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PdqnError::ShapeMismatch { .. }
                | PdqnError::DegenerateRange { .. }
                | PdqnError::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PdqnError::InsufficientData {
            requested: 64,
            available: 10,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data: requested 64 transitions, 10 available"
        );

        let err = PdqnError::shape("state", 84, 80);
        assert_eq!(err.to_string(), "Shape mismatch for state: expected 84, got 80");
    }

    #[test]
    fn test_config_error_classification() {
        assert!(PdqnError::DegenerateRange { action: 1 }.is_config_error());
        assert!(PdqnError::InvalidConfig("tau".into()).is_config_error());
        assert!(!PdqnError::NonFinite("td target").is_config_error());
        assert!(!PdqnError::InsufficientData {
            requested: 1,
            available: 0
        }
        .is_config_error());
    }
}
