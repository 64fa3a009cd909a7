//! Error types for the orchestration engine
//!
//! Two families, handled differently:
//! - Remote failures (`OperationTimeout`, `OperationFailed`, `ParseFailure`)
//!   are absorbed by the coordinators and converted into deterministic
//!   fallback results; they are logged, never surfaced to lifecycle callers.
//! - Usage errors against the core itself (`SessionNotFound`,
//!   `InvalidTransition`, `NotAFollowup`, `MissingAssessment`) surface
//!   directly and abort the requested operation.

use ecdd_model::{SessionId, TransitionError};
use std::time::Duration;

/// Engine error taxonomy
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Remote operation did not reach a terminal state before the deadline.
    /// The outcome is unknown: the remote side may still complete later.
    #[error("operation timed out after {waited:?}")]
    OperationTimeout { waited: Duration },

    /// Remote operation reached a terminal failure state
    #[error("remote operation failed: {0}")]
    OperationFailed(String),

    /// Remote output held no usable structured payload
    #[error("unparsable remote output: {0}")]
    ParseFailure(String),

    /// No session registered under this id
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Rejected lifecycle transition
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Follow-up operation invoked on a session without parent linkage
    #[error("session {0} is not a follow-up")]
    NotAFollowup(SessionId),

    /// Operation requires an assessment the session does not have
    #[error("session {0} has no assessment")]
    MissingAssessment(SessionId),

    /// Session persistence I/O failure
    #[error("persistence I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Session (de)serialization failure
    #[error("persistence encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the coordinators absorb this error into a fallback result
    /// instead of surfacing it
    #[inline]
    #[must_use]
    pub fn is_absorbed(&self) -> bool {
        matches!(
            self,
            Self::OperationTimeout { .. } | Self::OperationFailed(_) | Self::ParseFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_are_absorbed() {
        assert!(EngineError::OperationTimeout {
            waited: Duration::from_secs(120)
        }
        .is_absorbed());
        assert!(EngineError::OperationFailed("rate limited".to_string()).is_absorbed());
        assert!(EngineError::ParseFailure("no json".to_string()).is_absorbed());
    }

    #[test]
    fn usage_errors_surface() {
        assert!(!EngineError::SessionNotFound(SessionId::new()).is_absorbed());
        assert!(!EngineError::NotAFollowup(SessionId::new()).is_absorbed());
        assert!(!EngineError::MissingAssessment(SessionId::new()).is_absorbed());
    }

    #[test]
    fn display_messages() {
        let err = EngineError::OperationFailed("backend down".to_string());
        assert!(err.to_string().contains("backend down"));
    }
}
