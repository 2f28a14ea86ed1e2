//! Domain errors for the impartial selection protocol.

use thiserror::Error;

use super::models::Phase;

/// Errors that can occur while preparing or executing an experiment run.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(
        "Duplicate review required: cluster {cluster} has {available} out-of-cluster proposals but {m} reviews were requested"
    )]
    InfeasibleReviewLoad {
        cluster: usize,
        available: usize,
        m: usize,
    },

    #[error("Submission rejected for proposal {proposal}: {reason}")]
    DuplicateOrEmptySubmission { proposal: usize, reason: String },

    #[error("Oracle rejected {call}: {reason}")]
    OracleRejection { call: &'static str, reason: String },

    #[error("Commitment mismatch for proposal {proposal}: expected {expected}, got {actual}")]
    CommitmentMismatch {
        proposal: usize,
        expected: String,
        actual: String,
    },

    #[error("Selection failed: {0}")]
    SelectionFailure(String),

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: Phase, to: Phase },

    #[error("Result sink error: {0}")]
    Sink(String),

    /// Run-local bookkeeping is inconsistent with the phase being executed
    #[error("Inconsistent run state: {0}")]
    RunState(String),
}

/// Result alias used throughout the protocol layers.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

impl ProtocolError {
    /// Whether this error aborts the run it occurred in.
    ///
    /// Reveal mismatches are per-proposal and selection failures are
    /// recorded as an outcome flag; everything else stops the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::CommitmentMismatch { .. } | Self::SelectionFailure(_)
        )
    }
}
