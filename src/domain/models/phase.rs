//! Protocol phase state machine.
//!
//! ```text
//! Created → Submission → Partitioning → Assignment → Evaluation
//!         → Commitment → Reveal → Selection → Closed
//! ```
//!
//! Phases only move forward, one step at a time. `Evaluation` is local to
//! the proposers; every other transition is acknowledged by the oracle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A phase of one experiment run.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Oracle instance deployed, not yet finalized
    #[default]
    Created,
    /// Proposals submit work digests and receive tokens
    Submission,
    /// Clusters are provided or computed
    Partitioning,
    /// Review assignments are provided or computed
    Assignment,
    /// Proposers score their review targets (local only)
    Evaluation,
    /// Evaluation digests are committed
    Commitment,
    /// Committed triples are disclosed and checked
    Reveal,
    /// The oracle turns revealed scores into winners
    Selection,
    /// Terminal
    Closed,
}

impl Phase {
    /// Every phase in protocol order.
    pub const ALL: [Phase; 9] = [
        Self::Created,
        Self::Submission,
        Self::Partitioning,
        Self::Assignment,
        Self::Evaluation,
        Self::Commitment,
        Self::Reveal,
        Self::Selection,
        Self::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Submission => "submission",
            Self::Partitioning => "partitioning",
            Self::Assignment => "assignment",
            Self::Evaluation => "evaluation",
            Self::Commitment => "commitment",
            Self::Reveal => "reveal",
            Self::Selection => "selection",
            Self::Closed => "closed",
        }
    }

    /// The phase that follows this one, if any.
    pub fn next(&self) -> Option<Self> {
        let position = Self::ALL.iter().position(|p| p == self)?;
        Self::ALL.get(position + 1).copied()
    }

    pub fn can_transition_to(&self, new_phase: Self) -> bool {
        self.next() == Some(new_phase)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_order() {
        let mut phase = Phase::Created;
        let mut visited = vec![phase];
        while let Some(next) = phase.next() {
            assert!(phase.can_transition_to(next));
            phase = next;
            visited.push(phase);
        }
        assert_eq!(visited, Phase::ALL.to_vec());
        assert!(phase.is_terminal());
    }

    #[test]
    fn test_no_skipping_or_reentry() {
        assert!(!Phase::Submission.can_transition_to(Phase::Assignment));
        assert!(!Phase::Reveal.can_transition_to(Phase::Commitment));
        assert!(!Phase::Reveal.can_transition_to(Phase::Reveal));
        assert!(!Phase::Closed.can_transition_to(Phase::Created));
    }

    #[test]
    fn test_phase_serde() {
        let json = serde_json::to_string(&Phase::Partitioning).unwrap();
        assert_eq!(json, "\"partitioning\"");
        let parsed: Phase = serde_json::from_str("\"reveal\"").unwrap();
        assert_eq!(parsed, Phase::Reveal);
    }
}
