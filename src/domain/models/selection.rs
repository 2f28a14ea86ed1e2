//! Output of the oracle's selection routine.

use serde::{Deserialize, Serialize};

/// Fixed-point scale of scores and probabilities reported by the oracle.
pub const FIXED_POINT_SCALE: u64 = 1_000_000;

/// One candidate allocation of winners across clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAllocation {
    /// Winners drawn from each cluster, indexed by cluster
    pub winners_per_cluster: Vec<u64>,
    /// Probability of this allocation, scaled by [`FIXED_POINT_SCALE`]
    pub probability: u64,
}

/// A selected proposal and its aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub id: u64,
    /// Score scaled by [`FIXED_POINT_SCALE`]
    pub score: u64,
}

/// Everything the selection routine returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    /// Only present in matrix scoring mode
    pub score_matrix: Option<Vec<Vec<u64>>>,
    pub allocations: Vec<ClusterAllocation>,
    pub winners: Vec<Winner>,
}

impl SelectionOutcome {
    pub fn winner_ids(&self) -> Vec<u64> {
        self.winners.iter().map(|w| w.id).collect()
    }
}
