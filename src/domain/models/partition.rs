//! Partition and assignment value objects.
//!
//! A [`Partition`] splits proposals `0..n` into disjoint clusters; an
//! [`Assignment`] lists, for every proposal, the proposals it reviews.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::errors::{ProtocolError, ProtocolResult};

/// Index of a proposal, `0..n`.
pub type ProposalIndex = usize;

/// An ordered sequence of disjoint clusters covering `0..n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Partition {
    clusters: Vec<Vec<ProposalIndex>>,
}

impl Partition {
    /// Build a partition, checking that the clusters are non-empty,
    /// pairwise disjoint and cover exactly `0..n`.
    pub fn new(clusters: Vec<Vec<ProposalIndex>>) -> ProtocolResult<Self> {
        let partition = Self { clusters };
        partition.validate()?;
        Ok(partition)
    }

    pub fn clusters(&self) -> &[Vec<ProposalIndex>] {
        &self.clusters
    }

    /// Number of clusters, `l`.
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Number of proposals, `n`.
    pub fn proposal_count(&self) -> usize {
        self.clusters.iter().map(Vec::len).sum()
    }

    pub fn max_cluster_size(&self) -> usize {
        self.clusters.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn min_cluster_size(&self) -> usize {
        self.clusters.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// Cluster label of every proposal, indexed by proposal.
    pub fn membership(&self) -> Vec<usize> {
        let mut labels = vec![0; self.proposal_count()];
        for (label, cluster) in self.clusters.iter().enumerate() {
            for &proposal in cluster {
                if let Some(slot) = labels.get_mut(proposal) {
                    *slot = label;
                }
            }
        }
        labels
    }

    pub fn cluster_of(&self, proposal: ProposalIndex) -> Option<usize> {
        self.clusters
            .iter()
            .position(|cluster| cluster.contains(&proposal))
    }

    fn validate(&self) -> ProtocolResult<()> {
        if self.clusters.is_empty() {
            return Err(ProtocolError::InvalidConfiguration(
                "partition must contain at least one cluster".to_string(),
            ));
        }
        let n = self.proposal_count();
        let mut seen = HashSet::with_capacity(n);
        for (label, cluster) in self.clusters.iter().enumerate() {
            if cluster.is_empty() {
                return Err(ProtocolError::InvalidConfiguration(format!(
                    "cluster {label} is empty"
                )));
            }
            for &proposal in cluster {
                if proposal >= n {
                    return Err(ProtocolError::InvalidConfiguration(format!(
                        "proposal {proposal} in cluster {label} is out of range 0..{n}"
                    )));
                }
                if !seen.insert(proposal) {
                    return Err(ProtocolError::InvalidConfiguration(format!(
                        "proposal {proposal} appears in more than one cluster"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Review targets of every proposal, indexed by reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignment {
    reviews: Vec<Vec<ProposalIndex>>,
}

impl Assignment {
    pub fn from_rows(reviews: Vec<Vec<ProposalIndex>>) -> Self {
        Self { reviews }
    }

    pub fn rows(&self) -> &[Vec<ProposalIndex>] {
        &self.reviews
    }

    pub fn targets_of(&self, reviewer: ProposalIndex) -> Option<&[ProposalIndex]> {
        self.reviews.get(reviewer).map(Vec::as_slice)
    }

    pub fn reviewer_count(&self) -> usize {
        self.reviews.len()
    }

    /// How many times each proposal is reviewed.
    pub fn review_load(&self) -> Vec<usize> {
        let mut load = vec![0; self.reviews.len()];
        for targets in &self.reviews {
            for &target in targets {
                if let Some(count) = load.get_mut(target) {
                    *count += 1;
                }
            }
        }
        load
    }

    /// Check the impartiality invariants against `partition`: one row per
    /// proposal, exactly `m` distinct targets per row, and no target from
    /// the reviewer's own cluster.
    pub fn verify(&self, partition: &Partition, m: usize) -> ProtocolResult<()> {
        let n = partition.proposal_count();
        if self.reviews.len() != n {
            return Err(ProtocolError::InvalidConfiguration(format!(
                "assignment has {} rows for {n} proposals",
                self.reviews.len()
            )));
        }
        let membership = partition.membership();
        for (reviewer, targets) in self.reviews.iter().enumerate() {
            if targets.len() != m {
                return Err(ProtocolError::InvalidConfiguration(format!(
                    "proposal {reviewer} has {} review targets, expected {m}",
                    targets.len()
                )));
            }
            let mut distinct = HashSet::with_capacity(m);
            for &target in targets {
                if target >= n {
                    return Err(ProtocolError::InvalidConfiguration(format!(
                        "proposal {reviewer} reviews out-of-range proposal {target}"
                    )));
                }
                if membership[target] == membership[reviewer] {
                    return Err(ProtocolError::InvalidConfiguration(format!(
                        "proposal {reviewer} reviews {target} from its own cluster {}",
                        membership[reviewer]
                    )));
                }
                if !distinct.insert(target) {
                    return Err(ProtocolError::InvalidConfiguration(format!(
                        "proposal {reviewer} reviews {target} more than once"
                    )));
                }
            }
        }
        Ok(())
    }
}
