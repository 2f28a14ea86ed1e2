//! Conflict-free review assignment.
//!
//! For every cluster `i` a cyclic stream of cluster labels `0, 1, ..., l-1`
//! (skipping `i`) is cut into chunks of `m` labels, one chunk per member.
//! Each label is then materialized by pulling the next proposal from that
//! cluster through a round-robin pointer shared by all reviewers.
//!
//! No randomness is involved: the same `(partition, m)` always yields the
//! same assignment, which lets a ledger computing it on its own reproduce a
//! locally computed one exactly.

use tracing::debug;

use crate::domain::errors::{ProtocolError, ProtocolResult};
use crate::domain::models::{Assignment, Partition};

/// Service producing reviewer assignments from a partition
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignmentGenerator;

impl AssignmentGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Assign `m` out-of-cluster review targets to every proposal
    ///
    /// # Errors
    /// `InfeasibleReviewLoad` if some cluster has fewer than `m`
    /// proposals outside it. Nothing is produced in that case.
    pub fn generate(&self, partition: &Partition, m: usize) -> ProtocolResult<Assignment> {
        let n = partition.proposal_count();
        let l = partition.cluster_count();

        for (cluster, members) in partition.clusters().iter().enumerate() {
            let available = n - members.len();
            if m > available {
                return Err(ProtocolError::InfeasibleReviewLoad {
                    cluster,
                    available,
                    m,
                });
            }
        }

        let sizes: Vec<usize> = partition.clusters().iter().map(Vec::len).collect();

        // Target-cluster labels for every proposal, indexed by proposal.
        let mut labels: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (own, members) in partition.clusters().iter().enumerate() {
            let stream = label_stream(own, l, m * members.len());
            for (position, &member) in members.iter().enumerate() {
                let mut chunk = stream[position * m..(position + 1) * m].to_vec();
                let moved = rebalance_chunk(&mut chunk, own, &sizes);
                if moved > 0 {
                    debug!(
                        proposal = member,
                        cluster = own,
                        moved,
                        "moved overdrawn review labels"
                    );
                }
                labels[member] = chunk;
            }
        }

        let mut pointers = vec![0usize; l];
        let rows = labels
            .iter()
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|&label| {
                        let members = &partition.clusters()[label];
                        let target = members[pointers[label]];
                        pointers[label] = (pointers[label] + 1) % members.len();
                        target
                    })
                    .collect()
            })
            .collect();

        Ok(Assignment::from_rows(rows))
    }
}

/// Cyclic walk over `0..l` of length `len` that never yields `own`.
fn label_stream(own: usize, l: usize, len: usize) -> Vec<usize> {
    let mut stream = Vec::with_capacity(len);
    let mut j = 0;
    for _ in 0..len {
        if j == own {
            j = (j + 1) % l;
        }
        stream.push(j);
        j = (j + 1) % l;
    }
    stream
}

/// Move occurrences of a label beyond its cluster size onto the next label
/// (cyclically) that still has spare members. Returns how many moved.
///
/// A chunk that already fits is left untouched.
fn rebalance_chunk(chunk: &mut [usize], own: usize, sizes: &[usize]) -> usize {
    let l = sizes.len();
    let mut counts = vec![0usize; l];
    for &label in chunk.iter() {
        counts[label] += 1;
    }
    if counts.iter().zip(sizes).all(|(count, size)| count <= size) {
        return 0;
    }

    let mut used = vec![0usize; l];
    let mut moved = 0;
    for slot in chunk.iter_mut() {
        let label = *slot;
        if used[label] < sizes[label] {
            used[label] += 1;
            continue;
        }
        // Feasibility guarantees some other cluster still has room.
        let spare = (1..l)
            .map(|offset| (label + offset) % l)
            .find(|&alt| alt != own && counts[alt] < sizes[alt]);
        if let Some(alt) = spare {
            counts[label] -= 1;
            counts[alt] += 1;
            used[alt] += 1;
            *slot = alt;
            moved += 1;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::PartitionGenerator;

    fn layout(n: usize, l: usize, m: usize) -> (Partition, ProtocolResult<Assignment>) {
        let partition = PartitionGenerator::new().generate(n, l).unwrap();
        let assignment = AssignmentGenerator::new().generate(&partition, m);
        (partition, assignment)
    }

    #[test]
    fn test_label_stream_skips_own_cluster() {
        assert_eq!(label_stream(0, 4, 4), vec![1, 2, 3, 1]);
        assert_eq!(label_stream(1, 4, 4), vec![0, 2, 3, 0]);
        assert_eq!(label_stream(3, 4, 4), vec![0, 1, 2, 0]);
        assert_eq!(label_stream(0, 2, 3), vec![1, 1, 1]);
    }

    #[test]
    fn test_known_assignment_n8_l4_m2() {
        let (_, assignment) = layout(8, 4, 2);
        assert_eq!(
            assignment.unwrap().rows(),
            &[
                vec![1, 2],
                vec![0, 6],
                vec![4, 5],
                vec![0, 1],
                vec![3, 5],
                vec![7, 4],
                vec![3, 0],
                vec![2, 4],
            ]
        );
    }

    #[test]
    fn test_n12_l3_m3_is_feasible_and_impartial() {
        let (partition, assignment) = layout(12, 3, 3);
        let assignment = assignment.unwrap();
        assert_eq!(assignment.reviewer_count(), 12);
        for reviewer in 0..12 {
            let targets = assignment.targets_of(reviewer).unwrap();
            assert_eq!(targets.len(), 3);
            let own = partition.cluster_of(reviewer);
            assert!(targets.iter().all(|&t| partition.cluster_of(t) != own));
        }
        assignment.verify(&partition, 3).unwrap();
    }

    #[test]
    fn test_n10_l5_boundary() {
        // Five pairs: each proposal has exactly eight out-of-cluster peers.
        let (partition, assignment) = layout(10, 5, 8);
        assignment.unwrap().verify(&partition, 8).unwrap();

        let (_, assignment) = layout(10, 5, 9);
        match assignment {
            Err(ProtocolError::InfeasibleReviewLoad {
                cluster,
                available,
                m,
            }) => {
                assert_eq!(cluster, 0);
                assert_eq!(available, 8);
                assert_eq!(m, 9);
            }
            other => panic!("expected InfeasibleReviewLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_single_cluster_is_infeasible() {
        let (_, assignment) = layout(5, 1, 1);
        assert!(matches!(
            assignment,
            Err(ProtocolError::InfeasibleReviewLoad { available: 0, .. })
        ));
    }

    #[test]
    fn test_overdrawn_chunk_is_rebalanced() {
        // Cluster 2 has three members, but the plain stream hands the
        // second member of cluster 0 four labels pointing at it.
        let sizes = [4, 4, 3];
        let mut chunk = vec![2, 1, 2, 1, 2, 1, 2];
        assert_eq!(rebalance_chunk(&mut chunk, 0, &sizes), 1);
        assert_eq!(chunk, vec![2, 1, 2, 1, 2, 1, 1]);

        let mut fitting = vec![1, 2, 1, 2, 1, 2, 1];
        assert_eq!(rebalance_chunk(&mut fitting, 0, &sizes), 0);
        assert_eq!(fitting, vec![1, 2, 1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_tight_load_yields_distinct_targets() {
        // m == n - max cluster size with uneven clusters
        let (partition, assignment) = layout(11, 3, 7);
        assignment.unwrap().verify(&partition, 7).unwrap();
    }

    #[test]
    fn test_reviews_balanced_within_cluster() {
        let (partition, assignment) = layout(20, 4, 6);
        let load = assignment.unwrap().review_load();
        for cluster in partition.clusters() {
            let loads: Vec<usize> = cluster.iter().map(|&p| load[p]).collect();
            let max = loads.iter().max().unwrap();
            let min = loads.iter().min().unwrap();
            assert!(max - min <= 1, "unbalanced cluster loads {loads:?}");
        }
        assert_eq!(load.iter().sum::<usize>(), 20 * 6);
    }

    #[test]
    fn test_deterministic() {
        let (_, first) = layout(30, 5, 11);
        let (_, second) = layout(30, 5, 11);
        assert_eq!(first.unwrap(), second.unwrap());
    }
}
