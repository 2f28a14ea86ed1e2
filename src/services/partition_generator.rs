use crate::domain::errors::{ProtocolError, ProtocolResult};
use crate::domain::models::Partition;

/// Service splitting proposals into disjoint review clusters
///
/// Proposals are striped round-robin: cluster `i` receives
/// `{i, i + l, i + 2l, ...}`. Cluster sizes differ by at most one.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionGenerator;

impl PartitionGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Split `n` proposals into `l` clusters
    ///
    /// # Errors
    /// `InvalidConfiguration` unless `1 <= l <= n`
    pub fn generate(&self, n: usize, l: usize) -> ProtocolResult<Partition> {
        if l == 0 || l > n {
            return Err(ProtocolError::InvalidConfiguration(format!(
                "cannot split {n} proposals into {l} clusters"
            )));
        }

        let clusters = (0..l)
            .map(|i| (i..n).step_by(l).collect::<Vec<_>>())
            .collect();

        Partition::new(clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_stripes() {
        let partition = PartitionGenerator::new().generate(8, 4).unwrap();
        assert_eq!(
            partition.clusters(),
            &[vec![0, 4], vec![1, 5], vec![2, 6], vec![3, 7]]
        );
    }

    #[test]
    fn test_uneven_sizes_differ_by_one() {
        let partition = PartitionGenerator::new().generate(11, 3).unwrap();
        assert_eq!(
            partition.clusters(),
            &[vec![0, 3, 6, 9], vec![1, 4, 7, 10], vec![2, 5, 8]]
        );
        assert_eq!(partition.max_cluster_size() - partition.min_cluster_size(), 1);
    }

    #[test]
    fn test_single_cluster_and_singletons() {
        let generator = PartitionGenerator::new();
        assert_eq!(generator.generate(3, 1).unwrap().clusters(), &[vec![0, 1, 2]]);
        assert_eq!(
            generator.generate(3, 3).unwrap().clusters(),
            &[vec![0], vec![1], vec![2]]
        );
    }

    #[test]
    fn test_rejects_out_of_range_cluster_count() {
        let generator = PartitionGenerator::new();
        assert!(matches!(
            generator.generate(4, 0),
            Err(ProtocolError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            generator.generate(4, 5),
            Err(ProtocolError::InvalidConfiguration(_))
        ));
    }
}
