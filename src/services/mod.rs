pub mod assignment_generator;
pub mod commit_reveal;
pub mod evaluator;
pub mod experiment_sweep;
pub mod metrics_collector;
pub mod partition_generator;

pub use assignment_generator::AssignmentGenerator;
pub use commit_reveal::{CommitRevealCoordinator, RevealOutcome};
pub use evaluator::{evaluator_for, Evaluator, FixedEvaluator, SyntheticEvaluator};
pub use experiment_sweep::{ExperimentSweep, SweepIter};
pub use metrics_collector::{keys as gas_keys, MetricsCollector};
pub use partition_generator::PartitionGenerator;
