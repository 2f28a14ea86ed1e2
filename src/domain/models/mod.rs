pub mod config;
pub mod experiment;
pub mod metrics;
pub mod partition;
pub mod phase;
pub mod proposal;
pub mod selection;

pub use config::{
    Config, EvaluationConfig, LogFormat, LoggingConfig, OutputConfig, RotationPolicy, SweepConfig,
};
pub use experiment::{EvaluationSource, ExperimentParams, LayoutSource, RunPlan, ScoresMode};
pub use metrics::{GasReport, GasValue, MetricsRecord, RecordParams};
pub use partition::{Assignment, Partition, ProposalIndex};
pub use phase::Phase;
pub use proposal::{Commitment, Digest32, Proposal, Token, WorkDigest};
pub use selection::{ClusterAllocation, SelectionOutcome, Winner, FIXED_POINT_SCALE};
