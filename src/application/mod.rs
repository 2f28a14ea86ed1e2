//! Application layer: use-case orchestration over the domain ports

pub mod experiment_runner;
pub mod protocol_orchestrator;
pub mod run_context;

pub use experiment_runner::{ExperimentRunner, RunStatus, RunSummary};
pub use protocol_orchestrator::{ProtocolOrchestrator, RunAborted, RunReport};
pub use run_context::RunContext;
