//! Impartial - peer-review selection protocol driver
//!
//! Proposals are grouped into disjoint clusters, each proposer reviews
//! proposals of other clusters only, evaluations are committed as hashes
//! before they are revealed, and an external selection oracle turns the
//! revealed scores into winners. Every run yields one gas record.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, ports and the error taxonomy
//! - **Service Layer** (`services`): partition and assignment generation,
//!   commitments, metrics, sweeps, evaluators
//! - **Application Layer** (`application`): the per-run phase state machine
//!   and the batch runner
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging,
//!   the in-memory ledger and the JSON result sink
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use impartial::application::ExperimentRunner;
//! use impartial::infrastructure::ledger::InMemoryLedgerProvider;
//! use impartial::infrastructure::sink::JsonFileSink;
//!
//! # async fn demo() -> Result<(), impartial::ProtocolError> {
//! let runner = ExperimentRunner::new(
//!     Arc::new(InMemoryLedgerProvider::new(256, 256)),
//!     Arc::new(JsonFileSink::new("results")),
//! );
//! let summaries = runner.run_paper().await?;
//! assert_eq!(summaries.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{
    ExperimentRunner, ProtocolOrchestrator, RunAborted, RunReport, RunStatus, RunSummary,
};
pub use domain::models::{
    Assignment, Commitment, Config, ExperimentParams, LoggingConfig, MetricsRecord, Partition,
    Phase, RunPlan, ScoresMode, SelectionOutcome,
};
pub use domain::ports::{OracleProvider, ResultSink, SelectionOracle};
pub use domain::{ProtocolError, ProtocolResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AssignmentGenerator, CommitRevealCoordinator, PartitionGenerator};
