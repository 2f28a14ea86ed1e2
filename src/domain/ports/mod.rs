//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - SelectionOracle: the phase-gated ledger holding one selection instance
//! - OracleProvider: creates a fresh oracle instance per run
//! - ResultSink: persists one record per run
//!
//! These traits define the contracts that allow the protocol to be independent
//! of a specific ledger or storage backend.

pub mod result_sink;
pub mod selection_oracle;

pub use result_sink::{ResultSink, SinkError};
pub use selection_oracle::{
    calls, CommitLog, Deployment, OracleError, OracleProvider, OracleResult, Receipt, RevealLog,
    SelectionOracle,
};
