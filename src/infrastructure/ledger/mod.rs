//! Selection oracle adapters

pub mod in_memory;

pub use in_memory::{CostModel, InMemoryLedger, InMemoryLedgerProvider, LedgerFaults};
