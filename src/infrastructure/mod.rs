//! Infrastructure layer module
//!
//! This module contains the adapters behind the domain ports and the
//! process-level plumbing:
//! - Configuration management
//! - Logging infrastructure
//! - In-memory phase-gated ledger
//! - JSON file result sink
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod ledger;
pub mod logging;
pub mod sink;
