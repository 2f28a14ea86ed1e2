//! Domain layer for the impartial selection protocol
//!
//! This module contains the value objects, the error taxonomy and the
//! ports through which the protocol reaches the outside world.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{ProtocolError, ProtocolResult};
