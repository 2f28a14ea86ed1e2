//! Proposal, receipt token and commitment digest types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque receipt handle issued by the oracle for a submitted proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub u64);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 32-byte digest, used both for submitted work and for commitments.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest32(pub [u8; 32]);

impl Digest32 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest32({})", self.short())
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Digest of a submitted piece of work.
pub type WorkDigest = Digest32;

/// Digest binding (nonce, assignment, evaluation) for one proposal.
pub type Commitment = Digest32;

/// A submitted proposal as tracked by the orchestrator for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub index: usize,
    pub work: WorkDigest,
    pub token: Token,
}

impl Proposal {
    /// Work digest for the `index`-th synthetic submission.
    ///
    /// Submissions are labelled `a`, `b`, `c`, ... and hashed; labels past
    /// `z` continue with the decimal index so every digest stays unique.
    pub fn synthetic_work(index: usize) -> WorkDigest {
        let label = if index < 26 {
            char::from(b'a' + index as u8).to_string()
        } else {
            format!("proposal-{index}")
        };
        Digest32(Sha256::digest(label.as_bytes()).into())
    }
}
