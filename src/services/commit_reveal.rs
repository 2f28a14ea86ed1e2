//! Commitment digests over (nonce, assignment, evaluation) triples.
//!
//! Encoding (version 1), hashed with SHA-256:
//!
//! ```text
//! "impartial/commitment" 0x00 0x01
//! 0x01 nonce:u64be
//! 0x02 len:u32be assignment[i]:u64be ...
//! 0x03 len:u32be evaluation[i]:u64be ...
//! ```
//!
//! Every field is type-tagged and every sequence length-prefixed, so a
//! triple has exactly one encoding.

use sha2::{Digest, Sha256};

use crate::domain::models::{Commitment, Digest32, ProposalIndex};

const COMMITMENT_DOMAIN: &[u8] = b"impartial/commitment";
const ENCODING_VERSION: u8 = 1;

const TAG_NONCE: u8 = 0x01;
const TAG_ASSIGNMENT: u8 = 0x02;
const TAG_EVALUATION: u8 = 0x03;

/// Result of checking a revealed triple against its commitment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Verified,
    Mismatch {
        expected: Commitment,
        actual: Commitment,
    },
}

/// Stateless builder and checker of commitments
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitRevealCoordinator;

impl CommitRevealCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Canonical byte encoding of a triple
    pub fn encode(nonce: u64, assignment: &[ProposalIndex], evaluation: &[u64]) -> Vec<u8> {
        let mut input = Vec::with_capacity(
            COMMITMENT_DOMAIN.len() + 16 + 8 * (assignment.len() + evaluation.len()),
        );

        input.extend_from_slice(COMMITMENT_DOMAIN);
        input.push(0);
        input.push(ENCODING_VERSION);

        input.push(TAG_NONCE);
        input.extend_from_slice(&nonce.to_be_bytes());

        input.push(TAG_ASSIGNMENT);
        input.extend_from_slice(&(assignment.len() as u32).to_be_bytes());
        for &target in assignment {
            input.extend_from_slice(&(target as u64).to_be_bytes());
        }

        input.push(TAG_EVALUATION);
        input.extend_from_slice(&(evaluation.len() as u32).to_be_bytes());
        for &score in evaluation {
            input.extend_from_slice(&score.to_be_bytes());
        }

        input
    }

    pub fn commit(
        &self,
        nonce: u64,
        assignment: &[ProposalIndex],
        evaluation: &[u64],
    ) -> Commitment {
        let encoded = Self::encode(nonce, assignment, evaluation);
        Digest32(Sha256::digest(&encoded).into())
    }

    /// Recompute the digest of the revealed triple and compare
    pub fn reveal(
        &self,
        commitment: &Commitment,
        nonce: u64,
        assignment: &[ProposalIndex],
        evaluation: &[u64],
    ) -> RevealOutcome {
        let actual = self.commit(nonce, assignment, evaluation);
        if actual == *commitment {
            RevealOutcome::Verified
        } else {
            RevealOutcome::Mismatch {
                expected: *commitment,
                actual,
            }
        }
    }
}
