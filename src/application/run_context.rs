//! State owned by one protocol run.

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::domain::errors::{ProtocolError, ProtocolResult};
use crate::domain::models::{
    Assignment, Commitment, Partition, Phase, Proposal, ProposalIndex, SelectionOutcome, Token,
};
use crate::services::MetricsCollector;

/// Everything a run accumulates between deployment and persistence
///
/// Nonces are drawn from the operating system's CSPRNG when the context
/// is created and never change afterwards.
#[derive(Debug)]
pub struct RunContext {
    phase: Phase,
    nonces: Vec<u64>,
    /// Oracle address of this run's instance
    pub address: Option<String>,
    pub proposals: Vec<Proposal>,
    /// Layout as read back from the oracle
    pub partition: Option<Partition>,
    pub assignment: Option<Assignment>,
    pub evaluations: Vec<Vec<u64>>,
    pub commitments: Vec<Commitment>,
    pub revealed: Vec<ProposalIndex>,
    pub selection: Option<SelectionOutcome>,
    pub selection_error: Option<String>,
    pub metrics: MetricsCollector,
}

impl RunContext {
    pub fn new(n: usize) -> Self {
        let nonces = (0..n).map(|_| OsRng.next_u64()).collect();
        Self {
            phase: Phase::Created,
            nonces,
            address: None,
            proposals: Vec::with_capacity(n),
            partition: None,
            assignment: None,
            evaluations: Vec::with_capacity(n),
            commitments: Vec::with_capacity(n),
            revealed: Vec::new(),
            selection: None,
            selection_error: None,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to `next`; only the immediate successor is accepted
    pub fn advance(&mut self, next: Phase) -> ProtocolResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(ProtocolError::InvalidPhaseTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!(from = %self.phase, to = %next, "run phase advanced");
        self.phase = next;
        Ok(())
    }

    pub fn nonce(&self, proposal: ProposalIndex) -> ProtocolResult<u64> {
        self.nonces
            .get(proposal)
            .copied()
            .ok_or_else(|| missing("nonce", proposal))
    }

    pub fn token(&self, proposal: ProposalIndex) -> ProtocolResult<Token> {
        self.proposals
            .get(proposal)
            .map(|p| p.token)
            .ok_or_else(|| missing("token", proposal))
    }

    pub fn targets(&self, proposal: ProposalIndex) -> ProtocolResult<&[ProposalIndex]> {
        self.assignment
            .as_ref()
            .and_then(|a| a.targets_of(proposal))
            .ok_or_else(|| missing("assignment", proposal))
    }

    pub fn evaluation(&self, proposal: ProposalIndex) -> ProtocolResult<&[u64]> {
        self.evaluations
            .get(proposal)
            .map(Vec::as_slice)
            .ok_or_else(|| missing("evaluation", proposal))
    }

    pub fn commitment(&self, proposal: ProposalIndex) -> ProtocolResult<Commitment> {
        self.commitments
            .get(proposal)
            .copied()
            .ok_or_else(|| missing("commitment", proposal))
    }
}

fn missing(what: &str, proposal: ProposalIndex) -> ProtocolError {
    ProtocolError::RunState(format!("no {what} recorded for proposal {proposal}"))
}
