use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::models::{
    Assignment, Commitment, Partition, Phase, ProposalIndex, ScoresMode, SelectionOutcome, Token,
    WorkDigest,
};

/// Wire names of the oracle calls, used in errors and logs
pub mod calls {
    pub const DEPLOY: &str = "deploy";
    pub const FINALIZE_CREATION: &str = "finalizeCreation";
    pub const SUBMIT_WORK: &str = "submitWork";
    pub const END_SUBMISSION_PHASE: &str = "endSubmissionPhase";
    pub const PROVIDE_PARTITION: &str = "providePartition";
    pub const CREATE_PARTITION: &str = "createPartition";
    pub const PROVIDE_ASSIGNMENTS: &str = "provideAssignments";
    pub const GENERATE_ASSIGNMENTS: &str = "generateAssignments";
    pub const END_ASSIGNMENT_PHASE: &str = "endAssignmentPhase";
    pub const GET_PARTITION: &str = "getPartition";
    pub const GET_ASSIGNMENT_BY_TOKEN: &str = "getAssignmentByToken";
    pub const APPROVE_TOKEN: &str = "approve";
    pub const COMMIT_EVALUATIONS: &str = "commitEvaluations";
    pub const END_COMMITMENT_PHASE: &str = "endCommitmentPhase";
    pub const REVEAL_EVALUATIONS: &str = "revealEvaluations";
    pub const END_REVEAL_PHASE: &str = "endRevealPhase";
    pub const IMPARTIAL_SELECTION: &str = "impartialSelection";
    pub const END_SELECTION_PHASE: &str = "endSelectionPhase";
}

/// Errors returned by the phase-gated ledger
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("{call} is not allowed in phase {phase}")]
    WrongPhase { call: &'static str, phase: Phase },

    #[error("Submission rejected: {0}")]
    InvalidSubmission(String),

    #[error("Unknown token {0}")]
    UnknownToken(Token),

    #[error("Commitment mismatch: stored {stored}, revealed {revealed}")]
    CommitmentMismatch {
        stored: Commitment,
        revealed: Commitment,
    },

    #[error("Call reverted: {0}")]
    Reverted(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Value returned by a state-changing call together with its cost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt<T> {
    pub value: T,
    /// Gas-equivalent cost units consumed by the call
    pub cost: u64,
}

impl<T> Receipt<T> {
    pub fn new(value: T, cost: u64) -> Self {
        Self { value, cost }
    }
}

impl Receipt<()> {
    pub fn ack(cost: u64) -> Self {
        Self { value: (), cost }
    }
}

/// Result of a state-changing oracle call
pub type OracleResult<T> = Result<Receipt<T>, OracleError>;

/// Event emitted when a commitment is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitLog {
    pub token: Token,
    pub commitment: Commitment,
}

/// Event emitted when a reveal has been verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealLog {
    pub commitment: Commitment,
    pub nonce: u64,
    pub assignment: Vec<ProposalIndex>,
    pub evaluation: Vec<u64>,
    pub token: Token,
}

/// The external phase-gated system driving one selection instance.
///
/// Every state-changing call is accepted only in its own phase; the
/// `end_*_phase` calls are the acknowledged transitions. Read-only calls
/// carry no cost.
#[async_trait]
pub trait SelectionOracle: Send + Sync {
    /// Complete instance creation and open the submission phase
    async fn finalize_creation(&self) -> OracleResult<()>;

    /// Submit a work digest and receive a receipt token
    async fn submit_work(&self, work: WorkDigest) -> OracleResult<Token>;

    async fn end_submission_phase(&self) -> OracleResult<()>;

    /// Push a locally computed partition
    async fn provide_partition(&self, partition: &Partition) -> OracleResult<()>;

    /// Ask the oracle to compute a partition into `l` clusters
    async fn create_partition(&self, l: usize) -> OracleResult<()>;

    /// Push a locally computed assignment of `m` reviews per proposal
    async fn provide_assignments(&self, assignment: &Assignment, m: usize) -> OracleResult<()>;

    /// Ask the oracle to compute an assignment with `m` reviews each
    async fn generate_assignments(&self, m: usize) -> OracleResult<()>;

    async fn end_assignment_phase(&self) -> OracleResult<()>;

    async fn get_partition(&self) -> Result<Partition, OracleError>;

    async fn get_assignment_by_token(&self, token: Token)
        -> Result<Vec<ProposalIndex>, OracleError>;

    /// Allow the oracle to take custody of `token` during commitment
    async fn approve_token(&self, token: Token) -> OracleResult<()>;

    async fn commit_evaluations(&self, commitment: Commitment, token: Token)
        -> OracleResult<CommitLog>;

    async fn end_commitment_phase(&self) -> OracleResult<()>;

    /// Disclose the committed triple; the oracle resolves the assignment
    /// from its own state and verifies the digest
    async fn reveal_evaluations(
        &self,
        token: Token,
        nonce: u64,
        evaluation: &[u64],
    ) -> OracleResult<RevealLog>;

    async fn end_reveal_phase(&self) -> OracleResult<()>;

    /// Turn revealed scores into `k` winners
    async fn impartial_selection(&self, k: usize, seed: u64) -> OracleResult<SelectionOutcome>;

    async fn end_selection_phase(&self) -> OracleResult<()>;
}

/// A freshly created oracle instance
pub struct Deployment {
    pub oracle: Arc<dyn SelectionOracle>,
    /// Human-readable address of the instance
    pub address: String,
    pub cost: u64,
}

/// Creates one independent oracle instance per run
#[async_trait]
pub trait OracleProvider: Send + Sync {
    async fn deploy(&self, scores_mode: ScoresMode) -> Result<Deployment, OracleError>;
}
