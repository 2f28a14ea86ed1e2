//! Phase-gated selection ledger held in process memory.
//!
//! Behaves like a deployed selection contract: every call is accepted only
//! in its own phase, commitments are checked with the same canonical
//! encoding the orchestrator uses, on-chain layouts come from the same
//! deterministic generators, and every state-changing call is charged a
//! synthetic cost derived from how many storage words it touches.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::domain::models::{
    Assignment, ClusterAllocation, Commitment, ExperimentParams, Partition, Phase, ProposalIndex,
    ScoresMode, SelectionOutcome, Token, Winner, WorkDigest, FIXED_POINT_SCALE,
};
use crate::domain::ports::{
    calls, CommitLog, Deployment, OracleError, OracleProvider, OracleResult, Receipt, RevealLog,
    SelectionOracle,
};
use crate::services::{
    AssignmentGenerator, CommitRevealCoordinator, PartitionGenerator, RevealOutcome,
};

/// Storage word size in bits
const WORD_BITS: u64 = 256;

/// Synthetic cost table, in gas-equivalent units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostModel {
    /// Flat cost of any transaction
    pub call: u64,
    /// Writing a fresh storage word
    pub word_write: u64,
    /// Overwriting an existing storage word
    pub word_update: u64,
    pub word_read: u64,
    /// Hashing one word
    pub hash_word: u64,
    /// One step of on-ledger computation
    pub compute_step: u64,
    pub deployment: u64,
    /// Extra deployment cost of the dense score matrix variant
    pub matrix_deployment: u64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            call: 21_000,
            word_write: 20_000,
            word_update: 5_000,
            word_read: 2_100,
            hash_word: 6,
            compute_step: 50,
            deployment: 3_200_000,
            matrix_deployment: 350_000,
        }
    }
}

impl CostModel {
    pub fn deployment_cost(&self, scores_mode: ScoresMode) -> u64 {
        match scores_mode {
            ScoresMode::Map => self.deployment,
            ScoresMode::Matrix => self.deployment + self.matrix_deployment,
        }
    }
}

/// Faults injected into every ledger a provider deploys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFaults {
    /// Make `impartialSelection` revert
    pub fail_selection: bool,
    /// Make the named call (see [`calls`]) revert
    pub reject_call: Option<&'static str>,
}

/// Number of storage words needed for `count` packed values of `width` bits
fn words(count: usize, width: u16) -> u64 {
    (count as u64 * u64::from(width)).div_ceil(WORD_BITS)
}

#[derive(Debug, Default)]
struct LedgerState {
    phase: Phase,
    works: Vec<WorkDigest>,
    seen: HashSet<WorkDigest>,
    tokens: HashMap<Token, ProposalIndex>,
    partition: Option<Partition>,
    assignment: Option<Assignment>,
    approved: HashSet<Token>,
    commitments: HashMap<ProposalIndex, Commitment>,
    revealed: BTreeMap<ProposalIndex, Vec<u64>>,
}

impl LedgerState {
    fn proposal_of(&self, token: Token) -> Result<ProposalIndex, OracleError> {
        self.tokens
            .get(&token)
            .copied()
            .ok_or(OracleError::UnknownToken(token))
    }

    fn partition(&self) -> Result<&Partition, OracleError> {
        self.partition
            .as_ref()
            .ok_or_else(|| OracleError::Reverted("partition not set".to_string()))
    }

    fn assignment(&self) -> Result<&Assignment, OracleError> {
        self.assignment
            .as_ref()
            .ok_or_else(|| OracleError::Reverted("assignments not set".to_string()))
    }
}

/// In-memory [`SelectionOracle`]
pub struct InMemoryLedger {
    scores_mode: ScoresMode,
    index_width: u16,
    score_width: u16,
    costs: CostModel,
    faults: LedgerFaults,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(
        scores_mode: ScoresMode,
        index_width: u16,
        score_width: u16,
        costs: CostModel,
        faults: LedgerFaults,
    ) -> Self {
        Self {
            scores_mode,
            index_width,
            score_width,
            costs,
            faults,
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    fn check(
        &self,
        state: &LedgerState,
        call: &'static str,
        phase: Phase,
    ) -> Result<(), OracleError> {
        if self.faults.reject_call == Some(call) {
            return Err(OracleError::Reverted(format!("{call} rejected")));
        }
        if state.phase != phase {
            return Err(OracleError::WrongPhase {
                call,
                phase: state.phase,
            });
        }
        Ok(())
    }

    /// Acknowledge an end-of-phase call and move to `next`
    async fn end_phase(&self, call: &'static str, from: Phase, next: Phase) -> OracleResult<()> {
        let mut state = self.state.lock().await;
        self.check(&state, call, from)?;
        state.phase = next;
        debug!(call, phase = %next, "phase ended");
        Ok(Receipt::ack(self.costs.call + self.costs.word_update))
    }

    fn partition_cost(&self, partition: &Partition) -> u64 {
        self.costs.call
            + self.costs.word_write
                * (words(partition.proposal_count(), self.index_width)
                    + partition.cluster_count() as u64)
    }

    fn assignment_cost(&self, assignment: &Assignment) -> u64 {
        let entries: usize = assignment.rows().iter().map(Vec::len).sum();
        self.costs.call + self.costs.word_write * words(entries, self.index_width)
    }

    fn reveal_cost(&self, m: usize) -> u64 {
        let storage = match self.scores_mode {
            ScoresMode::Map => self.costs.word_write * m as u64,
            ScoresMode::Matrix => {
                self.costs.word_write * words(m, self.score_width) + self.costs.word_update
            }
        };
        self.costs.call
            + self.costs.word_read * words(m, self.index_width)
            + self.costs.hash_word * (2 + 2 * m as u64)
            + storage
    }

    fn select(
        &self,
        state: &LedgerState,
        k: usize,
        seed: u64,
    ) -> Result<SelectionOutcome, OracleError> {
        let partition = state.partition()?;
        let assignment = state.assignment()?;
        let n = partition.proposal_count();
        if k == 0 || k > n {
            return Err(OracleError::Reverted(format!("cannot select {k} of {n} proposals")));
        }
        if state.revealed.is_empty() {
            return Err(OracleError::Reverted("no evaluations revealed".to_string()));
        }

        let mut received: Vec<Vec<u64>> = vec![Vec::new(); n];
        let mut matrix = vec![vec![0u64; n]; n];
        for (&reviewer, scores) in &state.revealed {
            let targets = assignment.targets_of(reviewer).unwrap_or_default();
            for (&target, &score) in targets.iter().zip(scores) {
                received[target].push(score);
                matrix[reviewer][target] = score;
            }
        }

        let aggregate: Vec<u64> = received
            .iter()
            .map(|scores| {
                if scores.is_empty() {
                    0
                } else {
                    scores.iter().sum::<u64>() * FIXED_POINT_SCALE / scores.len() as u64
                }
            })
            .collect();

        // Ties are broken by a seed-dependent rotation of proposal ids.
        let rotation = (seed % n as u64) as usize;
        let mut order: Vec<ProposalIndex> = (0..n).collect();
        order.sort_by(|&a, &b| {
            aggregate[b]
                .cmp(&aggregate[a])
                .then(((a + n - rotation) % n).cmp(&((b + n - rotation) % n)))
        });

        let membership = partition.membership();
        let mut winners_per_cluster = vec![0u64; partition.cluster_count()];
        let winners: Vec<Winner> = order
            .into_iter()
            .take(k)
            .map(|id| {
                winners_per_cluster[membership[id]] += 1;
                Winner {
                    id: id as u64,
                    score: aggregate[id],
                }
            })
            .collect();

        Ok(SelectionOutcome {
            score_matrix: match self.scores_mode {
                ScoresMode::Matrix => Some(matrix),
                ScoresMode::Map => None,
            },
            allocations: vec![ClusterAllocation {
                winners_per_cluster,
                probability: FIXED_POINT_SCALE,
            }],
            winners,
        })
    }
}

#[async_trait]
impl SelectionOracle for InMemoryLedger {
    async fn finalize_creation(&self) -> OracleResult<()> {
        let mut state = self.state.lock().await;
        self.check(&state, calls::FINALIZE_CREATION, Phase::Created)?;
        state.phase = Phase::Submission;
        Ok(Receipt::ack(self.costs.call + self.costs.word_write))
    }

    #[instrument(skip(self, work), fields(work = %work.short()))]
    async fn submit_work(&self, work: WorkDigest) -> OracleResult<Token> {
        let mut state = self.state.lock().await;
        self.check(&state, calls::SUBMIT_WORK, Phase::Submission)?;
        if work.is_zero() {
            return Err(OracleError::InvalidSubmission("empty work digest".to_string()));
        }
        if !state.seen.insert(work) {
            return Err(OracleError::InvalidSubmission(format!(
                "work {} already submitted",
                work.short()
            )));
        }
        let index = state.works.len();
        state.works.push(work);
        let token = Token(index as u64 + 1);
        state.tokens.insert(token, index);
        Ok(Receipt::new(
            token,
            self.costs.call + 2 * self.costs.word_write,
        ))
    }

    async fn end_submission_phase(&self) -> OracleResult<()> {
        {
            let state = self.state.lock().await;
            if state.phase == Phase::Submission && state.works.is_empty() {
                return Err(OracleError::Reverted("no proposals submitted".to_string()));
            }
        }
        self.end_phase(calls::END_SUBMISSION_PHASE, Phase::Submission, Phase::Partitioning)
            .await
    }

    async fn provide_partition(&self, partition: &Partition) -> OracleResult<()> {
        let mut state = self.state.lock().await;
        self.check(&state, calls::PROVIDE_PARTITION, Phase::Partitioning)?;
        if partition.proposal_count() != state.works.len() {
            return Err(OracleError::Reverted(format!(
                "partition covers {} proposals, {} submitted",
                partition.proposal_count(),
                state.works.len()
            )));
        }
        let cost = self.partition_cost(partition);
        state.partition = Some(partition.clone());
        state.phase = Phase::Assignment;
        Ok(Receipt::ack(cost))
    }

    async fn create_partition(&self, l: usize) -> OracleResult<()> {
        let mut state = self.state.lock().await;
        self.check(&state, calls::CREATE_PARTITION, Phase::Partitioning)?;
        let n = state.works.len();
        let partition = PartitionGenerator::new()
            .generate(n, l)
            .map_err(|e| OracleError::Reverted(e.to_string()))?;
        let cost = self.partition_cost(&partition) + self.costs.compute_step * n as u64;
        state.partition = Some(partition);
        state.phase = Phase::Assignment;
        Ok(Receipt::ack(cost))
    }

    async fn provide_assignments(&self, assignment: &Assignment, m: usize) -> OracleResult<()> {
        let mut state = self.state.lock().await;
        self.check(&state, calls::PROVIDE_ASSIGNMENTS, Phase::Assignment)?;
        assignment
            .verify(state.partition()?, m)
            .map_err(|e| OracleError::Reverted(e.to_string()))?;
        let cost = self.assignment_cost(assignment);
        state.assignment = Some(assignment.clone());
        Ok(Receipt::ack(cost))
    }

    async fn generate_assignments(&self, m: usize) -> OracleResult<()> {
        let mut state = self.state.lock().await;
        self.check(&state, calls::GENERATE_ASSIGNMENTS, Phase::Assignment)?;
        let assignment = AssignmentGenerator::new()
            .generate(state.partition()?, m)
            .map_err(|e| OracleError::Reverted(e.to_string()))?;
        let steps = (assignment.reviewer_count() * m) as u64;
        let cost = self.assignment_cost(&assignment) + self.costs.compute_step * steps;
        state.assignment = Some(assignment);
        Ok(Receipt::ack(cost))
    }

    async fn end_assignment_phase(&self) -> OracleResult<()> {
        {
            let state = self.state.lock().await;
            if state.phase == Phase::Assignment && state.assignment.is_none() {
                return Err(OracleError::Reverted("assignments not set".to_string()));
            }
        }
        self.end_phase(calls::END_ASSIGNMENT_PHASE, Phase::Assignment, Phase::Commitment)
            .await
    }

    async fn get_partition(&self) -> Result<Partition, OracleError> {
        let state = self.state.lock().await;
        if self.faults.reject_call == Some(calls::GET_PARTITION) {
            return Err(OracleError::Reverted(format!("{} rejected", calls::GET_PARTITION)));
        }
        state.partition().cloned()
    }

    async fn get_assignment_by_token(
        &self,
        token: Token,
    ) -> Result<Vec<ProposalIndex>, OracleError> {
        let state = self.state.lock().await;
        if self.faults.reject_call == Some(calls::GET_ASSIGNMENT_BY_TOKEN) {
            return Err(OracleError::Reverted(format!(
                "{} rejected",
                calls::GET_ASSIGNMENT_BY_TOKEN
            )));
        }
        let index = state.proposal_of(token)?;
        Ok(state
            .assignment()?
            .targets_of(index)
            .map(<[ProposalIndex]>::to_vec)
            .unwrap_or_default())
    }

    async fn approve_token(&self, token: Token) -> OracleResult<()> {
        let mut state = self.state.lock().await;
        self.check(&state, calls::APPROVE_TOKEN, Phase::Commitment)?;
        state.proposal_of(token)?;
        state.approved.insert(token);
        Ok(Receipt::ack(self.costs.call + self.costs.word_write))
    }

    #[instrument(skip(self, commitment), fields(commitment = %commitment.short()))]
    async fn commit_evaluations(
        &self,
        commitment: Commitment,
        token: Token,
    ) -> OracleResult<CommitLog> {
        let mut state = self.state.lock().await;
        self.check(&state, calls::COMMIT_EVALUATIONS, Phase::Commitment)?;
        let index = state.proposal_of(token)?;
        if !state.approved.contains(&token) {
            return Err(OracleError::Reverted(format!("token {token} not approved")));
        }
        if commitment.is_zero() {
            return Err(OracleError::Reverted("empty commitment".to_string()));
        }
        if state.commitments.contains_key(&index) {
            return Err(OracleError::Reverted(format!("token {token} already committed")));
        }
        state.commitments.insert(index, commitment);
        Ok(Receipt::new(
            CommitLog { token, commitment },
            self.costs.call + 2 * self.costs.word_write,
        ))
    }

    async fn end_commitment_phase(&self) -> OracleResult<()> {
        self.end_phase(calls::END_COMMITMENT_PHASE, Phase::Commitment, Phase::Reveal)
            .await
    }

    #[instrument(skip(self, evaluation))]
    async fn reveal_evaluations(
        &self,
        token: Token,
        nonce: u64,
        evaluation: &[u64],
    ) -> OracleResult<RevealLog> {
        let mut state = self.state.lock().await;
        self.check(&state, calls::REVEAL_EVALUATIONS, Phase::Reveal)?;
        let index = state.proposal_of(token)?;
        let stored = *state
            .commitments
            .get(&index)
            .ok_or_else(|| OracleError::Reverted(format!("token {token} has no commitment")))?;
        if state.revealed.contains_key(&index) {
            return Err(OracleError::Reverted(format!("token {token} already revealed")));
        }
        let assignment = state
            .assignment()?
            .targets_of(index)
            .map(<[ProposalIndex]>::to_vec)
            .unwrap_or_default();

        if let RevealOutcome::Mismatch { expected, actual } =
            CommitRevealCoordinator::new().reveal(&stored, nonce, &assignment, evaluation)
        {
            return Err(OracleError::CommitmentMismatch {
                stored: expected,
                revealed: actual,
            });
        }

        let cost = self.reveal_cost(assignment.len());
        state.revealed.insert(index, evaluation.to_vec());
        Ok(Receipt::new(
            RevealLog {
                commitment: stored,
                nonce,
                assignment,
                evaluation: evaluation.to_vec(),
                token,
            },
            cost,
        ))
    }

    async fn end_reveal_phase(&self) -> OracleResult<()> {
        self.end_phase(calls::END_REVEAL_PHASE, Phase::Reveal, Phase::Selection)
            .await
    }

    async fn impartial_selection(&self, k: usize, seed: u64) -> OracleResult<SelectionOutcome> {
        let state = self.state.lock().await;
        self.check(&state, calls::IMPARTIAL_SELECTION, Phase::Selection)?;
        if self.faults.fail_selection {
            return Err(OracleError::Reverted("selection routine failed".to_string()));
        }
        let outcome = self.select(&state, k, seed)?;

        let n = state.works.len();
        let l = state.partition()?.cluster_count();
        let reads = match self.scores_mode {
            ScoresMode::Matrix => n as u64 * words(n, self.score_width),
            ScoresMode::Map => state.revealed.values().map(Vec::len).sum::<usize>() as u64,
        };
        let cost = self.costs.call
            + self.costs.word_read * reads
            + self.costs.word_write * k as u64
            + self.costs.compute_step * (n * l) as u64;
        Ok(Receipt::new(outcome, cost))
    }

    async fn end_selection_phase(&self) -> OracleResult<()> {
        self.end_phase(calls::END_SELECTION_PHASE, Phase::Selection, Phase::Closed)
            .await
    }
}

/// Deploys a fresh [`InMemoryLedger`] per run
pub struct InMemoryLedgerProvider {
    index_width: u16,
    score_width: u16,
    costs: CostModel,
    faults: LedgerFaults,
    deployed: AtomicU64,
}

impl InMemoryLedgerProvider {
    pub fn new(index_width: u16, score_width: u16) -> Self {
        Self {
            index_width,
            score_width,
            costs: CostModel::default(),
            faults: LedgerFaults::default(),
            deployed: AtomicU64::new(0),
        }
    }

    /// Provider using the widths of `params`
    pub fn for_params(params: &ExperimentParams) -> Self {
        Self::new(params.index_width, params.score_width)
    }

    pub fn with_faults(mut self, faults: LedgerFaults) -> Self {
        self.faults = faults;
        self
    }

    /// Number of instances deployed so far
    pub fn deployments(&self) -> u64 {
        self.deployed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OracleProvider for InMemoryLedgerProvider {
    async fn deploy(&self, scores_mode: ScoresMode) -> Result<Deployment, OracleError> {
        if self.faults.reject_call == Some(calls::DEPLOY) {
            return Err(OracleError::Reverted(format!("{} rejected", calls::DEPLOY)));
        }
        let id = self.deployed.fetch_add(1, Ordering::SeqCst) + 1;
        let ledger = InMemoryLedger::new(
            scores_mode,
            self.index_width,
            self.score_width,
            self.costs,
            self.faults.clone(),
        );
        Ok(Deployment {
            oracle: Arc::new(ledger),
            address: format!("0x{id:040x}"),
            cost: self.costs.deployment_cost(scores_mode),
        })
    }
}
