//! Common test utilities for integration tests
//!
//! Provides an oracle wrapper that records every call (and can tamper with
//! reveals or read-backs), a provider deploying such wrappers, and an
//! in-memory result sink.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use impartial::domain::models::{
    Assignment, Commitment, MetricsRecord, Partition, ProposalIndex, ScoresMode,
    SelectionOutcome, Token, WorkDigest,
};
use impartial::domain::ports::{
    calls, CommitLog, Deployment, OracleError, OracleProvider, OracleResult, ResultSink,
    RevealLog, SelectionOracle, SinkError,
};
use impartial::infrastructure::ledger::{InMemoryLedgerProvider, LedgerFaults};

/// How the wrapper corrupts traffic between orchestrator and ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tamper {
    #[default]
    None,
    /// Flip the nonce revealed for this proposal
    RevealNonce(ProposalIndex),
    /// Bump the first revealed score of this proposal
    RevealEvaluation(ProposalIndex),
    /// Make this proposal's read-back assignment review itself
    AssignmentReadBack(ProposalIndex),
    /// Resubmit the first proposal's work in place of this proposal's
    DuplicateWork(ProposalIndex),
}

/// Forwards to a real oracle, logging the name of every call in order
pub struct RecordingOracle {
    inner: Arc<dyn SelectionOracle>,
    log: Arc<Mutex<Vec<&'static str>>>,
    tokens: Mutex<Vec<Token>>,
    first_work: Mutex<Option<WorkDigest>>,
    tamper: Tamper,
}

impl RecordingOracle {
    fn note(&self, call: &'static str) {
        self.log.lock().unwrap().push(call);
    }

    fn proposal_of(&self, token: Token) -> Option<ProposalIndex> {
        self.tokens.lock().unwrap().iter().position(|t| *t == token)
    }
}

#[async_trait]
impl SelectionOracle for RecordingOracle {
    async fn finalize_creation(&self) -> OracleResult<()> {
        self.note(calls::FINALIZE_CREATION);
        self.inner.finalize_creation().await
    }

    async fn submit_work(&self, work: WorkDigest) -> OracleResult<Token> {
        self.note(calls::SUBMIT_WORK);
        let submitted = self.tokens.lock().unwrap().len();
        let first = *self.first_work.lock().unwrap().get_or_insert(work);
        let work = match self.tamper {
            Tamper::DuplicateWork(target) if submitted == target => first,
            _ => work,
        };
        let receipt = self.inner.submit_work(work).await?;
        self.tokens.lock().unwrap().push(receipt.value);
        Ok(receipt)
    }

    async fn end_submission_phase(&self) -> OracleResult<()> {
        self.note(calls::END_SUBMISSION_PHASE);
        self.inner.end_submission_phase().await
    }

    async fn provide_partition(&self, partition: &Partition) -> OracleResult<()> {
        self.note(calls::PROVIDE_PARTITION);
        self.inner.provide_partition(partition).await
    }

    async fn create_partition(&self, l: usize) -> OracleResult<()> {
        self.note(calls::CREATE_PARTITION);
        self.inner.create_partition(l).await
    }

    async fn provide_assignments(&self, assignment: &Assignment, m: usize) -> OracleResult<()> {
        self.note(calls::PROVIDE_ASSIGNMENTS);
        self.inner.provide_assignments(assignment, m).await
    }

    async fn generate_assignments(&self, m: usize) -> OracleResult<()> {
        self.note(calls::GENERATE_ASSIGNMENTS);
        self.inner.generate_assignments(m).await
    }

    async fn end_assignment_phase(&self) -> OracleResult<()> {
        self.note(calls::END_ASSIGNMENT_PHASE);
        self.inner.end_assignment_phase().await
    }

    async fn get_partition(&self) -> Result<Partition, OracleError> {
        self.note(calls::GET_PARTITION);
        self.inner.get_partition().await
    }

    async fn get_assignment_by_token(
        &self,
        token: Token,
    ) -> Result<Vec<ProposalIndex>, OracleError> {
        self.note(calls::GET_ASSIGNMENT_BY_TOKEN);
        let mut targets = self.inner.get_assignment_by_token(token).await?;
        if let Tamper::AssignmentReadBack(target) = self.tamper {
            if self.proposal_of(token) == Some(target) {
                targets[0] = target;
            }
        }
        Ok(targets)
    }

    async fn approve_token(&self, token: Token) -> OracleResult<()> {
        self.note(calls::APPROVE_TOKEN);
        self.inner.approve_token(token).await
    }

    async fn commit_evaluations(
        &self,
        commitment: Commitment,
        token: Token,
    ) -> OracleResult<CommitLog> {
        self.note(calls::COMMIT_EVALUATIONS);
        self.inner.commit_evaluations(commitment, token).await
    }

    async fn end_commitment_phase(&self) -> OracleResult<()> {
        self.note(calls::END_COMMITMENT_PHASE);
        self.inner.end_commitment_phase().await
    }

    async fn reveal_evaluations(
        &self,
        token: Token,
        nonce: u64,
        evaluation: &[u64],
    ) -> OracleResult<RevealLog> {
        self.note(calls::REVEAL_EVALUATIONS);
        let proposal = self.proposal_of(token);
        let mut evaluation = evaluation.to_vec();
        let nonce = match self.tamper {
            Tamper::RevealNonce(target) if proposal == Some(target) => nonce ^ 1,
            Tamper::RevealEvaluation(target) if proposal == Some(target) => {
                evaluation[0] += 1;
                nonce
            }
            _ => nonce,
        };
        self.inner.reveal_evaluations(token, nonce, &evaluation).await
    }

    async fn end_reveal_phase(&self) -> OracleResult<()> {
        self.note(calls::END_REVEAL_PHASE);
        self.inner.end_reveal_phase().await
    }

    async fn impartial_selection(&self, k: usize, seed: u64) -> OracleResult<SelectionOutcome> {
        self.note(calls::IMPARTIAL_SELECTION);
        self.inner.impartial_selection(k, seed).await
    }

    async fn end_selection_phase(&self) -> OracleResult<()> {
        self.note(calls::END_SELECTION_PHASE);
        self.inner.end_selection_phase().await
    }
}

/// Deploys in-memory ledgers wrapped in [`RecordingOracle`]
pub struct RecordingProvider {
    inner: InMemoryLedgerProvider,
    tamper: Tamper,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::with(LedgerFaults::default(), Tamper::None)
    }

    pub fn with(faults: LedgerFaults, tamper: Tamper) -> Self {
        Self {
            inner: InMemoryLedgerProvider::new(256, 256).with_faults(faults),
            tamper,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call issued so far, across all instances
    pub fn calls(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }

    pub fn deployments(&self) -> u64 {
        self.inner.deployments()
    }
}

impl Default for RecordingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OracleProvider for RecordingProvider {
    async fn deploy(&self, scores_mode: ScoresMode) -> Result<Deployment, OracleError> {
        self.log.lock().unwrap().push(calls::DEPLOY);
        let deployment = self.inner.deploy(scores_mode).await?;
        Ok(Deployment {
            oracle: Arc::new(RecordingOracle {
                inner: deployment.oracle,
                log: Arc::clone(&self.log),
                tokens: Mutex::new(Vec::new()),
                first_work: Mutex::new(None),
                tamper: self.tamper,
            }),
            address: deployment.address,
            cost: deployment.cost,
        })
    }
}

/// The calls a complete off-chain run issues, in order
pub fn expected_calls(n: usize, reveals: usize, off_chain: bool) -> Vec<&'static str> {
    let mut expected = vec![calls::DEPLOY, calls::FINALIZE_CREATION];
    expected.extend(std::iter::repeat(calls::SUBMIT_WORK).take(n));
    expected.push(calls::END_SUBMISSION_PHASE);
    if off_chain {
        expected.extend([calls::PROVIDE_PARTITION, calls::PROVIDE_ASSIGNMENTS]);
    } else {
        expected.extend([calls::CREATE_PARTITION, calls::GENERATE_ASSIGNMENTS]);
    }
    expected.extend([calls::END_ASSIGNMENT_PHASE, calls::GET_PARTITION]);
    expected.extend(std::iter::repeat(calls::GET_ASSIGNMENT_BY_TOKEN).take(n));
    for _ in 0..n {
        expected.extend([calls::APPROVE_TOKEN, calls::COMMIT_EVALUATIONS]);
    }
    expected.push(calls::END_COMMITMENT_PHASE);
    expected.extend(std::iter::repeat(calls::REVEAL_EVALUATIONS).take(reveals));
    expected.extend([
        calls::END_REVEAL_PHASE,
        calls::IMPARTIAL_SELECTION,
        calls::END_SELECTION_PHASE,
    ]);
    expected
}

/// Result sink keeping records in memory
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<BTreeMap<String, MetricsRecord>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<MetricsRecord> {
        self.records.lock().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.records.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn persist(&self, name: &str, record: &MetricsRecord) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Io(std::io::Error::other("disk full")));
        }
        self.records
            .lock()
            .unwrap()
            .insert(name.to_string(), record.clone());
        Ok(())
    }

    async fn contains(&self, name: &str) -> Result<bool, SinkError> {
        Ok(self.records.lock().unwrap().contains_key(name))
    }
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
