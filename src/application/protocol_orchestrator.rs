use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::run_context::RunContext;
use crate::domain::errors::{ProtocolError, ProtocolResult};
use crate::domain::models::{
    Assignment, ExperimentParams, LayoutSource, MetricsRecord, Partition, Phase, Proposal,
    ProposalIndex, RunPlan, SelectionOutcome, FIXED_POINT_SCALE,
};
use crate::domain::ports::{calls, OracleError, OracleProvider, SelectionOracle};
use crate::services::{
    evaluator_for, gas_keys, AssignmentGenerator, CommitRevealCoordinator, PartitionGenerator,
};

/// Outcome of a run that reached `Closed`
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub record_name: String,
    /// Oracle instance the run was executed against
    pub address: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub record: MetricsRecord,
    /// `None` when selection failed
    pub selection: Option<SelectionOutcome>,
    pub selection_error: Option<String>,
    pub revealed: Vec<ProposalIndex>,
    pub rejected_reveals: Vec<ProposalIndex>,
}

impl RunReport {
    pub fn selection_completed(&self) -> bool {
        self.record.params.selection_completed
    }
}

/// A run stopped before `Closed`
///
/// Carries the metrics gathered up to the failure so the caller can still
/// persist them.
#[derive(Debug, Error)]
#[error("run {record_name} aborted in {phase} phase: {source}")]
pub struct RunAborted {
    pub run_id: Uuid,
    pub record_name: String,
    pub phase: Phase,
    pub source: ProtocolError,
    /// Partial record, always with `selectionCompleted = false`
    pub record: Box<MetricsRecord>,
}

/// Drives one run through every protocol phase against a fresh oracle
/// instance
///
/// Phases execute strictly in order and every per-proposal oracle call is
/// awaited before the next is issued. A failed selection is recorded and
/// the run still closes; any earlier failure aborts the run.
///
/// # Examples
///
/// ```no_run
/// use impartial::application::ProtocolOrchestrator;
/// use impartial::domain::models::{ExperimentParams, EvaluationSource, RunPlan};
/// use impartial::infrastructure::ledger::InMemoryLedgerProvider;
/// use std::sync::Arc;
///
/// # async fn example() {
/// let params = ExperimentParams::default();
/// let provider = Arc::new(InMemoryLedgerProvider::for_params(&params));
/// let orchestrator = ProtocolOrchestrator::new(provider);
///
/// let plan = RunPlan::from_params(params, EvaluationSource::default());
/// match orchestrator.run(&plan).await {
///     Ok(report) => println!("winners: {:?}", report.selection),
///     Err(aborted) => eprintln!("{aborted}"),
/// }
/// # }
/// ```
pub struct ProtocolOrchestrator {
    provider: Arc<dyn OracleProvider>,
    partitions: PartitionGenerator,
    assignments: AssignmentGenerator,
    commitments: CommitRevealCoordinator,
}

impl ProtocolOrchestrator {
    pub fn new(provider: Arc<dyn OracleProvider>) -> Self {
        Self {
            provider,
            partitions: PartitionGenerator::new(),
            assignments: AssignmentGenerator::new(),
            commitments: CommitRevealCoordinator::new(),
        }
    }

    /// Execute `plan` from deployment to `Closed`
    #[instrument(skip(self, plan), fields(run = %plan.record_name))]
    pub async fn run(&self, plan: &RunPlan) -> Result<RunReport, RunAborted> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let params = &plan.params;
        info!(
            %run_id,
            l = params.l,
            n = params.n,
            m = params.m,
            k = params.k,
            scores_mode = %params.scores_mode,
            off_chain = params.off_chain,
            rev_perc = params.rev_perc,
            "run started"
        );

        let mut ctx = RunContext::new(params.n);
        if let Err(source) = self.execute(plan, &mut ctx).await {
            let phase = ctx.phase();
            error!(%run_id, %phase, error = %source, "run aborted");
            let record = std::mem::take(&mut ctx.metrics).finish(params, false);
            return Err(RunAborted {
                run_id,
                record_name: plan.record_name.clone(),
                phase,
                source,
                record: Box::new(record),
            });
        }

        let completed = ctx.selection.is_some();
        let record = std::mem::take(&mut ctx.metrics).finish(params, completed);
        let rejected_reveals = record.params.rejected_reveals.clone();
        info!(
            %run_id,
            selection_completed = completed,
            total_gas = record.gas.total,
            rejected_reveals = rejected_reveals.len(),
            "run closed"
        );

        Ok(RunReport {
            run_id,
            record_name: plan.record_name.clone(),
            address: ctx.address.take().unwrap_or_default(),
            started_at,
            finished_at: Utc::now(),
            record,
            selection: ctx.selection.take(),
            selection_error: ctx.selection_error.take(),
            revealed: std::mem::take(&mut ctx.revealed),
            rejected_reveals,
        })
    }

    async fn execute(&self, plan: &RunPlan, ctx: &mut RunContext) -> ProtocolResult<()> {
        let params = &plan.params;
        params.validate()?;
        let layout = self.prepare_layout(plan)?;

        let oracle = self.deploy(params, ctx).await?;
        let oracle = oracle.as_ref();

        self.submission(oracle, params, ctx).await?;
        self.partitioning(oracle, params, layout.as_ref(), ctx).await?;
        self.evaluation(plan, ctx)?;
        self.commitment(oracle, ctx).await?;
        self.reveal(oracle, params, ctx).await?;
        self.selection(oracle, params, ctx).await?;
        ctx.advance(Phase::Closed)
    }

    /// Local layout work done before any oracle call
    ///
    /// The on-chain path still runs the generators so an infeasible load
    /// is reported without touching the oracle.
    fn prepare_layout(&self, plan: &RunPlan) -> ProtocolResult<Option<(Partition, Assignment)>> {
        let params = &plan.params;
        match &plan.layout {
            LayoutSource::OffChain => {
                let partition = self.partitions.generate(params.n, params.l)?;
                let assignment = self.assignments.generate(&partition, params.m)?;
                Ok(Some((partition, assignment)))
            }
            LayoutSource::OnChain => {
                let partition = self.partitions.generate(params.n, params.l)?;
                self.assignments.generate(&partition, params.m)?;
                Ok(None)
            }
            LayoutSource::Provided {
                partition,
                assignment,
            } => {
                if partition.proposal_count() != params.n {
                    return Err(ProtocolError::InvalidConfiguration(format!(
                        "provided partition covers {} proposals, n is {}",
                        partition.proposal_count(),
                        params.n
                    )));
                }
                assignment.verify(partition, params.m)?;
                Ok(Some((partition.clone(), assignment.clone())))
            }
        }
    }

    async fn deploy(
        &self,
        params: &ExperimentParams,
        ctx: &mut RunContext,
    ) -> ProtocolResult<Arc<dyn SelectionOracle>> {
        let deployment = self
            .provider
            .deploy(params.scores_mode)
            .await
            .map_err(|e| rejection(calls::DEPLOY, e))?;
        ctx.metrics.record(gas_keys::DEPLOYMENT, deployment.cost)?;

        let receipt = deployment
            .oracle
            .finalize_creation()
            .await
            .map_err(|e| rejection(calls::FINALIZE_CREATION, e))?;
        ctx.metrics.record(gas_keys::FINALIZATION, receipt.cost)?;

        info!(address = %deployment.address, "instance deployed");
        ctx.address = Some(deployment.address);
        ctx.advance(Phase::Submission)?;
        Ok(deployment.oracle)
    }

    async fn submission(
        &self,
        oracle: &dyn SelectionOracle,
        params: &ExperimentParams,
        ctx: &mut RunContext,
    ) -> ProtocolResult<()> {
        for index in 0..params.n {
            let work = Proposal::synthetic_work(index);
            let receipt = oracle.submit_work(work).await.map_err(|e| match e {
                OracleError::InvalidSubmission(reason) => {
                    ProtocolError::DuplicateOrEmptySubmission {
                        proposal: index,
                        reason,
                    }
                }
                other => rejection(calls::SUBMIT_WORK, other),
            })?;
            ctx.metrics
                .record_indexed(gas_keys::SUBMISSION, index, receipt.cost)?;
            debug!(proposal = index, token = %receipt.value, "work submitted");
            ctx.proposals.push(Proposal {
                index,
                work,
                token: receipt.value,
            });
        }

        let ack = oracle
            .end_submission_phase()
            .await
            .map_err(|e| rejection(calls::END_SUBMISSION_PHASE, e))?;
        ctx.metrics.record(gas_keys::END_SUBMISSION, ack.cost)?;
        ctx.advance(Phase::Partitioning)?;
        info!(proposals = params.n, "submission closed");
        Ok(())
    }

    async fn partitioning(
        &self,
        oracle: &dyn SelectionOracle,
        params: &ExperimentParams,
        layout: Option<&(Partition, Assignment)>,
        ctx: &mut RunContext,
    ) -> ProtocolResult<()> {
        let receipt = match layout {
            Some((partition, _)) => oracle
                .provide_partition(partition)
                .await
                .map_err(|e| rejection(calls::PROVIDE_PARTITION, e))?,
            None => oracle
                .create_partition(params.l)
                .await
                .map_err(|e| rejection(calls::CREATE_PARTITION, e))?,
        };
        ctx.metrics.record(gas_keys::PARTITIONING, receipt.cost)?;
        ctx.advance(Phase::Assignment)?;

        let receipt = match layout {
            Some((_, assignment)) => oracle
                .provide_assignments(assignment, params.m)
                .await
                .map_err(|e| rejection(calls::PROVIDE_ASSIGNMENTS, e))?,
            None => oracle
                .generate_assignments(params.m)
                .await
                .map_err(|e| rejection(calls::GENERATE_ASSIGNMENTS, e))?,
        };
        ctx.metrics.record(gas_keys::ASSIGNMENT, receipt.cost)?;

        let ack = oracle
            .end_assignment_phase()
            .await
            .map_err(|e| rejection(calls::END_ASSIGNMENT_PHASE, e))?;
        ctx.metrics.record(gas_keys::END_ASSIGNMENT, ack.cost)?;

        self.read_back_layout(oracle, params, ctx).await?;
        info!(
            on_chain = layout.is_none(),
            clusters = params.l,
            reviews = params.m,
            "assignment closed"
        );
        ctx.advance(Phase::Evaluation)
    }

    /// Fetch what the oracle actually holds and check it is impartial
    async fn read_back_layout(
        &self,
        oracle: &dyn SelectionOracle,
        params: &ExperimentParams,
        ctx: &mut RunContext,
    ) -> ProtocolResult<()> {
        let partition = oracle
            .get_partition()
            .await
            .map_err(|e| rejection(calls::GET_PARTITION, e))?;
        if partition.proposal_count() != params.n || partition.cluster_count() != params.l {
            return Err(ProtocolError::OracleRejection {
                call: calls::GET_PARTITION,
                reason: format!(
                    "expected {} proposals in {} clusters, oracle holds {} in {}",
                    params.n,
                    params.l,
                    partition.proposal_count(),
                    partition.cluster_count()
                ),
            });
        }

        let mut rows = Vec::with_capacity(params.n);
        for proposal in &ctx.proposals {
            let targets = oracle
                .get_assignment_by_token(proposal.token)
                .await
                .map_err(|e| rejection(calls::GET_ASSIGNMENT_BY_TOKEN, e))?;
            rows.push(targets);
        }
        let assignment = Assignment::from_rows(rows);
        assignment
            .verify(&partition, params.m)
            .map_err(|e| ProtocolError::OracleRejection {
                call: calls::GET_ASSIGNMENT_BY_TOKEN,
                reason: e.to_string(),
            })?;

        ctx.partition = Some(partition);
        ctx.assignment = Some(assignment);
        Ok(())
    }

    fn evaluation(&self, plan: &RunPlan, ctx: &mut RunContext) -> ProtocolResult<()> {
        let evaluator = evaluator_for(&plan.evaluations);
        for index in 0..plan.params.n {
            let scores = evaluator.evaluate(index, ctx.targets(index)?)?;
            ctx.evaluations.push(scores);
        }
        ctx.advance(Phase::Commitment)
    }

    async fn commitment(
        &self,
        oracle: &dyn SelectionOracle,
        ctx: &mut RunContext,
    ) -> ProtocolResult<()> {
        for index in 0..ctx.proposals.len() {
            let token = ctx.token(index)?;
            let receipt = oracle
                .approve_token(token)
                .await
                .map_err(|e| rejection(calls::APPROVE_TOKEN, e))?;
            ctx.metrics
                .record_indexed(gas_keys::TOKEN_APPROVAL, index, receipt.cost)?;

            let commitment = self.commitments.commit(
                ctx.nonce(index)?,
                ctx.targets(index)?,
                ctx.evaluation(index)?,
            );
            let receipt = oracle
                .commit_evaluations(commitment, token)
                .await
                .map_err(|e| rejection(calls::COMMIT_EVALUATIONS, e))?;
            if receipt.value.token != token || receipt.value.commitment != commitment {
                return Err(ProtocolError::OracleRejection {
                    call: calls::COMMIT_EVALUATIONS,
                    reason: format!("commit log for proposal {index} does not match"),
                });
            }
            ctx.metrics
                .record_indexed(gas_keys::COMMITMENT, index, receipt.cost)?;
            ctx.commitments.push(commitment);
            debug!(proposal = index, commitment = %commitment.short(), "evaluations committed");
        }

        let ack = oracle
            .end_commitment_phase()
            .await
            .map_err(|e| rejection(calls::END_COMMITMENT_PHASE, e))?;
        ctx.metrics.record(gas_keys::END_COMMITMENT, ack.cost)?;
        ctx.advance(Phase::Reveal)?;
        info!(commitments = ctx.commitments.len(), "commitment closed");
        Ok(())
    }

    async fn reveal(
        &self,
        oracle: &dyn SelectionOracle,
        params: &ExperimentParams,
        ctx: &mut RunContext,
    ) -> ProtocolResult<()> {
        let count = params.reveal_count();
        for index in 0..count {
            let token = ctx.token(index)?;
            let nonce = ctx.nonce(index)?;
            let stored = ctx.commitment(index)?;
            let evaluation = ctx.evaluation(index)?.to_vec();

            match oracle.reveal_evaluations(token, nonce, &evaluation).await {
                Ok(receipt) => {
                    if receipt.value.commitment != stored {
                        return Err(ProtocolError::OracleRejection {
                            call: calls::REVEAL_EVALUATIONS,
                            reason: format!(
                                "reveal log for proposal {index} names another commitment"
                            ),
                        });
                    }
                    ctx.metrics
                        .record_indexed(gas_keys::REVEAL, index, receipt.cost)?;
                    ctx.revealed.push(index);
                    debug!(proposal = index, "evaluations revealed");
                }
                Err(e) => {
                    let err = reveal_error(index, e);
                    if err.is_fatal() {
                        return Err(err);
                    }
                    warn!(proposal = index, error = %err, "reveal rejected");
                    ctx.metrics.reject_reveal(index);
                }
            }
        }

        let ack = oracle
            .end_reveal_phase()
            .await
            .map_err(|e| rejection(calls::END_REVEAL_PHASE, e))?;
        ctx.metrics.record(gas_keys::END_REVEAL, ack.cost)?;
        ctx.advance(Phase::Selection)?;
        info!(
            revealed = ctx.revealed.len(),
            rejected = ctx.metrics.rejected_reveals().len(),
            withheld = params.n - count,
            "reveal closed"
        );
        Ok(())
    }

    /// A selection failure is kept on the context and the run still closes
    async fn selection(
        &self,
        oracle: &dyn SelectionOracle,
        params: &ExperimentParams,
        ctx: &mut RunContext,
    ) -> ProtocolResult<()> {
        let seed = rand::thread_rng().gen_range(0..FIXED_POINT_SCALE);
        match self.select(oracle, params.k, seed, ctx).await {
            Ok(outcome) => {
                info!(seed, winners = ?outcome.winner_ids(), "selection completed");
                ctx.selection = Some(outcome);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(seed, error = %e, "selection failed, closing run without winners");
                ctx.selection_error = Some(e.to_string());
            }
        }
        Ok(())
    }

    async fn select(
        &self,
        oracle: &dyn SelectionOracle,
        k: usize,
        seed: u64,
        ctx: &mut RunContext,
    ) -> ProtocolResult<SelectionOutcome> {
        let receipt = oracle
            .impartial_selection(k, seed)
            .await
            .map_err(|e| selection_failure(calls::IMPARTIAL_SELECTION, &e))?;
        ctx.metrics.record(gas_keys::SELECTION, receipt.cost)?;

        let ack = oracle
            .end_selection_phase()
            .await
            .map_err(|e| selection_failure(calls::END_SELECTION_PHASE, &e))?;
        ctx.metrics.record(gas_keys::END_SELECTION, ack.cost)?;
        Ok(receipt.value)
    }
}

fn rejection(call: &'static str, error: OracleError) -> ProtocolError {
    ProtocolError::OracleRejection {
        call,
        reason: error.to_string(),
    }
}

fn selection_failure(call: &'static str, error: &OracleError) -> ProtocolError {
    ProtocolError::SelectionFailure(format!("{call}: {error}"))
}

/// A refused reveal is per-proposal only when the digests disagree
fn reveal_error(proposal: ProposalIndex, error: OracleError) -> ProtocolError {
    match error {
        OracleError::CommitmentMismatch { stored, revealed } => {
            ProtocolError::CommitmentMismatch {
                proposal,
                expected: stored.to_hex(),
                actual: revealed.to_hex(),
            }
        }
        other => rejection(calls::REVEAL_EVALUATIONS, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EvaluationSource, GasValue, ScoresMode};
    use crate::infrastructure::ledger::{InMemoryLedgerProvider, LedgerFaults};

    fn orchestrator(faults: LedgerFaults) -> ProtocolOrchestrator {
        let provider = InMemoryLedgerProvider::new(256, 256).with_faults(faults);
        ProtocolOrchestrator::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_paper_run_selects_five() {
        let plan = RunPlan::paper(ScoresMode::Matrix).unwrap();
        let report = orchestrator(LedgerFaults::default()).run(&plan).await.unwrap();

        assert!(report.selection_completed());
        let outcome = report.selection.unwrap();
        assert_eq!(outcome.winners.len(), 5);
        assert!(outcome.score_matrix.is_some());
        assert_eq!(report.revealed, (0..8).collect::<Vec<_>>());

        let gas = &report.record.gas;
        for key in [
            gas_keys::DEPLOYMENT,
            gas_keys::FINALIZATION,
            gas_keys::END_SUBMISSION,
            gas_keys::PARTITIONING,
            gas_keys::ASSIGNMENT,
            gas_keys::END_ASSIGNMENT,
            gas_keys::END_COMMITMENT,
            gas_keys::END_REVEAL,
            gas_keys::SELECTION,
            gas_keys::END_SELECTION,
        ] {
            assert!(matches!(gas.get(key), Some(GasValue::Cost(c)) if *c > 0), "{key}");
        }
        for key in [
            gas_keys::SUBMISSION,
            gas_keys::TOKEN_APPROVAL,
            gas_keys::COMMITMENT,
            gas_keys::REVEAL,
        ] {
            match gas.get(key) {
                Some(GasValue::Nested(per_proposal)) => assert_eq!(per_proposal.len(), 8),
                other => panic!("{key}: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_infeasible_load_aborts_before_deployment() {
        let params = ExperimentParams {
            l: 5,
            n: 10,
            m: 9,
            k: 2,
            ..Default::default()
        };
        let provider = Arc::new(InMemoryLedgerProvider::new(256, 256));
        let orchestrator = ProtocolOrchestrator::new(provider.clone());
        let plan = RunPlan::from_params(params, EvaluationSource::default());

        let aborted = orchestrator.run(&plan).await.unwrap_err();
        assert!(matches!(
            aborted.source,
            ProtocolError::InfeasibleReviewLoad { .. }
        ));
        assert_eq!(aborted.phase, Phase::Created);
        assert_eq!(aborted.record.gas.total, 0);
        assert_eq!(provider.deployments(), 0);
    }
}
