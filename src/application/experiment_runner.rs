use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::protocol_orchestrator::{ProtocolOrchestrator, RunReport};
use crate::domain::errors::{ProtocolError, ProtocolResult};
use crate::domain::models::{
    EvaluationSource, ExperimentParams, MetricsRecord, Phase, RunPlan, ScoresMode,
};
use crate::domain::ports::{OracleProvider, ResultSink};
use crate::services::ExperimentSweep;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed { selection_completed: bool },
    Aborted { phase: Phase, error: String },
    /// A record with this name already existed
    Skipped,
}

/// One line of a batch result
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub params: ExperimentParams,
    #[serde(flatten)]
    pub status: RunStatus,
    pub total_gas: Option<u64>,
    pub winners: Vec<u64>,
}

impl RunSummary {
    fn skipped(plan: &RunPlan) -> Self {
        Self {
            name: plan.record_name.clone(),
            params: plan.params.clone(),
            status: RunStatus::Skipped,
            total_gas: None,
            winners: Vec::new(),
        }
    }

    fn from_report(plan: &RunPlan, report: &RunReport) -> Self {
        Self {
            name: plan.record_name.clone(),
            params: plan.params.clone(),
            status: RunStatus::Completed {
                selection_completed: report.selection_completed(),
            },
            total_gas: Some(report.record.gas.total),
            winners: report
                .selection
                .as_ref()
                .map(|s| s.winner_ids())
                .unwrap_or_default(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, RunStatus::Aborted { .. })
    }
}

/// Sequences runs, one fresh oracle instance each, persisting every record
///
/// Aborted runs are persisted with their partial metrics and reported as
/// [`RunStatus::Aborted`]; only a failing sink stops a batch.
pub struct ExperimentRunner {
    orchestrator: ProtocolOrchestrator,
    sink: Arc<dyn ResultSink>,
    skip_existing: bool,
}

impl ExperimentRunner {
    pub fn new(provider: Arc<dyn OracleProvider>, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            orchestrator: ProtocolOrchestrator::new(provider),
            sink,
            skip_existing: false,
        }
    }

    /// Skip sweep combinations whose record the sink already holds
    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    /// Run `plan` and persist its record
    pub async fn run_plan(&self, plan: &RunPlan) -> ProtocolResult<RunSummary> {
        match self.orchestrator.run(plan).await {
            Ok(report) => {
                self.persist(&plan.record_name, &report.record).await?;
                Ok(RunSummary::from_report(plan, &report))
            }
            Err(aborted) => {
                warn!(
                    run = %plan.record_name,
                    phase = %aborted.phase,
                    error = %aborted.source,
                    "persisting partial record of aborted run"
                );
                self.persist(&plan.record_name, &aborted.record).await?;
                Ok(RunSummary {
                    name: plan.record_name.clone(),
                    params: plan.params.clone(),
                    status: RunStatus::Aborted {
                        phase: aborted.phase,
                        error: aborted.source.to_string(),
                    },
                    total_gas: Some(aborted.record.gas.total),
                    winners: Vec::new(),
                })
            }
        }
    }

    /// The reference scenario in both scoring modes
    pub async fn run_paper(&self) -> ProtocolResult<Vec<RunSummary>> {
        let mut summaries = Vec::with_capacity(2);
        for mode in [ScoresMode::Map, ScoresMode::Matrix] {
            let plan = RunPlan::paper(mode)?;
            summaries.push(self.run_plan(&plan).await?);
        }
        Ok(summaries)
    }

    /// Every feasible configuration of `sweep`, in order
    ///
    /// `on_progress` is called after each configuration, skipped or run.
    pub async fn run_sweep<F>(
        &self,
        sweep: &ExperimentSweep,
        evaluations: &EvaluationSource,
        mut on_progress: F,
    ) -> ProtocolResult<Vec<RunSummary>>
    where
        F: FnMut(&RunSummary),
    {
        let mut summaries = Vec::new();
        for params in sweep.configurations() {
            let plan = RunPlan::from_params(params, evaluations.clone());
            let summary = if self.skip_existing && self.exists(&plan.record_name).await? {
                info!(run = %plan.record_name, "record exists, skipping");
                RunSummary::skipped(&plan)
            } else {
                self.run_plan(&plan).await?
            };
            on_progress(&summary);
            summaries.push(summary);
        }

        let aborted = summaries.iter().filter(|s| s.is_aborted()).count();
        info!(runs = summaries.len(), aborted, "sweep finished");
        Ok(summaries)
    }

    async fn persist(&self, name: &str, record: &MetricsRecord) -> ProtocolResult<()> {
        self.sink
            .persist(name, record)
            .await
            .map_err(|e| ProtocolError::Sink(e.to_string()))
    }

    async fn exists(&self, name: &str) -> ProtocolResult<bool> {
        self.sink
            .contains(name)
            .await
            .map_err(|e| ProtocolError::Sink(e.to_string()))
    }
}
