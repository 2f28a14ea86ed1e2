//! Batch runs: persistence of every record, sweeps and skipping

mod common;

use std::sync::Arc;

use common::MemorySink;
use impartial::application::{ExperimentRunner, RunStatus};
use impartial::domain::models::{
    EvaluationSource, ExperimentParams, Phase, RunPlan, ScoresMode, SweepConfig,
};
use impartial::domain::ports::calls;
use impartial::domain::ProtocolError;
use impartial::infrastructure::ledger::{InMemoryLedgerProvider, LedgerFaults};
use impartial::infrastructure::sink::JsonFileSink;
use impartial::services::{gas_keys, ExperimentSweep};

fn provider(faults: LedgerFaults) -> Arc<InMemoryLedgerProvider> {
    Arc::new(InMemoryLedgerProvider::new(256, 256).with_faults(faults))
}

fn small_sweep() -> ExperimentSweep {
    let axes = SweepConfig {
        ls: vec![3],
        ns: vec![10],
        ks: vec![2, 5],
        ms: vec![3],
        scores_modes: vec![ScoresMode::Map],
        off_chain: vec![true, false],
        rev_percs: vec![1.0],
    };
    ExperimentSweep::new(axes, ExperimentParams::default())
}

#[tokio::test]
async fn test_paper_records_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(JsonFileSink::new(dir.path().join("OPTIMIZED")));
    let runner = ExperimentRunner::new(provider(LedgerFaults::default()), sink.clone());

    let summaries = runner.run_paper().await.unwrap();

    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.status
        == RunStatus::Completed {
            selection_completed: true
        }));
    let records = sink.records().await.unwrap();
    let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["paper_map", "paper_matrix"]);
    assert!(records.iter().all(|r| r.params.selection_completed));
    assert!(records[1].total_gas > records[0].total_gas);
}

#[tokio::test]
async fn test_aborted_run_is_persisted() {
    let faults = LedgerFaults {
        reject_call: Some(calls::COMMIT_EVALUATIONS),
        ..Default::default()
    };
    let sink = Arc::new(MemorySink::new());
    let runner = ExperimentRunner::new(provider(faults), sink.clone());
    let plan = RunPlan::from_params(ExperimentParams::default(), EvaluationSource::default());

    let summary = runner.run_plan(&plan).await.unwrap();

    assert!(matches!(
        summary.status,
        RunStatus::Aborted {
            phase: Phase::Commitment,
            ..
        }
    ));
    let record = sink.get(&plan.record_name).expect("record persisted");
    assert!(!record.params.selection_completed);
    assert!(record.gas.get(gas_keys::TOKEN_APPROVAL).is_some());
    assert!(record.gas.get(gas_keys::COMMITMENT).is_none());
    assert_eq!(summary.total_gas, Some(record.gas.total));
}

#[tokio::test]
async fn test_failed_selection_record_is_flagged() {
    let faults = LedgerFaults {
        fail_selection: true,
        ..Default::default()
    };
    let sink = Arc::new(MemorySink::new());
    let runner = ExperimentRunner::new(provider(faults), sink.clone());
    let plan = RunPlan::from_params(ExperimentParams::default(), EvaluationSource::default());

    let summary = runner.run_plan(&plan).await.unwrap();

    assert_eq!(
        summary.status,
        RunStatus::Completed {
            selection_completed: false
        }
    );
    assert!(summary.winners.is_empty());
    let record = sink.get(&plan.record_name).unwrap();
    assert!(!record.params.selection_completed);
    assert!(record.gas.get(gas_keys::SELECTION).is_none());

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["params"]["selectionCompleted"], false);
}

#[tokio::test]
async fn test_sink_failure_stops_the_batch() {
    let runner = ExperimentRunner::new(
        provider(LedgerFaults::default()),
        Arc::new(MemorySink::failing()),
    );
    let plan = RunPlan::from_params(ExperimentParams::default(), EvaluationSource::default());

    let err = runner.run_plan(&plan).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Sink(_)));
}

#[tokio::test]
async fn test_sweep_runs_each_configuration_once() {
    let sink = Arc::new(MemorySink::new());
    let runner = ExperimentRunner::new(provider(LedgerFaults::default()), sink.clone());
    let sweep = small_sweep();
    let mut seen = Vec::new();

    let summaries = runner
        .run_sweep(&sweep, &EvaluationSource::default(), |s| seen.push(s.name.clone()))
        .await
        .unwrap();

    assert_eq!(summaries.len(), 4);
    assert_eq!(seen.len(), 4);
    let mut expected: Vec<_> = sweep.configurations().map(|p| p.record_name()).collect();
    assert_eq!(seen, expected);
    expected.sort();
    assert_eq!(sink.names(), expected);
    assert!(summaries.iter().all(|s| !s.is_aborted()));
}

#[tokio::test]
async fn test_skip_existing_leaves_records_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(JsonFileSink::new(dir.path()));
    let sweep = small_sweep();

    ExperimentRunner::new(provider(LedgerFaults::default()), sink.clone())
        .run_sweep(&sweep, &EvaluationSource::default(), |_| {})
        .await
        .unwrap();
    let before = sink.records().await.unwrap();

    let second = provider(LedgerFaults::default());
    let summaries = ExperimentRunner::new(second.clone(), sink.clone())
        .with_skip_existing(true)
        .run_sweep(&sweep, &EvaluationSource::default(), |_| {})
        .await
        .unwrap();

    assert!(summaries.iter().all(|s| s.status == RunStatus::Skipped));
    assert_eq!(second.deployments(), 0);
    assert_eq!(sink.records().await.unwrap(), before);
}
