//! CLI command implementations.

pub mod paper;
pub mod results;
pub mod run;
pub mod sweep;

use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ExperimentRunner;
use crate::domain::models::{Config, EvaluationSource, ExperimentParams, ScoresMode};
use crate::infrastructure::ledger::InMemoryLedgerProvider;
use crate::infrastructure::sink::JsonFileSink;

/// Output directory: the flag wins over the configured one
pub(crate) fn output_dir(config: &Config, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| config.output.dir.clone())
}

/// Runner over a fresh in-memory ledger per run, writing into `dir`
pub(crate) fn runner(params: &ExperimentParams, dir: PathBuf) -> ExperimentRunner {
    let provider = Arc::new(InMemoryLedgerProvider::for_params(params));
    let sink = Arc::new(JsonFileSink::new(dir));
    ExperimentRunner::new(provider, sink)
}

pub(crate) fn synthetic_evaluations(config: &Config) -> EvaluationSource {
    EvaluationSource::Synthetic {
        min_score: config.evaluation.min_score,
        spread: config.evaluation.spread,
    }
}

pub(crate) fn parse_scores_mode(s: &str) -> Result<ScoresMode, String> {
    ScoresMode::from_str(s)
        .ok_or_else(|| format!("unknown scores mode '{s}' (expected MAP or MATRIX)"))
}
