//! Implementation of the `impartial sweep` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::{output_dir, runner, synthetic_evaluations};
use crate::application::{RunStatus, RunSummary};
use crate::cli::output::progress::create_hidden_progress_bar;
use crate::cli::output::{create_progress_bar, output, CommandOutput, ProgressBarExt, TableFormatter};
use crate::domain::models::Config;
use crate::services::ExperimentSweep;

#[derive(Args, Debug, Default)]
pub struct SweepArgs {
    /// Skip combinations whose record already exists
    #[arg(long)]
    pub skip_existing: bool,

    /// Directory receiving the run records
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct SweepOutput {
    pub output_dir: PathBuf,
    pub completed: usize,
    pub aborted: usize,
    pub skipped: usize,
    pub runs: Vec<RunSummary>,
}

impl SweepOutput {
    fn new(output_dir: PathBuf, runs: Vec<RunSummary>) -> Self {
        let count = |f: fn(&RunStatus) -> bool| runs.iter().filter(|r| f(&r.status)).count();
        Self {
            output_dir,
            completed: count(|s| matches!(s, RunStatus::Completed { .. })),
            aborted: count(|s| matches!(s, RunStatus::Aborted { .. })),
            skipped: count(|s| matches!(s, RunStatus::Skipped)),
            runs,
        }
    }
}

impl CommandOutput for SweepOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![TableFormatter::new().format_runs(&self.runs)];
        lines.push(format!(
            "\n{} completed, {} aborted, {} skipped; records in {}",
            self.completed,
            self.aborted,
            self.skipped,
            self.output_dir.display()
        ));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: SweepArgs, config: &Config, json_mode: bool) -> Result<()> {
    let skip_existing = args.skip_existing || config.output.skip_existing;
    let dir = output_dir(config, args.output_dir);
    let sweep = ExperimentSweep::new(config.sweep.clone(), config.experiment.clone());

    let total = sweep.configurations().count() as u64;
    let pb = if json_mode {
        create_hidden_progress_bar(total)
    } else {
        create_progress_bar(total)
    };

    let runs = runner(&config.experiment, dir.clone())
        .with_skip_existing(skip_existing)
        .run_sweep(&sweep, &synthetic_evaluations(config), |run| {
            pb.set_message(run.name.clone());
            pb.inc(1);
        })
        .await
        .context("Sweep stopped")?;

    let result = SweepOutput::new(dir, runs);
    if result.aborted > 0 {
        pb.finish_warning(format!("{} runs aborted", result.aborted));
    } else {
        pb.finish_success(format!("{total} configurations"));
    }

    output(&result, json_mode);
    Ok(())
}
