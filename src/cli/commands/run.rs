//! Implementation of the `impartial run` command.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::{output_dir, parse_scores_mode, runner, synthetic_evaluations};
use crate::application::RunSummary;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, ExperimentParams, RunPlan, ScoresMode};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Number of clusters
    #[arg(short, long)]
    pub l: Option<usize>,

    /// Number of proposals
    #[arg(short, long)]
    pub n: Option<usize>,

    /// Reviews per proposal
    #[arg(short, long)]
    pub m: Option<usize>,

    /// Desired number of winners
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Score storage of the oracle (MAP or MATRIX)
    #[arg(long, value_parser = parse_scores_mode)]
    pub scores_mode: Option<ScoresMode>,

    /// Let the oracle compute partition and assignment
    #[arg(long)]
    pub on_chain: bool,

    /// Fraction of proposals that reveal, in (0, 1]
    #[arg(long)]
    pub rev_perc: Option<f64>,

    /// Directory receiving the run record
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

impl RunArgs {
    /// `base` with every given flag applied
    pub fn apply(&self, base: &ExperimentParams) -> ExperimentParams {
        let mut params = base.clone();
        if let Some(l) = self.l {
            params.l = l;
        }
        if let Some(n) = self.n {
            params.n = n;
        }
        if let Some(m) = self.m {
            params.m = m;
        }
        if let Some(k) = self.k {
            params.k = k;
        }
        if let Some(mode) = self.scores_mode {
            params.scores_mode = mode;
        }
        if self.on_chain {
            params.off_chain = false;
        }
        if let Some(rev_perc) = self.rev_perc {
            params.rev_perc = rev_perc;
        }
        params
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub run: RunSummary,
    pub output_dir: PathBuf,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        format!(
            "{}\n\nRecord written to {}",
            TableFormatter::new().format_runs(std::slice::from_ref(&self.run)),
            self.output_dir.join(format!("{}.json", self.run.name)).display()
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let params = args.apply(&config.experiment);
    params.validate().context("Invalid experiment parameters")?;

    let dir = output_dir(config, args.output_dir);
    let plan = RunPlan::from_params(params, synthetic_evaluations(config));
    let run = runner(&plan.params, dir.clone())
        .run_plan(&plan)
        .await
        .context("Failed to persist run record")?;

    let aborted = run.is_aborted();
    let name = run.name.clone();
    output(
        &RunOutput {
            run,
            output_dir: dir,
        },
        json_mode,
    );
    if aborted {
        bail!("run {name} aborted");
    }
    Ok(())
}
