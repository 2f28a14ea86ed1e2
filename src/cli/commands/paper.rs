//! Implementation of the `impartial paper` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::{output_dir, runner};
use crate::application::RunSummary;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, RunPlan, ScoresMode};

#[derive(Args, Debug, Default)]
pub struct PaperArgs {
    /// Directory receiving the run records
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct PaperOutput {
    pub output_dir: PathBuf,
    pub runs: Vec<RunSummary>,
}

impl CommandOutput for PaperOutput {
    fn to_human(&self) -> String {
        format!(
            "Reference scenario (n=8, l=4, m=2, k=5)\n{}",
            TableFormatter::new().format_runs(&self.runs)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: PaperArgs, config: &Config, json_mode: bool) -> Result<()> {
    let dir = output_dir(config, args.output_dir);
    let params = RunPlan::paper(ScoresMode::Map)?.params;
    let runs = runner(&params, dir.clone())
        .run_paper()
        .await
        .context("Failed to run reference scenario")?;

    output(
        &PaperOutput {
            output_dir: dir,
            runs,
        },
        json_mode,
    );
    Ok(())
}
