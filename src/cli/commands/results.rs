//! Implementation of the `impartial results` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::output_dir;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::Config;
use crate::infrastructure::sink::{JsonFileSink, StoredRecord};

#[derive(Args, Debug, Default)]
pub struct ResultsArgs {
    /// Directory holding the run records
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ResultsOutput {
    pub output_dir: PathBuf,
    pub records: Vec<StoredRecord>,
}

impl CommandOutput for ResultsOutput {
    fn to_human(&self) -> String {
        if self.records.is_empty() {
            return format!("No records in {}", self.output_dir.display());
        }
        TableFormatter::new().format_records(&self.records)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ResultsArgs, config: &Config, json_mode: bool) -> Result<()> {
    let dir = output_dir(config, args.output_dir);
    let records = JsonFileSink::new(dir.clone())
        .records()
        .await
        .with_context(|| format!("Failed to read records from {}", dir.display()))?;

    output(
        &ResultsOutput {
            output_dir: dir,
            records,
        },
        json_mode,
    );
    Ok(())
}
