//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::paper::PaperArgs;
use super::commands::results::ResultsArgs;
use super::commands::run::RunArgs;
use super::commands::sweep::SweepArgs;

#[derive(Parser, Debug)]
#[command(name = "impartial")]
#[command(about = "Impartial peer-review selection experiments", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (default: .impartial/config.yaml and local.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one experiment with the configured parameters
    Run(RunArgs),

    /// Run every feasible combination of the configured sweep axes
    Sweep(SweepArgs),

    /// Run the reference scenario in both scoring modes
    Paper(PaperArgs),

    /// Summarize the records in the output directory
    Results(ResultsArgs),
}
