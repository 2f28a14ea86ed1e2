//! Impartial CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use impartial::cli::commands::{paper, results, run, sweep};
use impartial::cli::{Cli, Commands};
use impartial::infrastructure::config::ConfigLoader;
use impartial::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = dispatch(cli).await {
        impartial::cli::handle_error(err, json_mode);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&config.logging).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Run(args) => run::execute(args, &config, cli.json).await,
        Commands::Sweep(args) => sweep::execute(args, &config, cli.json).await,
        Commands::Paper(args) => paper::execute(args, &config, cli.json).await,
        Commands::Results(args) => results::execute(args, &config, cli.json).await,
    }
}
