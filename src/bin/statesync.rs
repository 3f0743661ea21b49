//! Statesync CLI Binary
//!
//! Command-line interface for inspecting and editing shared agent state.

use anyhow::Context;
use clap::Parser;
use statesync::config::ConfigLoader;
use statesync::logging::init_logging;
use statesync::tooling::{Cli, CliContext};
use std::process;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut logging = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?.logging,
        None => ConfigLoader::load(None)?.logging,
    };
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    init_logging(Some(&logging)).context("Failed to initialize logging")?;

    let context = CliContext::new(cli.config.clone(), cli.data_dir.clone())
        .context("Failed to open state store")?;
    let output = context.execute(&cli.command)?;
    println!("{}", output);
    Ok(())
}
