//! Aegis - command-line front end for the SRE copilot.

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use aegis_core::AegisConfig;
use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::error::CliResult;

async fn run(cli: Cli) -> CliResult<()> {
    let config = AegisConfig::from_env()?;
    aegis_api::init_tracing(&config.telemetry)?;

    match cli.command {
        Some(Commands::Ask { question, dry_run }) => commands::ask(config, question, dry_run).await,
        Some(Commands::Watch) => commands::watch(config).await,
        Some(Commands::Check) | None => commands::check(config).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
