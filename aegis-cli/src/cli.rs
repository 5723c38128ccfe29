//! Command-line argument parsing.

use clap::{Parser, Subcommand};

/// Aegis SRE copilot
#[derive(Debug, Parser)]
#[command(name = "aegis")]
#[command(about = "Aegis - SRE copilot for Prometheus-monitored infrastructure", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand (if not provided, runs a connectivity check)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ask a question about the infrastructure
    Ask {
        /// The question, in plain language
        question: String,

        /// Classify only; never run the suggested query
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the API server and the trend monitor until Ctrl-C
    Watch,

    /// Check that the metrics backend is reachable
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_dry_run() {
        let cli = Cli::try_parse_from(["aegis", "ask", "why is p99 up?", "--dry-run"]).unwrap();
        match cli.command {
            Some(Commands::Ask { question, dry_run }) => {
                assert_eq!(question, "why is p99 up?");
                assert!(dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["aegis"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(Cli::try_parse_from(["aegis", "ask"]).is_err());
    }
}
