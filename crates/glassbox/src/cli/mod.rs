//! Command-line interface for glassbox.
//!
//! This module provides the CLI structure and command handlers for the
//! `gbx` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    ConfigCommand, CyclesCommand, HistoryCommand, MemoryCommand, PipelineCommand, ProtocolCommand,
    RetryCommand,
};

/// gbx - Watch runtime behavior instead of guessing at it
///
/// Runs small, instrumented demonstrations of object protocols, memory
/// layout and reclamation, retry control flow, and lazy pipelines, and
/// keeps a ledger of what each run measured.
#[derive(Debug, Parser)]
#[command(name = "gbx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the object protocol demo over the registry and record book
    Protocol(ProtocolCommand),

    /// Benchmark dynamic against fixed record layouts
    Memory(MemoryCommand),

    /// Run the reference-count cycle scenarios
    Cycles(CyclesCommand),

    /// Run the retry demo against a flaky endpoint
    Retry(RetryCommand),

    /// Run a lazy pipeline over the synthetic log
    Pipeline(PipelineCommand),

    /// Show recorded run history
    History(HistoryCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cycles_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Cycles(CyclesCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "gbx");
    }

    #[test]
    fn test_cli_verify() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_quiet() {
        assert_eq!(cycles_cli(0, true).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_verbosity_normal() {
        assert_eq!(cycles_cli(0, false).verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_verbosity_verbose() {
        assert_eq!(cycles_cli(1, false).verbosity(), Verbosity::Verbose);
    }

    #[test]
    fn test_verbosity_trace() {
        assert_eq!(cycles_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_protocol() {
        let cli = Cli::try_parse_from(["gbx", "protocol"]).unwrap();
        assert!(matches!(cli.command, Command::Protocol(_)));
    }

    #[test]
    fn test_parse_memory_with_count() {
        let cli = Cli::try_parse_from(["gbx", "memory", "-n", "5000"]).unwrap();
        match cli.command {
            Command::Memory(cmd) => assert_eq!(cmd.count, Some(5_000)),
            other => panic!("expected memory command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_retry_flags() {
        let cli =
            Cli::try_parse_from(["gbx", "retry", "--attempts", "5", "--failures", "4"]).unwrap();
        match cli.command {
            Command::Retry(cmd) => {
                assert_eq!(cmd.attempts, Some(5));
                assert_eq!(cmd.failures, Some(4));
                assert_eq!(cmd.delay_ms, None);
            }
            other => panic!("expected retry command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_pipeline_flags() {
        let cli = Cli::try_parse_from([
            "gbx", "pipeline", "--level", "error", "--dedup", "--preview", "3",
        ])
        .unwrap();
        match cli.command {
            Command::Pipeline(cmd) => {
                assert_eq!(cmd.level, Some(crate::pipeline::LogLevel::Error));
                assert!(cmd.dedup);
                assert_eq!(cmd.preview, Some(3));
            }
            other => panic!("expected pipeline command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_pipeline_rejects_bad_level() {
        let result = Cli::try_parse_from(["gbx", "pipeline", "--level", "LOUD"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_history_with_demo() {
        let cli = Cli::try_parse_from(["gbx", "history", "--demo", "retry"]).unwrap();
        match cli.command {
            Command::History(cmd) => {
                assert_eq!(cmd.demo, Some(crate::storage::DemoKind::Retry));
                assert_eq!(cmd.limit, 20);
            }
            other => panic!("expected history command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["gbx", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Show { .. })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = Cli::try_parse_from(["gbx", "-c", "/custom/config.toml", "cycles"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose() {
        let cli = Cli::try_parse_from(["gbx", "-vv", "cycles"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_with_quiet() {
        let cli = Cli::try_parse_from(["gbx", "-q", "cycles"]).unwrap();
        assert!(cli.quiet);
    }
}
