//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::pipeline::LogLevel;
use crate::storage::DemoKind;

/// Protocol demo arguments.
#[derive(Debug, Args)]
pub struct ProtocolCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Memory layout benchmark arguments.
#[derive(Debug, Args)]
pub struct MemoryCommand {
    /// Instances to build per layout (defaults to the configured value)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Cycle scenario arguments.
#[derive(Debug, Args)]
pub struct CyclesCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Retry demo arguments.
#[derive(Debug, Args)]
pub struct RetryCommand {
    /// Attempt budget (defaults to the configured value)
    #[arg(short, long)]
    pub attempts: Option<u32>,

    /// Delay between attempts in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Scripted connection drops before the endpoint answers
    #[arg(short, long)]
    pub failures: Option<u32>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Pipeline demo arguments.
#[derive(Debug, Args)]
pub struct PipelineCommand {
    /// Lines the synthetic source can produce
    #[arg(short, long)]
    pub lines: Option<usize>,

    /// Severity to keep: OK, WARN, or ERROR
    #[arg(long)]
    pub level: Option<LogLevel>,

    /// Substring matches must contain
    #[arg(long)]
    pub needle: Option<String>,

    /// Regex matches must satisfy
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Drop repeated lines
    #[arg(short, long)]
    pub dedup: bool,

    /// Matches to keep before stopping the source
    #[arg(long)]
    pub preview: Option<usize>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Show the last N runs
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Only show runs of one demo
    #[arg(short, long)]
    pub demo: Option<DemoKind>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_command_debug() {
        let cmd = MemoryCommand {
            count: Some(1_000),
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("count"));
        assert!(debug_str.contains("1000"));
    }

    #[test]
    fn test_retry_command_debug() {
        let cmd = RetryCommand {
            attempts: Some(5),
            delay_ms: None,
            failures: None,
            json: true,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("attempts"));
    }

    #[test]
    fn test_pipeline_command_debug() {
        let cmd = PipelineCommand {
            lines: None,
            level: Some(LogLevel::Error),
            needle: None,
            pattern: None,
            dedup: true,
            preview: None,
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Error"));
        assert!(debug_str.contains("dedup"));
    }

    #[test]
    fn test_history_command_debug() {
        let cmd = HistoryCommand {
            limit: 20,
            demo: Some(DemoKind::Retry),
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("limit"));
        assert!(debug_str.contains("Retry"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
