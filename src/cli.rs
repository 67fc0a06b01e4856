//! Command-line argument parsing for athena-relay.

use athena_relay::output::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Submit, poll and materialize Athena query jobs.
#[derive(Parser, Debug)]
#[command(name = "athena-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Use in-memory mock services instead of AWS (for testing)
    #[arg(long, global = true)]
    pub mock: bool,

    /// Log debug output from athena-relay
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a query and print its result
    Run {
        /// Query text
        #[arg(value_name = "SQL")]
        sql: String,

        /// Output format (text, json, csv)
        #[arg(long, value_name = "FORMAT", default_value = "text")]
        format: String,

        /// Seconds to wait for the query before giving up (overrides config)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Validate a query with EXPLAIN without running it
    Check {
        /// Query text
        #[arg(value_name = "SQL")]
        sql: String,
    },

    /// Show the status of a submitted query
    Status {
        /// Execution identifier
        #[arg(value_name = "EXECUTION_ID")]
        execution_id: String,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(athena_relay::config::Config::default_path)
    }
}

impl Command {
    /// Parses the --format argument of `run`.
    pub fn output_format(&self) -> std::result::Result<OutputFormat, String> {
        match self {
            Self::Run { format, .. } => format.parse(),
            _ => Ok(OutputFormat::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn test_parse_run() {
        let cli = parse_args(&["athena-relay", "run", "SELECT 1"]);
        match cli.command {
            Command::Run {
                ref sql,
                ref format,
                timeout,
            } => {
                assert_eq!(sql, "SELECT 1");
                assert_eq!(format, "text");
                assert_eq!(timeout, None);
            }
            _ => panic!("Expected run command"),
        }
        assert!(!cli.mock);
    }

    #[test]
    fn test_parse_run_with_options() {
        let cli = parse_args(&[
            "athena-relay",
            "run",
            "SELECT 1",
            "--format",
            "json",
            "--timeout",
            "30",
        ]);
        assert_eq!(cli.command.output_format().unwrap(), OutputFormat::Json);
        match cli.command {
            Command::Run { timeout, .. } => assert_eq!(timeout, Some(30)),
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_parse_check() {
        let cli = parse_args(&["athena-relay", "check", "SELEKT 1", "--mock"]);
        assert!(cli.mock);
        assert!(!cli.verbose);
        match cli.command {
            Command::Check { sql } => assert_eq!(sql, "SELEKT 1"),
            _ => panic!("Expected check command"),
        }
    }

    #[test]
    fn test_parse_status() {
        let cli = parse_args(&["athena-relay", "status", "abc-123"]);
        match cli.command {
            Command::Status { execution_id } => assert_eq!(execution_id, "abc-123"),
            _ => panic!("Expected status command"),
        }
    }

    #[test]
    fn test_parse_config_path() {
        let cli = parse_args(&[
            "athena-relay",
            "--config",
            "/path/to/config.toml",
            "check",
            "SELECT 1",
        ]);
        assert_eq!(cli.config_path(), PathBuf::from("/path/to/config.toml"));
    }

    #[test]
    fn test_invalid_format() {
        let cli = parse_args(&["athena-relay", "run", "SELECT 1", "--format", "xml"]);
        assert!(cli.command.output_format().is_err());
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["athena-relay"]).is_err());
    }
}
