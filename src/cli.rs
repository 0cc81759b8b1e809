//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Costpilot - Cloud cost optimization pipeline for Azure subscriptions
///
/// Scan a subscription's resources, analyze their monthly cost, generate
/// optimization recommendations, and render reports.
///
/// Examples:
///   costpilot scan
///   costpilot analyze --output session.json
///   costpilot optimize
///   costpilot run-all --out-dir reports
///   costpilot report --session session.json --format markdown
///   costpilot init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .costpilot.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subscription to run against
    ///
    /// Overrides the config file. Can also be set via AZURE_SUBSCRIPTION_ID.
    #[arg(long, global = true, value_name = "GUID", env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription: Option<String>,

    /// Tenant the subscription belongs to
    ///
    /// Overrides the config file. Can also be set via AZURE_TENANT_ID.
    #[arg(long, global = true, value_name = "GUID", env = "AZURE_TENANT_ID")]
    pub tenant: Option<String>,

    /// Maximum number of resources to scan
    #[arg(long, global = true, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Pipeline and utility commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan the subscription's resources
    Scan {
        /// Save the resulting session context to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Analyze costs for scanned resources (runs a scan first)
    Analyze {
        /// Save the resulting session context to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Generate optimization recommendations (runs scan and analyze first)
    Optimize {
        /// Save the resulting session context to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Run the complete pipeline: scan, analyze, optimize, report
    RunAll {
        /// Save the resulting session context to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Directory to write report files under
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },

    /// Render report files for a previously saved session
    Report {
        /// Session context file saved by a previous command
        #[arg(short, long, value_name = "FILE")]
        session: Option<PathBuf>,

        /// Output format for report files
        #[arg(long, value_name = "FORMAT", default_value = "all")]
        format: ReportFormat,

        /// Directory to write report files under
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },

    /// Show current configuration and connection readiness
    Status,

    /// Show the effective configuration
    ShowConfig,

    /// Generate a default .costpilot.toml configuration file
    InitConfig,
}

/// Output format for rendered report files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    /// Complete JSON data export
    Json,
    /// Markdown executive summary
    Markdown,
    /// CSV cost analysis rows
    Csv,
    /// All of the above (default)
    #[default]
    All,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(limit) = self.limit {
            if limit == 0 {
                return Err("Limit must be at least 1".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            command,
            config: None,
            subscription: None,
            tenant: None,
            limit: None,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn test_validation_conflicting_verbosity() {
        let mut args = make_args(Command::Status);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_limit() {
        let mut args = make_args(Command::Scan { output: None });
        args.limit = Some(0);
        assert!(args.validate().is_err());

        args.limit = Some(10);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::Status);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_run_all() {
        let args = Args::try_parse_from(["costpilot", "run-all", "--out-dir", "out"]).unwrap();
        match args.command {
            Command::RunAll { out_dir, .. } => {
                assert_eq!(out_dir, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_report_format() {
        let args =
            Args::try_parse_from(["costpilot", "report", "--format", "markdown"]).unwrap();
        match args.command {
            Command::Report { format, .. } => assert_eq!(format, ReportFormat::Markdown),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
