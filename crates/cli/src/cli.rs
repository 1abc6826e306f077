//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use url::Url;

/// Survey Submit - write survey responses to the configured sinks
#[derive(Parser, Debug)]
#[command(
    name = "survey-submit",
    author,
    version,
    about = "Survey response submission pipeline",
    long_about = "Submits survey responses to a document store and a spreadsheet.\n\n\
                  Optionally rejects duplicate respondents by email, and stores \n\
                  uploaded files in an object store."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SURVEY_SUBMIT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SURVEY_SUBMIT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", global = true, env = "SURVEY_SUBMIT_METRICS_PORT")]
    pub metrics_port: u16,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    pub fn metrics_port(&self) -> Option<u16> {
        (self.metrics_port != 0).then_some(self.metrics_port)
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit one response payload to the configured sinks
    Submit(SubmitArgs),

    /// Store a file in the configured object store
    Store(StoreArgs),

    /// Validate configuration file without submitting
    Validate(ValidateArgs),
}

/// Sink endpoint overrides, shared by commands that talk to sinks
#[derive(Parser, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// Use in-process sinks instead of the remote services
    #[arg(long)]
    pub dry_run: bool,

    /// Sheets API base URL
    #[arg(long, env = "SURVEY_SUBMIT_SHEETS_ENDPOINT")]
    pub sheets_endpoint: Option<Url>,

    /// Cloud Storage API base URL
    #[arg(long, env = "SURVEY_SUBMIT_STORAGE_ENDPOINT")]
    pub storage_endpoint: Option<Url>,
}

/// Arguments for the `submit` command
#[derive(Parser, Debug, Clone)]
pub struct SubmitArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "survey.toml",
        env = "SURVEY_SUBMIT_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON file holding the response payload ("-" reads stdin)
    #[arg(short, long)]
    pub payload: PathBuf,

    /// Override the dispatch policy from configuration
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    #[command(flatten)]
    pub endpoints: EndpointArgs,
}

/// Arguments for the `store` command
#[derive(Parser, Debug, Clone)]
pub struct StoreArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "survey.toml",
        env = "SURVEY_SUBMIT_CONFIG"
    )]
    pub config: PathBuf,

    /// File to upload
    #[arg(short, long)]
    pub file: PathBuf,

    /// Object name (defaults to the file name)
    #[arg(short, long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub endpoints: EndpointArgs,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "survey.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Dispatch policy override
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PolicyArg {
    /// Attempt every sink, report failures per sink
    BestEffort,
    /// Stop at the first failing sink
    AbortOnFailure,
}

impl From<PolicyArg> for contracts::DispatchPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::BestEffort => Self::BestEffortAll,
            PolicyArg::AbortOnFailure => Self::AbortOnFirstFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_submit_args() {
        let cli = Cli::try_parse_from([
            "survey-submit",
            "-v",
            "submit",
            "--payload",
            "answer.json",
            "--policy",
            "abort-on-failure",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.default_log_level(), "debug");
        assert_eq!(cli.metrics_port(), None);
        match cli.command {
            Commands::Submit(args) => {
                assert_eq!(args.payload, PathBuf::from("answer.json"));
                assert!(matches!(args.policy, Some(PolicyArg::AbortOnFailure)));
                assert!(args.endpoints.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["survey-submit", "-q", "-v", "validate"]).is_err());
    }
}
