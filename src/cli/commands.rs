//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// clusterctl - Declarative cluster lifecycle controller.
#[derive(Parser, Debug)]
#[command(name = "clusterctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "CLUSTERCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format (text, json).
    #[arg(long, global = true, default_value = "text", env = "CLUSTERCTL_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter configuration file.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the controller configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Run the controllers until interrupted.
    Run {
        /// Seconds between store polls (overrides the configuration).
        #[arg(long)]
        poll_interval: Option<u64>,
    },

    /// Declare a new cluster.
    Create {
        /// Cluster name.
        name: String,

        /// Provisioning provider.
        #[arg(short, long, default_value = "aws")]
        provider: String,

        /// Number of etcd nodes.
        #[arg(long, default_value = "1")]
        etcd: u32,

        /// Number of master nodes.
        #[arg(long, default_value = "1")]
        master: u32,

        /// Number of worker nodes.
        #[arg(long, default_value = "1")]
        worker: u32,

        /// Number of ingress nodes.
        #[arg(long, default_value = "0")]
        ingress: u32,

        /// Provider option as KEY=VALUE (repeatable).
        #[arg(short = 'o', long = "option", value_parser = parse_key_value)]
        options: Vec<(String, String)>,
    },

    /// Change the spec of an existing cluster.
    Update {
        /// Cluster name.
        name: String,

        /// Provisioning provider.
        #[arg(short, long)]
        provider: Option<String>,

        /// Number of etcd nodes.
        #[arg(long)]
        etcd: Option<u32>,

        /// Number of master nodes.
        #[arg(long)]
        master: Option<u32>,

        /// Number of worker nodes.
        #[arg(long)]
        worker: Option<u32>,

        /// Number of ingress nodes.
        #[arg(long)]
        ingress: Option<u32>,

        /// Provider option as KEY=VALUE (repeatable).
        #[arg(short = 'o', long = "option", value_parser = parse_key_value)]
        options: Vec<(String, String)>,
    },

    /// Ask for a cluster to be destroyed.
    Destroy {
        /// Cluster name.
        name: String,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Acknowledge a failure so the controller acts again.
    Retry {
        /// Cluster name.
        name: String,
    },

    /// Show cluster status.
    Status {
        /// Cluster name (shows all clusters if not specified).
        name: Option<String>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable log lines.
    #[default]
    Text,
    /// One JSON object per log event.
    Json,
}

/// Parses a `KEY=VALUE` pair.
fn parse_key_value(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{input}'")),
    }
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "clusterctl",
            "create",
            "alpha",
            "--worker",
            "3",
            "-o",
            "region=us-east-2",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Create {
                name,
                provider,
                worker,
                options,
                ..
            } => {
                assert_eq!(name, "alpha");
                assert_eq!(provider, "aws");
                assert_eq!(worker, 3);
                assert_eq!(options, vec![("region".to_string(), "us-east-2".to_string())]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bad_option_rejected() {
        let result = Cli::try_parse_from(["clusterctl", "create", "alpha", "-o", "region"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert!(parse_key_value("=b").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
