//! CLI module for the cluster lifecycle controller.
//!
//! This module provides the command-line interface for declaring clusters
//! and running their controllers.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat};
pub use output::OutputFormatter;
