//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{SpecHasher, ValidationResult};
use crate::store::{ClusterRecord, ClusterState};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
    /// Spec fingerprinting.
    hasher: SpecHasher,
}

/// Cluster row for table display.
#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Desired")]
    desired: String,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Nodes")]
    nodes: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self {
            format,
            hasher: SpecHasher::new(),
        }
    }

    /// Formats a list of clusters.
    #[must_use]
    pub fn format_clusters(&self, records: &[ClusterRecord]) -> String {
        match self.format {
            OutputFormat::Json => {
                let clusters: Vec<ClusterJson> =
                    records.iter().map(|r| self.cluster_json(r)).collect();
                serde_json::to_string_pretty(&clusters).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_clusters_text(records),
        }
    }

    fn format_clusters_text(records: &[ClusterRecord]) -> String {
        if records.is_empty() {
            return String::from("No clusters declared.\n");
        }

        let rows: Vec<ClusterRow> = records
            .iter()
            .map(|r| ClusterRow {
                name: r.name.clone(),
                state: Self::format_state(r),
                desired: r.spec.desired_state.to_string(),
                provider: r.spec.provisioner.provider.clone(),
                nodes: format!(
                    "{}/{}/{}/{}",
                    r.spec.etcd_count, r.spec.master_count, r.spec.worker_count, r.spec.ingress_count
                ),
                endpoint: Self::truncate(&r.status.cluster_endpoint, 40),
            })
            .collect();

        let mut output = Table::new(rows).to_string();
        output.push('\n');

        let converged = records.iter().filter(|r| r.is_converged()).count();
        let stalled = records
            .iter()
            .filter(|r| r.status.waiting_for_manual_retry)
            .count();
        let _ = write!(
            output,
            "\n{} clusters: {} converged, {} waiting for retry\n",
            records.len(),
            converged.to_string().green(),
            stalled.to_string().red()
        );
        output.push_str("Nodes are etcd/master/worker/ingress.\n");

        output
    }

    /// Formats a single cluster in detail.
    #[must_use]
    pub fn format_cluster(&self, record: &ClusterRecord) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&self.cluster_json(record)).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                let spec = &record.spec;
                let hash = self.hasher.hash_spec(spec);

                let _ = write!(output, "\nCluster: {}\n\n", record.name.bold());
                let _ = writeln!(output, "   State: {}", Self::format_state(record));
                let _ = writeln!(output, "   Desired: {}", spec.desired_state);
                let _ = writeln!(output, "   Provider: {}", spec.provisioner.provider);
                for (key, value) in &spec.provisioner.options {
                    let _ = writeln!(output, "     {key}={value}");
                }
                let _ = writeln!(
                    output,
                    "   Nodes: {} etcd, {} master, {} worker, {} ingress",
                    spec.etcd_count, spec.master_count, spec.worker_count, spec.ingress_count
                );
                if !record.status.cluster_endpoint.is_empty() {
                    let _ = writeln!(output, "   Endpoint: {}", record.status.cluster_endpoint);
                }
                let _ = writeln!(output, "   Spec hash: {}", self.hasher.short_hash(&hash));
                if let Some(updated_at) = record.updated_at {
                    let _ = writeln!(
                        output,
                        "   Last updated: {}",
                        updated_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                if record.status.waiting_for_manual_retry {
                    let _ = write!(
                        output,
                        "\n{} Waiting for manual retry. Run 'clusterctl retry {}' once the cause is fixed.\n",
                        "⚠".yellow(),
                        record.name
                    );
                }
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "warnings": result.warnings,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid\n", "✓".green());
                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "success", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✓".green()),
        }
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "warning", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "⚠".yellow()),
        }
    }

    /// Formats the current state with color.
    fn format_state(record: &ClusterRecord) -> String {
        let state = &record.status.current_state;
        let name = match state {
            ClusterState::Initial => "pending",
            other => other.as_str(),
        };

        let colored = if record.is_converged() {
            name.green()
        } else if state.is_failed() || matches!(state, ClusterState::Unknown(_)) {
            name.red()
        } else {
            name.yellow()
        };

        if record.status.waiting_for_manual_retry {
            format!("{colored} (stalled)")
        } else {
            colored.to_string()
        }
    }

    fn cluster_json(&self, record: &ClusterRecord) -> ClusterJson {
        ClusterJson {
            name: record.name.clone(),
            current_state: record.status.current_state.as_str().to_string(),
            desired_state: record.spec.desired_state.as_str().to_string(),
            waiting_for_manual_retry: record.status.waiting_for_manual_retry,
            cluster_endpoint: record.status.cluster_endpoint.clone(),
            provider: record.spec.provisioner.provider.clone(),
            etcd_count: record.spec.etcd_count,
            master_count: record.spec.master_count,
            worker_count: record.spec.worker_count,
            ingress_count: record.spec.ingress_count,
            spec_hash: self.hasher.hash_spec(&record.spec),
            updated_at: record.updated_at.map(|t| t.to_rfc3339()),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterJson {
    name: String,
    current_state: String,
    desired_state: String,
    waiting_for_manual_retry: bool,
    cluster_endpoint: String,
    provider: String,
    etcd_count: u32,
    master_count: u32,
    worker_count: u32,
    ingress_count: u32,
    spec_hash: String,
    updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ClusterSpec;

    fn record() -> ClusterRecord {
        let mut record = ClusterRecord::new("alpha", ClusterSpec::installed("aws", 1, 1, 2, 0));
        record.status.current_state = ClusterState::ProvisionFailed;
        record.status.waiting_for_manual_retry = true;
        record
    }

    #[test]
    fn test_json_list() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_clusters(&[record()]);

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["name"], "alpha");
        assert_eq!(value[0]["currentState"], "provisionFailed");
        assert_eq!(value[0]["waitingForManualRetry"], true);
        assert_eq!(value[0]["specHash"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_text_detail_mentions_retry() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let output = formatter.format_cluster(&record());

        assert!(output.contains("provisionFailed (stalled)"));
        assert!(output.contains("clusterctl retry alpha"));
    }

    #[test]
    fn test_text_list_summary() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);

        assert_eq!(formatter.format_clusters(&[]), "No clusters declared.\n");

        let output = formatter.format_clusters(&[record()]);
        assert!(output.contains("alpha"));
        assert!(output.contains("1 clusters: 0 converged, 1 waiting for retry"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("abcdefghijkl", 8), "abcde...");
    }
}
