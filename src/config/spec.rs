//! Configuration types for the controller.
//!
//! These structs map to the `clusterctl.yaml` file. Every section is optional
//! and falls back to defaults suitable for a local, single-machine setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default directory for the local record store.
pub const DEFAULT_STORE_PATH: &str = ".clusters";

/// Default provisioning tool binary.
pub const DEFAULT_TOOL_BINARY: &str = "kismatic";

/// Default root for per-cluster working directories.
pub const DEFAULT_WORK_DIR: &str = ".clusterctl/work";

/// Default interval between store polls, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Root configuration of the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ControllerConfig {
    /// Record store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// External tool configuration.
    #[serde(default)]
    pub tooling: ToolingConfig,
    /// Controller loop settings.
    #[serde(default)]
    pub controller: ControllerSettings,
}

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StoreConfig {
    /// Backend type.
    #[serde(default)]
    pub backend: StoreBackend,
    /// Directory for the local backend.
    #[serde(default)]
    pub path: Option<String>,
    /// S3 bucket name (required for the s3 backend).
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 key prefix.
    #[serde(default)]
    pub prefix: Option<String>,
    /// S3 region (uses the AWS default chain if not specified).
    #[serde(default)]
    pub region: Option<String>,
}

/// Record store backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One JSON file per record in a local directory.
    #[default]
    Local,
    /// One JSON object per record in an S3 bucket.
    S3,
    /// Process-local records, lost on exit.
    Memory,
}

/// External provisioning and installation tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolingConfig {
    /// Tool binary, resolved through `PATH` when relative.
    #[serde(default = "default_tool_binary")]
    pub binary: PathBuf,
    /// Root of the per-cluster working directories.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

/// Controller loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Seconds between store polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_tool_binary() -> PathBuf {
    PathBuf::from(DEFAULT_TOOL_BINARY)
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(DEFAULT_WORK_DIR)
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl Default for ToolingConfig {
    fn default() -> Self {
        Self {
            binary: default_tool_binary(),
            work_dir: default_work_dir(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl StoreBackend {
    /// Returns the configuration name of the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::S3 => "s3",
            Self::Memory => "memory",
        }
    }

    /// Returns true when records outlive the process that wrote them.
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        !matches!(self, Self::Memory)
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StoreConfig {
    /// Returns the local store directory.
    #[must_use]
    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(self.path.as_deref().unwrap_or(DEFAULT_STORE_PATH))
    }
}

impl ControllerSettings {
    /// Returns the poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ControllerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.store.backend, StoreBackend::Local);
        assert_eq!(config.store.local_path(), PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(config.tooling.binary, PathBuf::from(DEFAULT_TOOL_BINARY));
        assert_eq!(config.controller.poll_interval().as_secs(), DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn test_backend_names() {
        let backend: StoreBackend = serde_yaml::from_str("memory").unwrap();
        assert_eq!(backend, StoreBackend::Memory);
        assert_eq!(StoreBackend::S3.to_string(), "s3");
    }
}
