//! Configuration loading.
//!
//! The controller configuration comes from a YAML file, optionally
//! overridden by `CLUSTERCTL_*` environment variables (which may themselves
//! come from a `.env` file).

use crate::error::{ClusterError, ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{ControllerConfig, StoreBackend};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "clusterctl.yaml";

/// Alternative configuration file names, searched after the default.
const CONFIG_FILE_CANDIDATES: &[&str] = &[DEFAULT_CONFIG_FILE, "clusterctl.yml"];

/// Loads controller configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory the `.env` file is loaded from.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ControllerConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ClusterError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ClusterError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ControllerConfig> {
        debug!("Parsing YAML configuration");

        // An empty file is a valid, all-defaults configuration.
        if content.trim().is_empty() {
            return Ok(ControllerConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            ClusterError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Loads configuration and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// has an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ControllerConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `CLUSTERCTL_*` overrides looked up through `lookup`, then
    /// expands a leading `~` in configured paths.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an invalid value.
    pub fn apply_env_overrides<F>(config: &mut ControllerConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("CLUSTERCTL_STORE_BACKEND") {
            debug!("Overriding store.backend from environment");
            config.store.backend = match backend.to_lowercase().as_str() {
                "local" => StoreBackend::Local,
                "s3" => StoreBackend::S3,
                "memory" => StoreBackend::Memory,
                other => {
                    return Err(ConfigError::validation(
                        format!("Unknown store backend '{other}'"),
                        "CLUSTERCTL_STORE_BACKEND",
                    )
                    .into());
                }
            };
        }

        if let Some(path) = lookup("CLUSTERCTL_STORE_PATH") {
            debug!("Overriding store.path from environment");
            config.store.path = Some(path);
        }

        if let Some(bucket) = lookup("CLUSTERCTL_STORE_BUCKET") {
            debug!("Overriding store.bucket from environment");
            config.store.bucket = Some(bucket);
        }

        if let Some(prefix) = lookup("CLUSTERCTL_STORE_PREFIX") {
            debug!("Overriding store.prefix from environment");
            config.store.prefix = Some(prefix);
        }

        if let Some(region) = lookup("CLUSTERCTL_STORE_REGION") {
            debug!("Overriding store.region from environment");
            config.store.region = Some(region);
        }

        if let Some(binary) = lookup("CLUSTERCTL_TOOL_BINARY") {
            debug!("Overriding tooling.binary from environment");
            config.tooling.binary = PathBuf::from(binary);
        }

        if let Some(work_dir) = lookup("CLUSTERCTL_WORK_DIR") {
            debug!("Overriding tooling.work_dir from environment");
            config.tooling.work_dir = PathBuf::from(work_dir);
        }

        if let Some(interval) = lookup("CLUSTERCTL_POLL_INTERVAL_SECS") {
            debug!("Overriding controller.poll_interval_secs from environment");
            config.controller.poll_interval_secs = interval.parse().map_err(|_| {
                ConfigError::validation(
                    format!("Invalid poll interval '{interval}'"),
                    "CLUSTERCTL_POLL_INTERVAL_SECS",
                )
            })?;
        }

        if let Some(path) = config.store.path.as_deref() {
            config.store.path = Some(expand_home(Path::new(path)).display().to_string());
        }
        config.tooling.binary = expand_home(&config.tooling.binary);
        config.tooling.work_dir = expand_home(&config.tooling.work_dir);

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ClusterError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Replaces a leading `~` with the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Finds the configuration file in `start_dir` or one of its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in CONFIG_FILE_CANDIDATES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ClusterError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILE),
    }))
}
