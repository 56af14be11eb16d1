//! Configuration and cluster spec validation.
//!
//! Controller configuration is validated once at startup. Cluster specs are
//! validated by the CLI before a record is written, since the controller
//! itself accepts whatever the store holds.

use crate::error::{ClusterError, ConfigError, Result};
use tracing::debug;

use super::spec::{ControllerConfig, ControllerSettings, StoreBackend, StoreConfig, ToolingConfig};
use crate::planner::{PROVIDER_AWS, PROVIDER_AZURE};
use crate::store::ClusterSpec;

/// Maximum cluster name length; names double as host name prefixes.
const MAX_CLUSTER_NAME_LEN: usize = 63;

/// Validator for controller configuration and cluster specs.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates the controller configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, config: &ControllerConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_store(&config.store, &mut result);
        Self::validate_tooling(&config.tooling, &mut result);
        Self::validate_controller(&config.controller, &mut result);

        Self::finish(result, "Configuration")
    }

    /// Checks that records written through this configuration outlive the
    /// current process. Every command but `run` needs this.
    ///
    /// # Errors
    ///
    /// Returns an error for the memory store.
    pub fn require_persistent_store(&self, config: &ControllerConfig) -> Result<()> {
        if config.store.backend.is_persistent() {
            return Ok(());
        }
        Err(ConfigError::validation(
            format!(
                "The {} store only lives as long as 'clusterctl run'; use a local or s3 store",
                config.store.backend
            ),
            "store.backend",
        )
        .into())
    }

    /// Validates a cluster name and spec before it is written to the store.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate_cluster(&self, name: &str, spec: &ClusterSpec) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        if name.len() > MAX_CLUSTER_NAME_LEN {
            result.errors.push(ValidationError {
                field: String::from("name"),
                message: format!(
                    "Cluster name '{name}' is longer than {MAX_CLUSTER_NAME_LEN} characters"
                ),
            });
        } else if !is_valid_name(name) {
            result.errors.push(ValidationError {
                field: String::from("name"),
                message: format!(
                    "Cluster name '{name}' is invalid. Must be lowercase alphanumeric with hyphens."
                ),
            });
        }

        let provider = spec.provisioner.provider.as_str();
        if provider.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("spec.provisioner.provider"),
                message: String::from("Provisioner provider cannot be empty"),
            });
        } else if provider != PROVIDER_AWS && provider != PROVIDER_AZURE {
            result.warnings.push(format!(
                "Provider '{provider}' gets no provider-specific plan defaults"
            ));
        }

        for (field, count) in [
            ("spec.etcdCount", spec.etcd_count),
            ("spec.masterCount", spec.master_count),
            ("spec.workerCount", spec.worker_count),
        ] {
            if count == 0 {
                result.errors.push(ValidationError {
                    field: field.to_string(),
                    message: String::from("At least one node is required"),
                });
            }
        }

        if spec.etcd_count % 2 == 0 && spec.etcd_count > 0 {
            result.warnings.push(format!(
                "An even etcd count ({}) tolerates no more failures than {}",
                spec.etcd_count,
                spec.etcd_count - 1
            ));
        }

        Self::finish(result, "Cluster spec")
    }

    fn validate_store(store: &StoreConfig, result: &mut ValidationResult) {
        match store.backend {
            StoreBackend::S3 => {
                if store.bucket.as_ref().is_none_or(String::is_empty) {
                    result.errors.push(ValidationError {
                        field: String::from("store.bucket"),
                        message: String::from("S3 bucket name is required when using S3 backend"),
                    });
                }
            }
            StoreBackend::Local => {
                if store.path.as_ref().is_some_and(String::is_empty) {
                    result.errors.push(ValidationError {
                        field: String::from("store.path"),
                        message: String::from("Local store path cannot be empty"),
                    });
                }
            }
            StoreBackend::Memory => {
                result
                    .warnings
                    .push(String::from("The memory store loses every record on exit"));
            }
        }
    }

    fn validate_tooling(tooling: &ToolingConfig, result: &mut ValidationResult) {
        if tooling.binary.as_os_str().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("tooling.binary"),
                message: String::from("Tool binary cannot be empty"),
            });
        }
        if tooling.work_dir.as_os_str().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("tooling.work_dir"),
                message: String::from("Working directory cannot be empty"),
            });
        }
    }

    fn validate_controller(settings: &ControllerSettings, result: &mut ValidationResult) {
        if settings.poll_interval_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("controller.poll_interval_secs"),
                message: String::from("Poll interval must be at least one second"),
            });
        }
    }

    fn finish(result: ValidationResult, what: &str) -> Result<ValidationResult> {
        match result.errors.first() {
            None => {
                debug!("{what} validation passed");
                Ok(result)
            }
            Some(first_error) => Err(ClusterError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            })),
        }
    }
}

/// Returns true for lowercase DNS-label style names.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let mut chars = name.chars();

    // First character must be a letter
    if let Some(first) = chars.next()
        && !first.is_ascii_lowercase() {
            return false;
        }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
