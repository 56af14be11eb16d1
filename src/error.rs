//! Error types for the cluster lifecycle controller.
//!
//! Errors fall into two classes. Infrastructural errors (record store reads
//! and writes, configuration) are returned to callers and logged by the
//! reconciliation loop. Domain errors (planning, provisioning, installation)
//! are produced by the external collaborators and folded into the cluster
//! status by the transition function.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the cluster lifecycle controller.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Record store errors.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Provisioning errors.
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    /// Installation errors.
    #[error("Installation error: {0}")]
    Install(#[from] InstallError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the cluster.
    #[error("Cluster record not found: {name}")]
    NotFound {
        /// Cluster name.
        name: String,
    },

    /// A record already exists for the cluster.
    #[error("Cluster record already exists: {name}")]
    AlreadyExists {
        /// Cluster name.
        name: String,
    },

    /// The stored record is corrupted.
    #[error("Cluster record is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The backend failed to read, write or delete.
    #[error("{backend} store backend error: {message}")]
    Backend {
        /// Backend type name.
        backend: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// Serialization error.
    #[error("Record serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The plan template could not be rendered.
    #[error("could not render plan template: {message}")]
    Template {
        /// Description of the render failure.
        message: String,
    },

    /// The rendered plan could not be parsed.
    #[error("could not read plan: {message}")]
    Parse {
        /// Description of the parse failure.
        message: String,
    },
}

/// Provisioning errors reported by a provisioner.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The provisioning tool could not be started.
    #[error("failed to launch {tool}: {message}")]
    Launch {
        /// Tool that was invoked.
        tool: String,
        /// Description of the failure.
        message: String,
    },

    /// The provisioning tool exited unsuccessfully.
    #[error("{operation} failed with exit code {code:?}: {stderr}")]
    ToolFailed {
        /// Operation that was attempted.
        operation: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The provisioner returned a plan that could not be read.
    #[error("invalid plan returned by provisioner: {message}")]
    InvalidPlan {
        /// Description of the problem.
        message: String,
    },
}

/// Installation errors reported by an executor.
#[derive(Debug, Error)]
pub enum InstallError {
    /// An installation step failed.
    #[error("{step} failed: {message}")]
    StepFailed {
        /// Name of the failed step.
        step: String,
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

impl ClusterError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error means the record does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StoreError {
    /// Creates a backend error with the given message.
    #[must_use]
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl InstallError {
    /// Creates a step failure.
    #[must_use]
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepFailed {
            step: step.into(),
            message: message.into(),
        }
    }
}
