//! Controller configuration.
//!
//! This module handles all configuration-related functionality:
//! - Parsing `clusterctl.yaml` with environment overrides
//! - Validation of configuration values and cluster specs
//! - Fingerprinting cluster specs

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    ControllerConfig, ControllerSettings, StoreBackend, StoreConfig, ToolingConfig,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_STORE_PATH, DEFAULT_TOOL_BINARY, DEFAULT_WORK_DIR,
};
pub use parser::{find_config_file, ConfigParser, DEFAULT_CONFIG_FILE};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub use hash::SpecHasher;
