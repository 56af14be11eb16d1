// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![cfg_attr(not(test), deny(missing_docs))] // All public items must be documented
#![warn(dead_code)]                   // Unused code is reported
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are reported
#![warn(unused_variables)]            // Unused variables are reported
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Cluster Lifecycle
//!
//! A declarative lifecycle controller for Kubernetes clusters.
//!
//! ## Overview
//!
//! Users declare clusters as records in a store: a desired state
//! (`installed` or `destroyed`), a provisioning provider and node counts.
//! One controller per record drives the cluster through a fixed lifecycle:
//!
//! ```text
//! "" -> planning -> planned -> provisioning -> provisioned
//!    -> installing -> installed -> destroying -> destroyed
//! ```
//!
//! Every stage can fail into a `*Failed` state. Most failures also stop the
//! controller until a human clears the `waitingForManualRetry` flag.
//!
//! ## Modules
//!
//! - [`store`]: Cluster record storage (local, S3, memory)
//! - [`planner`]: Installation plan building
//! - [`provision`]: Provisioner and installer collaborators
//! - [`controller`]: State machine, reconciliation loop and supervision
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```json
//! {
//!   "name": "alpha",
//!   "spec": {
//!     "desiredState": "installed",
//!     "provisioner": { "provider": "aws", "options": {} },
//!     "etcdCount": 1,
//!     "masterCount": 1,
//!     "workerCount": 2,
//!     "ingressCount": 0
//!   },
//!   "status": { "currentState": "", "waitingForManualRetry": false, "clusterEndpoint": "" }
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod planner;
pub mod provision;
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, ControllerConfig, SpecHasher};
pub use controller::{ClusterController, ControllerExit, ControllerManager, Step};
pub use error::{ClusterError, Result};
pub use planner::{build_plan, InstallPlan};
pub use provision::{Executor, Provisioner, ProvisionerFactory, ToolExecutor, ToolProvisionerFactory};
pub use store::{
    ClusterRecord, ClusterSpec, ClusterState, ClusterStatus, ClusterStore, DesiredState,
    LocalClusterStore, MemoryClusterStore, S3ClusterStore,
};
