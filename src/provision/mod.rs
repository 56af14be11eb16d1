//! External provisioning and installation collaborators.
//!
//! The controller only depends on the [`Provisioner`], [`ProvisionerFactory`]
//! and [`Executor`] traits. The `tool` implementations drive an external
//! command-line tool.

mod executor;
mod provisioner;
mod tool;

pub use executor::Executor;
#[cfg(test)]
pub use executor::MockExecutor;
pub use provisioner::{Provisioner, ProvisionerFactory};
#[cfg(test)]
pub use provisioner::MockProvisioner;
pub use tool::{ToolExecutor, ToolProvisioner, ToolProvisionerFactory, ToolRunner};
