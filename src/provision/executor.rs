//! Software installation executor interface.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use crate::planner::InstallPlan;

/// Installs cluster software onto provisioned infrastructure.
///
/// The controller calls these in order: preflight check, certificates,
/// kubeconfig, install, and finally the smoke test when the plan installs a
/// networking stack.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    /// Verifies the nodes are ready for installation.
    async fn run_preflight_check(&self, plan: &InstallPlan) -> Result<()>;

    /// Generates cluster certificates, replacing existing ones when `overwrite` is set.
    async fn generate_certificates(&self, plan: &InstallPlan, overwrite: bool) -> Result<()>;

    /// Generates the client configuration for the cluster.
    async fn generate_kubeconfig(&self, plan: &InstallPlan) -> Result<()>;

    /// Installs the cluster software.
    async fn install(&self, plan: &InstallPlan, restart_services: bool) -> Result<()>;

    /// Runs a smoke test against the installed cluster.
    async fn run_smoke_test(&self, plan: &InstallPlan) -> Result<()>;
}
