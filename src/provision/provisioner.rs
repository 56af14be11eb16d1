//! Infrastructure provisioner interface.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use crate::planner::InstallPlan;
use crate::store::ClusterRecord;

/// Brings cluster infrastructure up and tears it down.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Provisions the infrastructure described by the plan.
    ///
    /// Returns the plan extended with what provisioning produced (node
    /// addresses, the load-balanced master endpoint).
    async fn provision(&self, plan: &InstallPlan) -> Result<InstallPlan>;

    /// Destroys all infrastructure belonging to the cluster.
    async fn destroy(&self, cluster_name: &str) -> Result<()>;
}

/// Creates a provisioner for the current state of a cluster record.
///
/// A provisioner is built for every provisioning or destroy action, so
/// provider changes in the record take effect immediately.
pub trait ProvisionerFactory: Send + Sync {
    /// Builds a provisioner for the record.
    fn new_provisioner(&self, record: &ClusterRecord) -> Box<dyn Provisioner>;
}

impl<F> ProvisionerFactory for F
where
    F: Fn(&ClusterRecord) -> Box<dyn Provisioner> + Send + Sync,
{
    fn new_provisioner(&self, record: &ClusterRecord) -> Box<dyn Provisioner> {
        self(record)
    }
}
