//! Builds installation plans from cluster specs.

use tracing::debug;

use crate::error::{PlanError, Result};
use crate::store::ClusterSpec;

use super::plan::{AwsProvisionerOptions, InstallPlan, ProvisionerSection};
use super::template::{write_plan_template, PlanTemplateOptions};

/// Provider that receives default AWS options.
pub const PROVIDER_AWS: &str = "aws";

/// Provider that receives an Azure-compatible CNI.
pub const PROVIDER_AZURE: &str = "azure";

/// CNI implementation used on Azure.
pub const AZURE_CNI_PROVIDER: &str = "weave";

/// Turns a cluster spec into an installation plan.
///
/// The controller plans through this trait; [`build_plan`] is the standard
/// implementation.
pub trait PlanBuilder: Send + Sync {
    /// Builds the plan for the named cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if no plan can be produced for the spec.
    fn build_plan(
        &self,
        name: &str,
        spec: &ClusterSpec,
        existing_admin_password: Option<&str>,
    ) -> Result<InstallPlan>;
}

impl<F> PlanBuilder for F
where
    F: Fn(&str, &ClusterSpec, Option<&str>) -> Result<InstallPlan> + Send + Sync,
{
    fn build_plan(
        &self,
        name: &str,
        spec: &ClusterSpec,
        existing_admin_password: Option<&str>,
    ) -> Result<InstallPlan> {
        self(name, spec, existing_admin_password)
    }
}

/// Builds the installation plan for a cluster.
///
/// A previously known admin password is carried over so re-planning does not
/// rotate the cluster credentials.
///
/// # Errors
///
/// Returns an error if the plan template cannot be rendered or parsed.
pub fn build_plan(
    name: &str,
    spec: &ClusterSpec,
    existing_admin_password: Option<&str>,
) -> Result<InstallPlan> {
    let options = PlanTemplateOptions {
        admin_password: existing_admin_password.unwrap_or_default().to_string(),
        etcd_nodes: spec.etcd_count,
        master_nodes: spec.master_count,
        worker_nodes: spec.worker_count,
        ingress_nodes: spec.ingress_count,
    };

    let rendered = write_plan_template(&options)?;
    let mut plan: InstallPlan = serde_yaml::from_str(&rendered).map_err(|e| PlanError::Parse {
        message: e.to_string(),
    })?;

    plan.cluster.name = name.to_string();
    plan.provisioner = ProvisionerSection {
        provider: spec.provisioner.provider.clone(),
        aws_options: None,
    };

    match spec.provisioner.provider.as_str() {
        PROVIDER_AWS => {
            plan.provisioner.aws_options = Some(AwsProvisionerOptions::default());
        }
        PROVIDER_AZURE => {
            if let Some(cni) = plan.add_ons.cni.as_mut() {
                cni.provider = AZURE_CNI_PROVIDER.to_string();
            }
        }
        other => debug!("No provider defaults for '{other}'"),
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::template::DEFAULT_CNI_PROVIDER;

    #[test]
    fn test_function_is_a_plan_builder() {
        let builder: &dyn PlanBuilder = &build_plan;
        let plan = builder
            .build_plan("alpha", &ClusterSpec::installed("aws", 1, 1, 1, 0), Some("pw"))
            .unwrap();
        assert_eq!(plan.cluster.admin_password, "pw");
    }

    #[test]
    fn test_plan_reflects_spec() {
        let spec = ClusterSpec::installed("aws", 3, 2, 4, 1);
        let plan = build_plan("alpha", &spec, None).unwrap();

        assert_eq!(plan.cluster.name, "alpha");
        assert_eq!(plan.etcd.expected_count, 3);
        assert_eq!(plan.etcd.nodes.len(), 3);
        assert_eq!(plan.master.expected_count, 2);
        assert_eq!(plan.worker.nodes.len(), 4);
        assert_eq!(plan.ingress.expected_count, 1);
        assert_eq!(plan.expected_nodes(), spec.total_nodes());
        assert!(!plan.cluster.admin_password.is_empty());
        assert!(plan.network_configured());
    }

    #[test]
    fn test_existing_password_is_reused() {
        let spec = ClusterSpec::installed("aws", 1, 1, 1, 0);
        let plan = build_plan("alpha", &spec, Some("keep-me")).unwrap();
        assert_eq!(plan.cluster.admin_password, "keep-me");

        let replanned = build_plan("alpha", &spec, Some(&plan.cluster.admin_password)).unwrap();
        assert_eq!(replanned.cluster.admin_password, "keep-me");
    }

    #[test]
    fn test_aws_gets_zero_value_options() {
        let spec = ClusterSpec::installed("aws", 1, 1, 1, 0);
        let plan = build_plan("alpha", &spec, None).unwrap();

        assert_eq!(plan.provisioner.provider, "aws");
        assert_eq!(plan.provisioner.aws_options, Some(AwsProvisionerOptions::default()));
        assert_eq!(
            plan.add_ons.cni.map(|cni| cni.provider),
            Some(DEFAULT_CNI_PROVIDER.to_string())
        );
    }

    #[test]
    fn test_azure_forces_weave() {
        let spec = ClusterSpec::installed("azure", 1, 1, 1, 0);
        let plan = build_plan("alpha", &spec, None).unwrap();

        assert_eq!(plan.provisioner.provider, "azure");
        assert!(plan.provisioner.aws_options.is_none());
        assert_eq!(
            plan.add_ons.cni.map(|cni| cni.provider),
            Some(String::from("weave"))
        );
    }

    #[test]
    fn test_unknown_provider_passes_through() {
        let spec = ClusterSpec::installed("packet", 1, 1, 1, 0);
        let plan = build_plan("alpha", &spec, None).unwrap();

        assert_eq!(plan.provisioner.provider, "packet");
        assert!(plan.provisioner.aws_options.is_none());
        assert_eq!(
            plan.add_ons.cni.map(|cni| cni.provider),
            Some(DEFAULT_CNI_PROVIDER.to_string())
        );
    }

    #[test]
    fn test_password_with_quotes_survives_rendering() {
        let spec = ClusterSpec::installed("aws", 1, 1, 1, 0);
        let plan = build_plan("alpha", &spec, Some("o'brien: #1")).unwrap();
        assert_eq!(plan.cluster.admin_password, "o'brien: #1");
    }
}
