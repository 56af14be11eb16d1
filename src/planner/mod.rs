//! Installation planning.
//!
//! This module turns a cluster spec into the concrete [`InstallPlan`] that
//! provisioning and installation operate on.

mod builder;
mod plan;
mod template;

pub use builder::{build_plan, PlanBuilder, AZURE_CNI_PROVIDER, PROVIDER_AWS, PROVIDER_AZURE};
pub use plan::{
    AddOns, AwsProvisionerOptions, CertificatesSection, ClusterSection, CniAddOn, DnsAddOn,
    InstallPlan, MasterNodeGroup, NetworkingSection, Node, NodeGroup, ProvisionerSection,
    SshSection,
};
pub use template::{generate_admin_password, write_plan_template, PlanTemplateOptions};
