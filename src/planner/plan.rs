//! Installation plan types.
//!
//! An [`InstallPlan`] is the concrete description of a cluster used to drive
//! provisioning and installation. It is derived from a cluster spec by the
//! plan builder and then extended by the provisioner (node addresses, the
//! load-balanced master endpoint). It is never persisted by the controller.

use serde::{Deserialize, Serialize};

/// A complete installation plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct InstallPlan {
    /// Cluster-wide settings.
    pub cluster: ClusterSection,
    /// Add-on configuration.
    #[serde(default)]
    pub add_ons: AddOns,
    /// Provisioning provider settings.
    #[serde(default)]
    pub provisioner: ProvisionerSection,
    /// Etcd nodes.
    pub etcd: NodeGroup,
    /// Master nodes.
    pub master: MasterNodeGroup,
    /// Worker nodes.
    pub worker: NodeGroup,
    /// Ingress nodes.
    #[serde(default)]
    pub ingress: NodeGroup,
}

/// Cluster-wide plan settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClusterSection {
    /// Cluster name.
    pub name: String,
    /// Password of the cluster admin user.
    pub admin_password: String,
    /// Skip OS package installation on nodes.
    #[serde(default)]
    pub disable_package_installation: bool,
    /// Pod and service networks.
    pub networking: NetworkingSection,
    /// Certificate settings.
    pub certificates: CertificatesSection,
    /// SSH access to nodes.
    pub ssh: SshSection,
}

/// Cluster network ranges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NetworkingSection {
    /// CIDR block for pod addresses.
    pub pod_cidr_block: String,
    /// CIDR block for service addresses.
    pub service_cidr_block: String,
}

/// Certificate generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CertificatesSection {
    /// Validity period of generated certificates.
    pub expiry: String,
}

/// SSH connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SshSection {
    /// Remote user.
    pub user: String,
    /// Path to the private key.
    pub ssh_key: String,
    /// SSH port.
    pub ssh_port: u16,
}

/// Optional cluster add-ons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AddOns {
    /// Container networking add-on.
    #[serde(default)]
    pub cni: Option<CniAddOn>,
    /// Cluster DNS add-on.
    #[serde(default)]
    pub dns: Option<DnsAddOn>,
}

/// Container networking add-on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CniAddOn {
    /// Skip installing a networking stack.
    #[serde(default)]
    pub disable: bool,
    /// CNI implementation (e.g. "calico", "weave").
    pub provider: String,
}

/// Cluster DNS add-on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DnsAddOn {
    /// Skip installing cluster DNS.
    #[serde(default)]
    pub disable: bool,
}

/// Provisioning provider settings carried by the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProvisionerSection {
    /// Provider identifier.
    #[serde(default)]
    pub provider: String,
    /// AWS-specific options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_options: Option<AwsProvisionerOptions>,
}

/// AWS provisioning options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AwsProvisionerOptions {
    /// Region to provision in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// A group of nodes sharing a role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NodeGroup {
    /// Number of nodes the group should contain.
    pub expected_count: u32,
    /// Nodes in the group.
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// Master nodes plus the load-balanced endpoint in front of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MasterNodeGroup {
    /// Number of nodes the group should contain.
    pub expected_count: u32,
    /// Fully-qualified name of the master load balancer.
    #[serde(default)]
    pub load_balanced_fqdn: String,
    /// Short name of the master load balancer.
    #[serde(default)]
    pub load_balanced_short_name: String,
    /// Nodes in the group.
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// A single node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Node {
    /// Hostname.
    pub host: String,
    /// Public address, filled in by provisioning.
    #[serde(default)]
    pub ip: String,
    /// Internal address, filled in by provisioning.
    #[serde(default)]
    pub internal_ip: String,
}

impl InstallPlan {
    /// Returns true when the plan installs a networking stack.
    #[must_use]
    pub fn network_configured(&self) -> bool {
        self.add_ons.cni.as_ref().is_some_and(|cni| !cni.disable)
    }

    /// Returns the number of nodes expected across all groups.
    #[must_use]
    pub const fn expected_nodes(&self) -> u32 {
        self.etcd
            .expected_count
            .saturating_add(self.master.expected_count)
            .saturating_add(self.worker.expected_count)
            .saturating_add(self.ingress.expected_count)
    }
}
