//! Plan template rendering.
//!
//! The template is a YAML document with one placeholder node per requested
//! node and sensible defaults for everything a spec does not express.

use std::fmt::Write;
use uuid::Uuid;

use crate::error::PlanError;

/// Default pod network.
pub const DEFAULT_POD_CIDR: &str = "172.16.0.0/16";

/// Default service network.
pub const DEFAULT_SERVICE_CIDR: &str = "172.20.0.0/16";

/// Default certificate validity.
pub const DEFAULT_CERT_EXPIRY: &str = "17520h";

/// Default CNI implementation.
pub const DEFAULT_CNI_PROVIDER: &str = "calico";

/// Inputs to the plan template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanTemplateOptions {
    /// Admin password to embed; a random one is generated when empty.
    pub admin_password: String,
    /// Number of etcd nodes.
    pub etcd_nodes: u32,
    /// Number of master nodes.
    pub master_nodes: u32,
    /// Number of worker nodes.
    pub worker_nodes: u32,
    /// Number of ingress nodes.
    pub ingress_nodes: u32,
}

/// Renders the plan template for the given options.
///
/// # Errors
///
/// Returns an error if the document cannot be written.
pub fn write_plan_template(options: &PlanTemplateOptions) -> Result<String, PlanError> {
    render(options).map_err(|e| PlanError::Template {
        message: e.to_string(),
    })
}

fn render(options: &PlanTemplateOptions) -> Result<String, std::fmt::Error> {
    let password = if options.admin_password.is_empty() {
        generate_admin_password()
    } else {
        options.admin_password.clone()
    };

    let mut out = String::new();
    writeln!(out, "cluster:")?;
    writeln!(out, "  name: ''")?;
    writeln!(out, "  admin_password: {}", yaml_quote(&password))?;
    writeln!(out, "  disable_package_installation: false")?;
    writeln!(out, "  networking:")?;
    writeln!(out, "    pod_cidr_block: {DEFAULT_POD_CIDR}")?;
    writeln!(out, "    service_cidr_block: {DEFAULT_SERVICE_CIDR}")?;
    writeln!(out, "  certificates:")?;
    writeln!(out, "    expiry: {DEFAULT_CERT_EXPIRY}")?;
    writeln!(out, "  ssh:")?;
    writeln!(out, "    user: clusteradmin")?;
    writeln!(out, "    ssh_key: cluster.pem")?;
    writeln!(out, "    ssh_port: 22")?;
    writeln!(out, "add_ons:")?;
    writeln!(out, "  cni:")?;
    writeln!(out, "    disable: false")?;
    writeln!(out, "    provider: {DEFAULT_CNI_PROVIDER}")?;
    writeln!(out, "  dns:")?;
    writeln!(out, "    disable: false")?;
    write_group(&mut out, "etcd", options.etcd_nodes)?;
    write_group(&mut out, "master", options.master_nodes)?;
    writeln!(out, "  load_balanced_fqdn: ''")?;
    writeln!(out, "  load_balanced_short_name: ''")?;
    write_group(&mut out, "worker", options.worker_nodes)?;
    write_group(&mut out, "ingress", options.ingress_nodes)?;
    Ok(out)
}

/// Writes a node group with placeholder hosts.
fn write_group(out: &mut String, role: &str, count: u32) -> std::fmt::Result {
    writeln!(out, "{role}:")?;
    writeln!(out, "  expected_count: {count}")?;
    if count == 0 {
        return writeln!(out, "  nodes: []");
    }
    writeln!(out, "  nodes:")?;
    for i in 1..=count {
        writeln!(out, "  - host: {role}{i:03}")?;
        writeln!(out, "    ip: ''")?;
        writeln!(out, "    internal_ip: ''")?;
    }
    Ok(())
}

/// Quotes a value as a single-quoted YAML scalar.
fn yaml_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Generates a random admin password.
#[must_use]
pub fn generate_admin_password() -> String {
    Uuid::new_v4().simple().to_string()
}
