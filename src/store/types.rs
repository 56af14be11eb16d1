//! Cluster record types.
//!
//! A cluster record is the unit of durable storage: the user-declared
//! [`ClusterSpec`] plus the controller-owned [`ClusterStatus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Lifecycle stage a user asks the controller to reach.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// The cluster is provisioned and its software installed.
    #[default]
    Installed,
    /// The cluster's infrastructure is torn down.
    Destroyed,
}

/// Lifecycle stage maintained by the controller.
///
/// Serialized as its camelCase name, with the initial state as the empty
/// string. Names this controller does not know are kept verbatim in
/// [`ClusterState::Unknown`] so they survive being written back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ClusterState {
    /// Freshly created record, nothing has happened yet.
    #[default]
    Initial,
    /// An installation plan is being built.
    Planning,
    /// Building the plan failed.
    PlanningFailed,
    /// A plan is ready.
    Planned,
    /// Infrastructure is being provisioned.
    Provisioning,
    /// Provisioning failed.
    ProvisionFailed,
    /// Infrastructure is up.
    Provisioned,
    /// Software is being installed.
    Installing,
    /// Installation failed.
    InstallFailed,
    /// Software is installed.
    Installed,
    /// Reserved for in-place modification; nothing transitions here.
    Modifying,
    /// Reserved for in-place modification; nothing transitions here.
    ModifyFailed,
    /// Infrastructure is being torn down.
    Destroying,
    /// Tearing down failed.
    DestroyFailed,
    /// Infrastructure is gone.
    Destroyed,
    /// A persisted state this controller does not recognize, as stored.
    Unknown(String),
}

/// Provisioning provider selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProvisionerSpec {
    /// Provider identifier (e.g. "aws", "azure").
    #[serde(default)]
    pub provider: String,
    /// Provider-specific options, handed to the provisioner verbatim.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Desired shape and lifecycle target of a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Target lifecycle stage.
    pub desired_state: DesiredState,
    /// Provisioning provider and its options.
    #[serde(default)]
    pub provisioner: ProvisionerSpec,
    /// Number of etcd nodes.
    #[serde(default)]
    pub etcd_count: u32,
    /// Number of master nodes.
    #[serde(default)]
    pub master_count: u32,
    /// Number of worker nodes.
    #[serde(default)]
    pub worker_count: u32,
    /// Number of ingress nodes.
    #[serde(default)]
    pub ingress_count: u32,
}

/// Controller-owned status of a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Current lifecycle stage.
    #[serde(default)]
    pub current_state: ClusterState,
    /// Set when the controller refuses to act until a human acknowledges a failure.
    #[serde(default)]
    pub waiting_for_manual_retry: bool,
    /// Cluster endpoint, known once provisioning succeeds.
    #[serde(default)]
    pub cluster_endpoint: String,
}

/// A durable `{spec, status}` pair identified by cluster name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    /// Cluster name (store key).
    pub name: String,
    /// Desired state, writable by users at any time.
    pub spec: ClusterSpec,
    /// Current state, written only by the owning controller.
    #[serde(default)]
    pub status: ClusterStatus,
    /// When the controller last persisted this record.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DesiredState {
    /// Returns the lifecycle state that satisfies this desired state.
    #[must_use]
    pub const fn as_state(self) -> ClusterState {
        match self {
            Self::Installed => ClusterState::Installed,
            Self::Destroyed => ClusterState::Destroyed,
        }
    }

    /// Returns the serialized name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Destroyed => "destroyed",
        }
    }
}

impl ClusterState {
    /// Returns true when this state satisfies the desired state.
    #[must_use]
    pub fn satisfies(&self, desired: DesiredState) -> bool {
        *self == desired.as_state()
    }

    /// Returns true for the `*Failed` states.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::PlanningFailed
                | Self::ProvisionFailed
                | Self::InstallFailed
                | Self::ModifyFailed
                | Self::DestroyFailed
        )
    }

    /// Returns true for states whose next step needs an in-memory install plan.
    #[must_use]
    pub const fn requires_plan(&self) -> bool {
        matches!(
            self,
            Self::Planned
                | Self::Provisioning
                | Self::ProvisionFailed
                | Self::Provisioned
                | Self::Installing
                | Self::InstallFailed
        )
    }

    /// Parses a serialized name; anything unrecognized becomes `Unknown`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "" => Self::Initial,
            "planning" => Self::Planning,
            "planningFailed" => Self::PlanningFailed,
            "planned" => Self::Planned,
            "provisioning" => Self::Provisioning,
            "provisionFailed" => Self::ProvisionFailed,
            "provisioned" => Self::Provisioned,
            "installing" => Self::Installing,
            "installFailed" => Self::InstallFailed,
            "installed" => Self::Installed,
            "modifying" => Self::Modifying,
            "modifyFailed" => Self::ModifyFailed,
            "destroying" => Self::Destroying,
            "destroyFailed" => Self::DestroyFailed,
            "destroyed" => Self::Destroyed,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns the serialized name ("" for the initial state).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initial => "",
            Self::Planning => "planning",
            Self::PlanningFailed => "planningFailed",
            Self::Planned => "planned",
            Self::Provisioning => "provisioning",
            Self::ProvisionFailed => "provisionFailed",
            Self::Provisioned => "provisioned",
            Self::Installing => "installing",
            Self::InstallFailed => "installFailed",
            Self::Installed => "installed",
            Self::Modifying => "modifying",
            Self::ModifyFailed => "modifyFailed",
            Self::Destroying => "destroying",
            Self::DestroyFailed => "destroyFailed",
            Self::Destroyed => "destroyed",
            Self::Unknown(raw) => raw.as_str(),
        }
    }
}

impl Serialize for ClusterState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClusterState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

impl ClusterSpec {
    /// Creates a spec that asks for an installed cluster with the given node counts.
    #[must_use]
    pub fn installed(provider: &str, etcd: u32, master: u32, worker: u32, ingress: u32) -> Self {
        Self {
            desired_state: DesiredState::Installed,
            provisioner: ProvisionerSpec {
                provider: provider.to_string(),
                options: BTreeMap::new(),
            },
            etcd_count: etcd,
            master_count: master,
            worker_count: worker,
            ingress_count: ingress,
        }
    }

    /// Returns the total number of nodes across all roles.
    #[must_use]
    pub const fn total_nodes(&self) -> u32 {
        self.etcd_count
            .saturating_add(self.master_count)
            .saturating_add(self.worker_count)
            .saturating_add(self.ingress_count)
    }
}

impl ClusterRecord {
    /// Creates a record in the initial state.
    #[must_use]
    pub fn new(name: &str, spec: ClusterSpec) -> Self {
        Self {
            name: name.to_string(),
            spec,
            status: ClusterStatus::default(),
            updated_at: None,
        }
    }

    /// Returns true when the current state already satisfies the desired state.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.status.current_state.satisfies(self.spec.desired_state)
    }

    /// Records a persistence timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
