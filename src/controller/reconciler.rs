//! Per-cluster reconciliation loop.
//!
//! A [`ClusterController`] owns exactly one cluster name. Each notification
//! it receives triggers one reconciliation cycle: load the record, take at
//! most one step towards the desired state, and persist the resulting status
//! without clobbering spec edits made while the step was running.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::planner::{build_plan, InstallPlan, PlanBuilder};
use crate::provision::{Executor, ProvisionerFactory};
use crate::store::{ClusterSpec, ClusterState, ClusterStore, DesiredState};

/// Why a controller loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerExit {
    /// The cluster was destroyed and its record removed.
    Destroyed,
    /// The notification channel was closed.
    NotificationsClosed,
}

/// Drives a single cluster towards its desired state.
pub struct ClusterController {
    /// Name of the managed cluster.
    pub(super) cluster_name: String,
    /// Spec observed after the last successful persist.
    pub(super) cluster_spec: Option<ClusterSpec>,
    /// Plan produced by the last successful planning or provisioning step.
    ///
    /// Only held in memory; a restarted controller re-plans from the spec.
    pub(super) install_plan: Option<InstallPlan>,
    /// Record store.
    pub(super) store: Arc<dyn ClusterStore>,
    /// Installation executor.
    pub(super) executor: Arc<dyn Executor>,
    /// Provisioner factory.
    pub(super) provisioners: Arc<dyn ProvisionerFactory>,
    /// Plan builder.
    pub(super) planner: Arc<dyn PlanBuilder>,
}

impl ClusterController {
    /// Creates a controller with no cached spec.
    ///
    /// The first record it loads is treated as a spec change, so the cluster
    /// is planned again unless it is being destroyed.
    #[must_use]
    pub fn new(
        cluster_name: impl Into<String>,
        store: Arc<dyn ClusterStore>,
        executor: Arc<dyn Executor>,
        provisioners: Arc<dyn ProvisionerFactory>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            cluster_spec: None,
            install_plan: None,
            store,
            executor,
            provisioners,
            planner: Arc::new(build_plan),
        }
    }

    /// Replaces the plan builder.
    #[must_use]
    pub fn with_plan_builder(mut self, planner: Arc<dyn PlanBuilder>) -> Self {
        self.planner = planner;
        self
    }

    /// Seeds the cached spec.
    #[must_use]
    pub fn with_cached_spec(mut self, spec: ClusterSpec) -> Self {
        self.cluster_spec = Some(spec);
        self
    }

    /// Returns the managed cluster name.
    #[must_use]
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Runs one reconciliation cycle per notification until the cluster is
    /// destroyed or the channel closes.
    pub async fn run(mut self, mut notifications: mpsc::Receiver<()>) -> ControllerExit {
        info!("Started controller for cluster '{}'", self.cluster_name);

        while notifications.recv().await.is_some() {
            if let Some(exit) = self.reconcile().await {
                return exit;
            }
        }

        info!("Stopping controller for cluster '{}'", self.cluster_name);
        ControllerExit::NotificationsClosed
    }

    /// Performs a single reconciliation cycle.
    ///
    /// Returns `Some` when the loop must stop. Store failures are logged and
    /// abort the cycle; the next notification starts over.
    pub(crate) async fn reconcile(&mut self) -> Option<ControllerExit> {
        let mut record = match self.store.get(&self.cluster_name).await {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to get cluster '{}' from store: {e}", self.cluster_name);
                return None;
            }
        };

        debug!(
            "Cluster '{}': current state '{}', desired state '{}', waiting for retry: {}",
            self.cluster_name,
            record.status.current_state,
            record.spec.desired_state,
            record.status.waiting_for_manual_retry
        );

        if self.cluster_spec.as_ref() != Some(&record.spec)
            && record.spec.desired_state != DesiredState::Destroyed
        {
            if record.status.current_state != ClusterState::Planning {
                info!("Cluster '{}': spec changed, planning again", self.cluster_name);
            }
            record.status.current_state = ClusterState::Planning;
        }

        if record.is_converged() || record.status.waiting_for_manual_retry {
            return None;
        }

        let transitioned = self.transition(record).await;

        // Transitions take minutes; merge the new status into the latest
        // record so concurrent spec edits survive.
        let mut latest = match self.store.get(&self.cluster_name).await {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to get cluster '{}' from store: {e}", self.cluster_name);
                return None;
            }
        };
        latest.status = transitioned.status;
        latest.touch();

        if let Err(e) = self.store.put(&self.cluster_name, &latest).await {
            error!(
                "Failed to store cluster '{}': {e}. Current state is '{}', desired state is '{}'",
                self.cluster_name, latest.status.current_state, latest.spec.desired_state
            );
            return None;
        }

        self.cluster_spec = Some(latest.spec);

        if latest.status.current_state == ClusterState::Destroyed {
            // The infrastructure is gone at this point; a failed delete
            // leaves a destroyed record that nothing will remove.
            if let Err(e) = self.store.delete(&self.cluster_name).await {
                error!(
                    "Could not delete destroyed cluster '{}' from store: {e}",
                    self.cluster_name
                );
                return None;
            }
            info!("Cluster '{}' has been destroyed, stopping controller", self.cluster_name);
            return Some(ControllerExit::Destroyed);
        }

        None
    }
}

impl std::fmt::Debug for ClusterController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterController")
            .field("cluster_name", &self.cluster_name)
            .field("cluster_spec", &self.cluster_spec)
            .field("has_install_plan", &self.install_plan.is_some())
            .finish_non_exhaustive()
    }
}
