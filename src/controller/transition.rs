//! Single-step transitions.
//!
//! A transition executes the [`Step`] chosen by the state machine and encodes
//! the outcome in the record's status. It never fails: errors become a
//! `*Failed` state, and most of them also set `waiting_for_manual_retry` so
//! the controller does not retry in a tight loop.

use tracing::{error, info, warn};

use crate::store::{ClusterRecord, ClusterState};

use super::reconciler::ClusterController;
use super::state_machine::Step;

impl ClusterController {
    /// Takes the cluster one step towards its desired state.
    pub async fn transition(&mut self, mut record: ClusterRecord) -> ClusterRecord {
        let current = record.status.current_state.clone();
        let desired = record.spec.desired_state;

        match current.next_step(desired) {
            Step::Noop => record,
            Step::Advance(next) => {
                info!("Cluster '{}': {current:?} -> {next:?}", self.cluster_name);
                record.status.current_state = next;
                record
            }
            Step::Plan => self.plan(record),
            Step::Provision => self.provision(record).await,
            Step::Install => self.install(record).await,
            Step::Destroy => self.destroy(record).await,
            Step::Stall => {
                warn!(
                    "Cluster '{}': no transition from '{current}' towards '{desired}', waiting for manual retry",
                    self.cluster_name
                );
                record.status.waiting_for_manual_retry = true;
                record
            }
        }
    }

    fn plan(&mut self, mut record: ClusterRecord) -> ClusterRecord {
        info!("Planning installation for cluster '{}'", self.cluster_name);

        let existing_password = self
            .install_plan
            .as_ref()
            .map(|plan| plan.cluster.admin_password.as_str());

        match self
            .planner
            .build_plan(&self.cluster_name, &record.spec, existing_password)
        {
            Ok(plan) => {
                self.install_plan = Some(plan);
                record.status.current_state = ClusterState::Planned;
            }
            Err(e) => {
                error!("Failed to plan installation for cluster '{}': {e}", self.cluster_name);
                stall(&mut record, ClusterState::PlanningFailed);
            }
        }
        record
    }

    async fn provision(&mut self, mut record: ClusterRecord) -> ClusterRecord {
        let Some(plan) = self.install_plan.as_ref() else {
            warn!("Cluster '{}': no install plan in memory, planning again", self.cluster_name);
            record.status.current_state = ClusterState::Planning;
            return record;
        };

        info!("Provisioning infrastructure for cluster '{}'", self.cluster_name);
        let provisioner = self.provisioners.new_provisioner(&record);

        match provisioner.provision(plan).await {
            Ok(updated) => {
                record.status.cluster_endpoint = updated.master.load_balanced_fqdn.clone();
                record.status.current_state = ClusterState::Provisioned;
                self.install_plan = Some(updated);
            }
            Err(e) => {
                error!(
                    "Failed to provision infrastructure for cluster '{}': {e}",
                    self.cluster_name
                );
                stall(&mut record, ClusterState::ProvisionFailed);
            }
        }
        record
    }

    async fn destroy(&mut self, mut record: ClusterRecord) -> ClusterRecord {
        info!("Destroying cluster '{}'", self.cluster_name);
        let provisioner = self.provisioners.new_provisioner(&record);

        match provisioner.destroy(&self.cluster_name).await {
            Ok(()) => record.status.current_state = ClusterState::Destroyed,
            Err(e) => {
                error!("Failed to destroy cluster '{}': {e}", self.cluster_name);
                stall(&mut record, ClusterState::DestroyFailed);
            }
        }
        record
    }

    async fn install(&mut self, mut record: ClusterRecord) -> ClusterRecord {
        let Some(plan) = self.install_plan.as_ref() else {
            warn!("Cluster '{}': no install plan in memory, planning again", self.cluster_name);
            record.status.current_state = ClusterState::Planning;
            return record;
        };

        info!("Installing cluster '{}'", self.cluster_name);
        let executor = &self.executor;

        let steps = async {
            executor
                .run_preflight_check(plan)
                .await
                .map_err(|e| ("running preflight checks", e))?;
            executor
                .generate_certificates(plan, false)
                .await
                .map_err(|e| ("generating certificates", e))?;
            executor
                .generate_kubeconfig(plan)
                .await
                .map_err(|e| ("generating kubeconfig", e))?;
            executor
                .install(plan, true)
                .await
                .map_err(|e| ("installing the cluster", e))
        };

        if let Err((action, e)) = steps.await {
            error!("Cluster '{}': error {action}: {e}", self.cluster_name);
            stall(&mut record, ClusterState::InstallFailed);
            return record;
        }

        if !plan.network_configured() {
            info!(
                "Cluster '{}': networking stack disabled, skipping smoke test",
                self.cluster_name
            );
            record.status.current_state = ClusterState::Installed;
            return record;
        }

        // A failed smoke test is retried on the next notification.
        if let Err(e) = executor.run_smoke_test(plan).await {
            error!(
                "Cluster '{}': error running smoke test against the cluster: {e}",
                self.cluster_name
            );
            record.status.current_state = ClusterState::InstallFailed;
            return record;
        }

        record.status.current_state = ClusterState::Installed;
        record
    }
}

/// Moves the record to a failed state that waits for a manual retry.
fn stall(record: &mut ClusterRecord, failed: ClusterState) {
    record.status.current_state = failed;
    record.status.waiting_for_manual_retry = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InstallError, PlanError, ProvisionError};
    use crate::planner::{build_plan, CniAddOn, InstallPlan, PlanBuilder};
    use crate::provision::{
        Executor, MockExecutor, MockProvisioner, Provisioner, ProvisionerFactory,
    };
    use crate::store::{ClusterSpec, DesiredState, MemoryClusterStore};
    use mockall::Sequence;
    use std::sync::Arc;

    const NAME: &str = "alpha";

    fn spec() -> ClusterSpec {
        ClusterSpec::installed("aws", 1, 1, 1, 0)
    }

    fn record_in(state: ClusterState, desired: DesiredState) -> ClusterRecord {
        let mut record = ClusterRecord::new(NAME, spec());
        record.spec.desired_state = desired;
        record.status.current_state = state;
        record
    }

    fn plan() -> InstallPlan {
        build_plan(NAME, &spec(), Some("secret")).unwrap()
    }

    fn factory(build: fn() -> MockProvisioner) -> Arc<dyn ProvisionerFactory> {
        Arc::new(move |_: &ClusterRecord| -> Box<dyn Provisioner> { Box::new(build()) })
    }

    fn controller(
        executor: MockExecutor,
        provisioners: Arc<dyn ProvisionerFactory>,
        plan: Option<InstallPlan>,
    ) -> ClusterController {
        let executor: Arc<dyn Executor> = Arc::new(executor);
        let mut controller = ClusterController::new(
            NAME,
            Arc::new(MemoryClusterStore::new()),
            executor,
            provisioners,
        );
        controller.install_plan = plan;
        controller
    }

    fn install_step_error() -> crate::error::ClusterError {
        InstallError::step("install", "exit code Some(1)").into()
    }

    fn executor_up_to_install() -> (MockExecutor, Sequence) {
        let mut seq = Sequence::new();
        let mut executor = MockExecutor::new();
        executor
            .expect_run_preflight_check()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        executor
            .expect_generate_certificates()
            .withf(|_, overwrite| !*overwrite)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        executor
            .expect_generate_kubeconfig()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        executor
            .expect_install()
            .withf(|_, restart_services| *restart_services)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        (executor, seq)
    }

    #[tokio::test]
    async fn test_advance_steps_have_no_side_effects() {
        let mut controller = controller(MockExecutor::new(), factory(MockProvisioner::new), None);

        let record = controller
            .transition(record_in(ClusterState::Initial, DesiredState::Installed))
            .await;
        assert_eq!(record.status.current_state, ClusterState::Planning);

        let record = controller
            .transition(record_in(ClusterState::InstallFailed, DesiredState::Destroyed))
            .await;
        assert_eq!(record.status.current_state, ClusterState::Destroying);
        assert!(!record.status.waiting_for_manual_retry);
    }

    #[tokio::test]
    async fn test_installed_with_desired_installed_is_noop() {
        let mut controller = controller(MockExecutor::new(), factory(MockProvisioner::new), None);
        let record = record_in(ClusterState::Installed, DesiredState::Installed);

        let transitioned = controller.transition(record.clone()).await;
        assert_eq!(transitioned, record);
    }

    #[tokio::test]
    async fn test_unmapped_states_stall() {
        let mut controller = controller(MockExecutor::new(), factory(MockProvisioner::new), None);

        for state in [
            ClusterState::Modifying,
            ClusterState::ModifyFailed,
            ClusterState::Unknown("upgrading".to_string()),
        ] {
            let record = controller
                .transition(record_in(state.clone(), DesiredState::Installed))
                .await;
            assert_eq!(record.status.current_state, state);
            assert!(record.status.waiting_for_manual_retry);
        }

        let record = controller
            .transition(record_in(ClusterState::DestroyFailed, DesiredState::Installed))
            .await;
        assert_eq!(record.status.current_state, ClusterState::DestroyFailed);
        assert!(record.status.waiting_for_manual_retry);
    }

    #[tokio::test]
    async fn test_plan_keeps_admin_password() {
        let mut controller =
            controller(MockExecutor::new(), factory(MockProvisioner::new), Some(plan()));

        let record = controller
            .transition(record_in(ClusterState::Planning, DesiredState::Installed))
            .await;

        assert_eq!(record.status.current_state, ClusterState::Planned);
        let plan = controller.install_plan.as_ref().unwrap();
        assert_eq!(plan.cluster.admin_password, "secret");
        assert_eq!(plan.cluster.name, NAME);
    }

    struct BrokenTemplate;

    impl PlanBuilder for BrokenTemplate {
        fn build_plan(
            &self,
            _name: &str,
            _spec: &ClusterSpec,
            _existing_admin_password: Option<&str>,
        ) -> crate::error::Result<InstallPlan> {
            Err(PlanError::Template {
                message: "template unavailable".to_string(),
            }
            .into())
        }
    }

    #[tokio::test]
    async fn test_plan_failure_stalls_and_keeps_previous_plan() {
        let mut controller =
            controller(MockExecutor::new(), factory(MockProvisioner::new), Some(plan()))
                .with_plan_builder(Arc::new(BrokenTemplate));

        let record = controller
            .transition(record_in(ClusterState::Planning, DesiredState::Installed))
            .await;

        assert_eq!(record.status.current_state, ClusterState::PlanningFailed);
        assert!(record.status.waiting_for_manual_retry);
        assert_eq!(controller.install_plan, Some(plan()));
    }

    #[tokio::test]
    async fn test_first_plan_generates_password() {
        let mut controller = controller(MockExecutor::new(), factory(MockProvisioner::new), None);

        controller
            .transition(record_in(ClusterState::Planning, DesiredState::Installed))
            .await;

        let plan = controller.install_plan.as_ref().unwrap();
        assert!(!plan.cluster.admin_password.is_empty());
    }

    #[tokio::test]
    async fn test_provision_records_endpoint_and_plan() {
        fn provisioner() -> MockProvisioner {
            let mut provisioner = MockProvisioner::new();
            provisioner.expect_provision().times(1).returning(|plan| {
                let mut plan = plan.clone();
                plan.master.load_balanced_fqdn = "alpha-lb.example.com".to_string();
                Ok(plan)
            });
            provisioner
        }
        let mut controller = controller(MockExecutor::new(), factory(provisioner), Some(plan()));

        let record = controller
            .transition(record_in(ClusterState::Provisioning, DesiredState::Installed))
            .await;

        assert_eq!(record.status.current_state, ClusterState::Provisioned);
        assert_eq!(record.status.cluster_endpoint, "alpha-lb.example.com");
        assert_eq!(
            controller.install_plan.as_ref().unwrap().master.load_balanced_fqdn,
            "alpha-lb.example.com"
        );
    }

    #[tokio::test]
    async fn test_provision_failure_stalls() {
        fn provisioner() -> MockProvisioner {
            let mut provisioner = MockProvisioner::new();
            provisioner.expect_provision().returning(|_| {
                Err(ProvisionError::InvalidPlan {
                    message: "missing nodes".to_string(),
                }
                .into())
            });
            provisioner
        }
        let mut controller = controller(MockExecutor::new(), factory(provisioner), Some(plan()));

        let record = controller
            .transition(record_in(ClusterState::Provisioning, DesiredState::Installed))
            .await;

        assert_eq!(record.status.current_state, ClusterState::ProvisionFailed);
        assert!(record.status.waiting_for_manual_retry);
        assert!(record.status.cluster_endpoint.is_empty());
    }

    #[tokio::test]
    async fn test_provision_without_plan_replans() {
        fn provisioner() -> MockProvisioner {
            let mut provisioner = MockProvisioner::new();
            provisioner.expect_provision().never();
            provisioner
        }
        let mut controller = controller(MockExecutor::new(), factory(provisioner), None);

        let record = controller
            .transition(record_in(ClusterState::Provisioning, DesiredState::Installed))
            .await;

        assert_eq!(record.status.current_state, ClusterState::Planning);
        assert!(!record.status.waiting_for_manual_retry);
    }

    #[tokio::test]
    async fn test_destroy_outcomes() {
        fn destroys() -> MockProvisioner {
            let mut provisioner = MockProvisioner::new();
            provisioner
                .expect_destroy()
                .withf(|name| name == NAME)
                .times(1)
                .returning(|_| Ok(()));
            provisioner
        }
        fn fails() -> MockProvisioner {
            let mut provisioner = MockProvisioner::new();
            provisioner.expect_destroy().returning(|_| {
                Err(ProvisionError::ToolFailed {
                    operation: "destroy".to_string(),
                    code: Some(2),
                    stderr: "access denied".to_string(),
                }
                .into())
            });
            provisioner
        }

        let mut ok = controller(MockExecutor::new(), factory(destroys), None);
        let record = ok
            .transition(record_in(ClusterState::Destroying, DesiredState::Destroyed))
            .await;
        assert_eq!(record.status.current_state, ClusterState::Destroyed);

        let mut failing = controller(MockExecutor::new(), factory(fails), None);
        let record = failing
            .transition(record_in(ClusterState::Destroying, DesiredState::Destroyed))
            .await;
        assert_eq!(record.status.current_state, ClusterState::DestroyFailed);
        assert!(record.status.waiting_for_manual_retry);
    }

    #[tokio::test]
    async fn test_install_runs_pipeline_in_order() {
        let (mut executor, mut seq) = executor_up_to_install();
        executor
            .expect_run_smoke_test()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let mut controller = controller(executor, factory(MockProvisioner::new), Some(plan()));

        let record = controller
            .transition(record_in(ClusterState::Installing, DesiredState::Installed))
            .await;

        assert_eq!(record.status.current_state, ClusterState::Installed);
        assert!(!record.status.waiting_for_manual_retry);
    }

    #[tokio::test]
    async fn test_install_skips_smoke_test_without_networking() {
        let (mut executor, _seq) = executor_up_to_install();
        executor.expect_run_smoke_test().never();

        let mut plan = plan();
        plan.add_ons.cni = Some(CniAddOn {
            disable: true,
            provider: "calico".to_string(),
        });
        let mut controller = controller(executor, factory(MockProvisioner::new), Some(plan));

        let record = controller
            .transition(record_in(ClusterState::Installing, DesiredState::Installed))
            .await;

        assert_eq!(record.status.current_state, ClusterState::Installed);
    }

    #[tokio::test]
    async fn test_install_step_failure_stops_pipeline() {
        let mut executor = MockExecutor::new();
        executor.expect_run_preflight_check().returning(|_| Ok(()));
        executor.expect_generate_certificates().returning(|_, _| Ok(()));
        executor
            .expect_generate_kubeconfig()
            .returning(|_| Err(InstallError::step("kubeconfig generation", "no ca").into()));
        executor.expect_install().never();
        executor.expect_run_smoke_test().never();
        let mut controller = controller(executor, factory(MockProvisioner::new), Some(plan()));

        let record = controller
            .transition(record_in(ClusterState::Installing, DesiredState::Installed))
            .await;

        assert_eq!(record.status.current_state, ClusterState::InstallFailed);
        assert!(record.status.waiting_for_manual_retry);
    }

    #[tokio::test]
    async fn test_install_failure_stalls() {
        let mut executor = MockExecutor::new();
        executor.expect_run_preflight_check().returning(|_| Ok(()));
        executor.expect_generate_certificates().returning(|_, _| Ok(()));
        executor.expect_generate_kubeconfig().returning(|_| Ok(()));
        executor
            .expect_install()
            .returning(|_, _| Err(install_step_error()));
        let mut controller = controller(executor, factory(MockProvisioner::new), Some(plan()));

        let record = controller
            .transition(record_in(ClusterState::Installing, DesiredState::Installed))
            .await;

        assert_eq!(record.status.current_state, ClusterState::InstallFailed);
        assert!(record.status.waiting_for_manual_retry);
    }

    #[tokio::test]
    async fn test_smoke_test_failure_does_not_stall() {
        let (mut executor, mut seq) = executor_up_to_install();
        executor
            .expect_run_smoke_test()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(InstallError::step("smoke test", "pods not ready").into()));
        let mut controller = controller(executor, factory(MockProvisioner::new), Some(plan()));

        let record = controller
            .transition(record_in(ClusterState::Installing, DesiredState::Installed))
            .await;

        assert_eq!(record.status.current_state, ClusterState::InstallFailed);
        assert!(!record.status.waiting_for_manual_retry);
    }

    #[test]
    fn test_stall_sets_flag() {
        let mut record = record_in(ClusterState::Planning, DesiredState::Installed);
        stall(&mut record, ClusterState::PlanningFailed);
        assert_eq!(record.status.current_state, ClusterState::PlanningFailed);
        assert!(record.status.waiting_for_manual_retry);
    }
}
