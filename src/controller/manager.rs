//! Controller supervision.
//!
//! The [`ControllerManager`] owns one [`ClusterController`] task per cluster
//! record. Every sync lists the store, adopts new records, forgets removed
//! ones and wakes every live controller.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SpecHasher;
use crate::error::Result;
use crate::provision::{Executor, ProvisionerFactory};
use crate::store::{ClusterRecord, ClusterStore};

use super::reconciler::{ClusterController, ControllerExit};

/// A running controller task and its wake-up channel.
#[derive(Debug)]
struct ControllerHandle {
    notifier: mpsc::Sender<()>,
    task: JoinHandle<ControllerExit>,
}

/// Summary of one sync pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Controllers started for newly seen records.
    pub started: Vec<String>,
    /// Controllers dropped because their record disappeared.
    pub removed: Vec<String>,
    /// Controllers that had exited and were reaped.
    pub finished: Vec<String>,
    /// Controllers notified.
    pub notified: usize,
}

/// Starts, notifies and reaps per-cluster controllers.
pub struct ControllerManager {
    store: Arc<dyn ClusterStore>,
    executor: Arc<dyn Executor>,
    provisioners: Arc<dyn ProvisionerFactory>,
    controllers: BTreeMap<String, ControllerHandle>,
}

impl ControllerManager {
    /// Creates a manager with no running controllers.
    #[must_use]
    pub fn new(
        store: Arc<dyn ClusterStore>,
        executor: Arc<dyn Executor>,
        provisioners: Arc<dyn ProvisionerFactory>,
    ) -> Self {
        Self {
            store,
            executor,
            provisioners,
            controllers: BTreeMap::new(),
        }
    }

    /// Returns the names of clusters with a live controller.
    #[must_use]
    pub fn managed(&self) -> Vec<String> {
        self.controllers.keys().cloned().collect()
    }

    /// Reconciles the set of controllers with the store and wakes them all.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub async fn sync(&mut self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        self.reap(&mut report).await;

        let names = self.store.list().await?;

        let gone: Vec<String> = self
            .controllers
            .keys()
            .filter(|name| !names.contains(name))
            .cloned()
            .collect();
        for name in gone {
            // Dropping the sender closes the channel; the controller exits
            // once its current cycle completes.
            if self.controllers.remove(&name).is_some() {
                info!("Cluster '{name}' no longer in store, releasing its controller");
                report.removed.push(name);
            }
        }

        for name in names {
            if self.controllers.contains_key(&name) {
                continue;
            }
            let record = match self.store.get(&name).await {
                Ok(record) => record,
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    error!("Failed to get cluster '{name}' from store: {e}");
                    continue;
                }
            };
            self.start(record);
            report.started.push(name);
        }

        for (name, handle) in &self.controllers {
            match handle.notifier.try_send(()) {
                // A full channel means a wake-up is already pending.
                Ok(()) | Err(TrySendError::Full(())) => report.notified += 1,
                Err(TrySendError::Closed(())) => {
                    debug!("Controller for cluster '{name}' has stopped");
                }
            }
        }

        Ok(report)
    }

    /// Calls [`sync`](Self::sync) every `poll_interval` until `shutdown`
    /// resolves, then stops every controller.
    pub async fn run<F>(mut self, poll_interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("Controller manager started, polling every {poll_interval:?}");

        let mut ticker = tokio::time::interval(poll_interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.sync().await {
                        Ok(report) => debug!(
                            "Sync: {} started, {} removed, {} notified",
                            report.started.len(),
                            report.removed.len(),
                            report.notified
                        ),
                        Err(e) => error!("Failed to list clusters: {e}"),
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Closes every notification channel and waits for the controllers to
    /// finish their current cycle.
    pub async fn shutdown(&mut self) {
        let controllers = std::mem::take(&mut self.controllers);
        info!("Stopping {} controller(s)", controllers.len());

        for (name, handle) in controllers {
            drop(handle.notifier);
            match handle.task.await {
                Ok(exit) => debug!("Controller for cluster '{name}' exited: {exit:?}"),
                Err(e) => error!("Controller for cluster '{name}' panicked: {e}"),
            }
        }
    }

    fn start(&mut self, record: ClusterRecord) {
        let hash = SpecHasher::new().hash_spec(&record.spec);
        info!(
            "Starting controller for cluster '{}' in state {} (spec {})",
            record.name,
            record.status.current_state,
            &hash[..8]
        );

        let mut controller = ClusterController::new(
            record.name.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.executor),
            Arc::clone(&self.provisioners),
        );
        // Mid-pipeline records need a plan that only lived in the previous
        // controller's memory; leaving the cache empty forces re-planning.
        if !record.status.current_state.requires_plan() {
            controller = controller.with_cached_spec(record.spec);
        }

        let (notifier, notifications) = mpsc::channel(1);
        let task = tokio::spawn(controller.run(notifications));
        self.controllers
            .insert(record.name, ControllerHandle { notifier, task });
    }

    async fn reap(&mut self, report: &mut SyncReport) {
        let finished: Vec<String> = self
            .controllers
            .iter()
            .filter(|(_, handle)| handle.task.is_finished())
            .map(|(name, _)| name.clone())
            .collect();

        for name in finished {
            let Some(handle) = self.controllers.remove(&name) else {
                continue;
            };
            match handle.task.await {
                Ok(ControllerExit::Destroyed) => info!("Controller for cluster '{name}' finished"),
                Ok(ControllerExit::NotificationsClosed) => {
                    warn!("Controller for cluster '{name}' stopped unexpectedly");
                }
                Err(e) => error!("Controller for cluster '{name}' panicked: {e}"),
            }
            report.finished.push(name);
        }
    }
}

impl std::fmt::Debug for ControllerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerManager")
            .field("backend", &self.store.backend_type())
            .field("controllers", &self.controllers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::InstallPlan;
    use crate::provision::{MockExecutor, Provisioner};
    use crate::store::{ClusterSpec, ClusterState, DesiredState, MemoryClusterStore};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Provisioner whose destroy blocks until released.
    struct GatedProvisioner {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Provisioner for GatedProvisioner {
        async fn provision(&self, plan: &InstallPlan) -> Result<InstallPlan> {
            Ok(plan.clone())
        }

        async fn destroy(&self, _cluster_name: &str) -> Result<()> {
            self.gate.notified().await;
            Ok(())
        }
    }

    fn manager(store: Arc<MemoryClusterStore>, gate: Arc<Notify>) -> ControllerManager {
        let provisioners: Arc<dyn ProvisionerFactory> =
            Arc::new(move |_: &ClusterRecord| -> Box<dyn Provisioner> {
                Box::new(GatedProvisioner { gate: gate.clone() })
            });
        ControllerManager::new(store, Arc::new(MockExecutor::new()), provisioners)
    }

    fn installed(name: &str) -> ClusterRecord {
        let mut record = ClusterRecord::new(name, ClusterSpec::installed("aws", 1, 1, 1, 0));
        record.status.current_state = ClusterState::Installed;
        record
    }

    fn destroying(name: &str) -> ClusterRecord {
        let mut record = installed(name);
        record.spec.desired_state = DesiredState::Destroyed;
        record.status.current_state = ClusterState::Destroying;
        record
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_sync_starts_one_controller_per_record() {
        let store = Arc::new(MemoryClusterStore::new());
        store.put("alpha", &installed("alpha")).await.unwrap();
        store.put("beta", &installed("beta")).await.unwrap();
        let mut manager = manager(store, Arc::new(Notify::new()));

        let report = manager.sync().await.unwrap();
        assert_eq!(report.started, vec!["alpha".to_string(), "beta".to_string()]);
        assert_eq!(report.notified, 2);

        let report = manager.sync().await.unwrap();
        assert!(report.started.is_empty());
        assert_eq!(manager.managed(), vec!["alpha".to_string(), "beta".to_string()]);

        manager.shutdown().await;
        assert!(manager.managed().is_empty());
    }

    #[tokio::test]
    async fn test_notifications_coalesce_while_busy() {
        let store = Arc::new(MemoryClusterStore::new());
        store.put("alpha", &destroying("alpha")).await.unwrap();
        let gate = Arc::new(Notify::new());
        let mut manager = manager(store.clone(), gate.clone());

        manager.sync().await.unwrap();
        // The controller is now blocked in destroy; extra wake-ups collapse
        // into the single pending slot instead of queueing or failing.
        for _ in 0..5 {
            let report = manager.sync().await.unwrap();
            assert_eq!(report.notified, 1);
        }

        gate.notify_one();
        let handle = manager.controllers.get("alpha").unwrap();
        wait_until(|| handle.task.is_finished()).await;

        let report = manager.sync().await.unwrap();
        assert_eq!(report.finished, vec!["alpha".to_string()]);
        assert!(manager.managed().is_empty());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_removed_record_releases_controller() {
        let store = Arc::new(MemoryClusterStore::new());
        store.put("alpha", &installed("alpha")).await.unwrap();
        let mut manager = manager(store.clone(), Arc::new(Notify::new()));
        manager.sync().await.unwrap();

        store.delete("alpha").await.unwrap();
        let report = manager.sync().await.unwrap();

        assert_eq!(report.removed, vec!["alpha".to_string()]);
        assert!(manager.managed().is_empty());
    }

    #[tokio::test]
    async fn test_mid_pipeline_record_is_replanned() {
        let store = Arc::new(MemoryClusterStore::new());
        let mut record = installed("alpha");
        record.status.current_state = ClusterState::Installing;
        store.put("alpha", &record).await.unwrap();
        let mut manager = manager(store.clone(), Arc::new(Notify::new()));

        manager.sync().await.unwrap();

        for _ in 0..200 {
            if store.get("alpha").await.unwrap().status.current_state == ClusterState::Planned {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            store.get("alpha").await.unwrap().status.current_state,
            ClusterState::Planned
        );
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryClusterStore::new());
        store.put("alpha", &installed("alpha")).await.unwrap();
        let manager = manager(store, Arc::new(Notify::new()));

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(manager.run(Duration::from_millis(10), async move {
            let _ = rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
