//! Provisioner and executor backed by an external command-line tool.
//!
//! Every action writes the current plan to `<work_dir>/<cluster>/plan.yaml`
//! and invokes the configured binary with the plan file path. Provisioning
//! lets the tool rewrite the plan file in place; the updated plan is read
//! back once the tool exits successfully.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ClusterError, InstallError, ProvisionError, Result};
use crate::planner::InstallPlan;
use crate::store::ClusterRecord;

use super::executor::Executor;
use super::provisioner::{Provisioner, ProvisionerFactory};

/// Plan file name inside a cluster's working directory.
const PLAN_FILE: &str = "plan.yaml";

/// Failure of a single tool invocation.
#[derive(Debug)]
struct ToolFailure {
    code: Option<i32>,
    stderr: String,
}

/// Runs the external tool for a cluster.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    /// Tool binary.
    binary: PathBuf,
    /// Root of the per-cluster working directories.
    work_dir: PathBuf,
}

impl ToolRunner {
    /// Creates a runner for the given binary and working directory.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Returns the working directory of a cluster.
    #[must_use]
    pub fn cluster_dir(&self, cluster_name: &str) -> PathBuf {
        self.work_dir.join(cluster_name)
    }

    /// Writes the plan to the cluster's working directory and returns its path.
    async fn write_plan(&self, plan: &InstallPlan) -> Result<PathBuf> {
        let dir = self.cluster_dir(&plan.cluster.name);
        tokio::fs::create_dir_all(&dir).await?;

        let content = serde_yaml::to_string(plan)
            .map_err(|e| ClusterError::internal(format!("Failed to serialize plan: {e}")))?;
        let path = dir.join(PLAN_FILE);
        tokio::fs::write(&path, content).await?;

        debug!("Wrote plan to {}", path.display());
        Ok(path)
    }

    /// Reads a plan back from disk.
    async fn read_plan(path: &Path) -> Result<InstallPlan> {
        let content = tokio::fs::read_to_string(path).await?;
        let plan = serde_yaml::from_str(&content).map_err(|e| ProvisionError::InvalidPlan {
            message: format!("{}: {e}", path.display()),
        })?;
        Ok(plan)
    }

    /// Runs the tool with the given arguments inside `dir`.
    async fn run(
        &self,
        args: &[&str],
        dir: &Path,
        envs: &BTreeMap<String, String>,
    ) -> Result<std::result::Result<(), ToolFailure>> {
        tokio::fs::create_dir_all(dir).await?;
        debug!("Running {} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .envs(envs)
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| ProvisionError::Launch {
                tool: self.binary.display().to_string(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(Ok(()));
        }

        Ok(Err(ToolFailure {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }))
    }

    /// Runs one installation step against the plan.
    async fn run_step(&self, step: &str, plan: &InstallPlan, args: &[&str]) -> Result<()> {
        info!("Cluster '{}': running {step}", plan.cluster.name);
        let path = self.write_plan(plan).await?;
        let plan_arg = path.display().to_string();

        let mut full_args: Vec<&str> = args.iter().copied().collect();
        full_args.extend(["--plan-file", plan_arg.as_str()]);

        self.run(&full_args, &self.cluster_dir(&plan.cluster.name), &BTreeMap::new())
            .await?
            .map_err(|failure| {
                InstallError::step(
                    step,
                    format!("exit code {:?}: {}", failure.code, failure.stderr),
                )
                .into()
            })
    }
}

/// Provisioner that shells out to the external tool.
#[derive(Debug, Clone)]
pub struct ToolProvisioner {
    runner: ToolRunner,
    /// Provider identifier passed to the tool.
    provider: String,
    /// Provider options exported as environment variables.
    options: BTreeMap<String, String>,
}

impl ToolProvisioner {
    /// Creates a provisioner for a provider.
    #[must_use]
    pub fn new(runner: ToolRunner, provider: &str, options: BTreeMap<String, String>) -> Self {
        Self {
            runner,
            provider: provider.to_string(),
            options,
        }
    }

    fn failed(operation: &str, failure: ToolFailure) -> ClusterError {
        ProvisionError::ToolFailed {
            operation: operation.to_string(),
            code: failure.code,
            stderr: failure.stderr,
        }
        .into()
    }
}

#[async_trait]
impl Provisioner for ToolProvisioner {
    async fn provision(&self, plan: &InstallPlan) -> Result<InstallPlan> {
        info!(
            "Provisioning cluster '{}' with provider '{}'",
            plan.cluster.name, self.provider
        );
        let path = self.runner.write_plan(plan).await?;
        let plan_arg = path.display().to_string();

        self.runner
            .run(
                &["provision", &self.provider, "--plan-file", &plan_arg],
                &self.runner.cluster_dir(&plan.cluster.name),
                &self.options,
            )
            .await?
            .map_err(|failure| Self::failed("provision", failure))?;

        ToolRunner::read_plan(&path).await
    }

    async fn destroy(&self, cluster_name: &str) -> Result<()> {
        info!("Destroying cluster '{cluster_name}' with provider '{}'", self.provider);

        self.runner
            .run(
                &["destroy", &self.provider, cluster_name],
                &self.runner.cluster_dir(cluster_name),
                &self.options,
            )
            .await?
            .map_err(|failure| Self::failed("destroy", failure))
    }
}

/// Builds a [`ToolProvisioner`] for the provider named in each record.
#[derive(Debug, Clone)]
pub struct ToolProvisionerFactory {
    runner: ToolRunner,
}

impl ToolProvisionerFactory {
    /// Creates a factory sharing one runner.
    #[must_use]
    pub const fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }
}

impl ProvisionerFactory for ToolProvisionerFactory {
    fn new_provisioner(&self, record: &ClusterRecord) -> Box<dyn Provisioner> {
        Box::new(ToolProvisioner::new(
            self.runner.clone(),
            &record.spec.provisioner.provider,
            record.spec.provisioner.options.clone(),
        ))
    }
}

/// Executor that shells out to the external tool.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    runner: ToolRunner,
}

impl ToolExecutor {
    /// Creates an executor.
    #[must_use]
    pub const fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Executor for ToolExecutor {
    async fn run_preflight_check(&self, plan: &InstallPlan) -> Result<()> {
        self.runner
            .run_step("preflight check", plan, &["install", "validate"])
            .await
    }

    async fn generate_certificates(&self, plan: &InstallPlan, overwrite: bool) -> Result<()> {
        let mut args = vec!["install", "step", "generate-certs"];
        if overwrite {
            args.push("--overwrite");
        }
        self.runner.run_step("certificate generation", plan, &args).await
    }

    async fn generate_kubeconfig(&self, plan: &InstallPlan) -> Result<()> {
        self.runner
            .run_step("kubeconfig generation", plan, &["install", "step", "generate-kubeconfig"])
            .await
    }

    async fn install(&self, plan: &InstallPlan, restart_services: bool) -> Result<()> {
        let mut args = vec!["install", "apply"];
        if restart_services {
            args.push("--restart-services");
        }
        self.runner.run_step("install", plan, &args).await
    }

    async fn run_smoke_test(&self, plan: &InstallPlan) -> Result<()> {
        self.runner.run_step("smoke test", plan, &["test", "smoke"]).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::planner::build_plan;
    use crate::store::ClusterSpec;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("tool.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn test_plan() -> InstallPlan {
        build_plan("alpha", &ClusterSpec::installed("aws", 1, 1, 1, 0), Some("pw")).unwrap()
    }

    #[tokio::test]
    async fn test_provision_reads_back_updated_plan() {
        let temp = TempDir::new().unwrap();
        let script = write_script(
            temp.path(),
            "sed -i \"s/load_balanced_fqdn: ''/load_balanced_fqdn: lb.example.com/\" \"$4\"",
        );
        let provisioner = ToolProvisioner::new(
            ToolRunner::new(script, temp.path().join("work")),
            "aws",
            BTreeMap::new(),
        );

        let updated = provisioner.provision(&test_plan()).await.unwrap();

        assert_eq!(updated.master.load_balanced_fqdn, "lb.example.com");
        assert_eq!(updated.cluster.admin_password, "pw");
        assert!(temp.path().join("work/alpha/plan.yaml").exists());
    }

    #[tokio::test]
    async fn test_provider_options_are_exported() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "echo \"$REGION\" > region.txt");
        let options = BTreeMap::from([(String::from("REGION"), String::from("us-east-2"))]);
        let provisioner =
            ToolProvisioner::new(ToolRunner::new(script, temp.path().join("work")), "aws", options);

        provisioner.destroy("alpha").await.unwrap();

        let written = std::fs::read_to_string(temp.path().join("work/alpha/region.txt")).unwrap();
        assert_eq!(written.trim(), "us-east-2");
    }

    #[tokio::test]
    async fn test_failed_destroy_carries_stderr() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "echo 'no credentials' >&2\nexit 3");
        let provisioner = ToolProvisioner::new(
            ToolRunner::new(script, temp.path().join("work")),
            "aws",
            BTreeMap::new(),
        );

        let err = provisioner.destroy("alpha").await.unwrap_err();
        match err {
            ClusterError::Provision(ProvisionError::ToolFailed { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "no credentials");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let temp = TempDir::new().unwrap();
        let executor = ToolExecutor::new(ToolRunner::new(
            temp.path().join("does-not-exist"),
            temp.path().join("work"),
        ));

        let err = executor.run_preflight_check(&test_plan()).await.unwrap_err();
        assert!(matches!(err, ClusterError::Provision(ProvisionError::Launch { .. })));
    }

    #[tokio::test]
    async fn test_failed_step_is_install_error() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "exit 1");
        let executor = ToolExecutor::new(ToolRunner::new(script, temp.path().join("work")));

        let err = executor.install(&test_plan(), true).await.unwrap_err();
        assert!(matches!(err, ClusterError::Install(InstallError::StepFailed { .. })));
    }
}
