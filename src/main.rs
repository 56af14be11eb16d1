//! clusterctl CLI entrypoint.
//!
//! This is the main entrypoint for the clusterctl command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use cluster_lifecycle::cli::{Cli, Commands, LogFormat, OutputFormatter};
use cluster_lifecycle::config::{
    find_config_file, ConfigParser, ConfigValidator, ControllerConfig, StoreBackend,
};
use cluster_lifecycle::controller::ControllerManager;
use cluster_lifecycle::error::{ClusterError, ConfigError, Result, StoreError};
use cluster_lifecycle::provision::{ToolExecutor, ToolProvisionerFactory, ToolRunner};
use cluster_lifecycle::store::{
    ClusterRecord, ClusterSpec, ClusterStore, DesiredState, LocalClusterStore,
    MemoryClusterStore, ProvisionerSpec, S3ClusterStore,
};

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag. Logs go to stderr so
/// command output on stdout stays machine-readable.
fn init_logging(verbose: bool, format: LogFormat) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, &formatter),
        Commands::Run { poll_interval } => cmd_run(config_path, poll_interval).await,
        Commands::Create {
            name,
            provider,
            etcd,
            master,
            worker,
            ingress,
            options,
        } => {
            let spec = ClusterSpec {
                desired_state: DesiredState::Installed,
                provisioner: ProvisionerSpec {
                    provider,
                    options: options.into_iter().collect(),
                },
                etcd_count: etcd,
                master_count: master,
                worker_count: worker,
                ingress_count: ingress,
            };
            cmd_create(config_path, &name, spec, &formatter).await
        }
        Commands::Update {
            name,
            provider,
            etcd,
            master,
            worker,
            ingress,
            options,
        } => {
            let edit = SpecEdit {
                provider,
                etcd,
                master,
                worker,
                ingress,
                options,
            };
            cmd_update(config_path, &name, edit, &formatter).await
        }
        Commands::Destroy { name, yes } => cmd_destroy(config_path, &name, yes, &formatter).await,
        Commands::Retry { name } => cmd_retry(config_path, &name, &formatter).await,
        Commands::Status { name } => cmd_status(config_path, name.as_deref(), &formatter).await,
    }
}

/// Spec fields changed by `update`.
struct SpecEdit {
    provider: Option<String>,
    etcd: Option<u32>,
    master: Option<u32>,
    worker: Option<u32>,
    ingress: Option<u32>,
    options: Vec<(String, String)>,
}

impl SpecEdit {
    fn apply(self, spec: &mut ClusterSpec) {
        if let Some(provider) = self.provider {
            spec.provisioner.provider = provider;
        }
        if let Some(etcd) = self.etcd {
            spec.etcd_count = etcd;
        }
        if let Some(master) = self.master {
            spec.master_count = master;
        }
        if let Some(worker) = self.worker {
            spec.worker_count = worker;
        }
        if let Some(ingress) = self.ingress {
            spec.ingress_count = ingress;
        }
        spec.provisioner.options.extend(self.options);
    }
}

/// Writes command output to stdout.
fn emit(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", text.trim_end())?;
    Ok(())
}

/// Write a starter configuration.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing clusterctl configuration in: {}", path.display());

    let config_path = path.join("clusterctl.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    // Check if files exist
    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, include_str!("../templates/clusterctl.yaml"))?;
    eprintln!("Created: {}", config_path.display());

    std::fs::write(&env_path, include_str!("../templates/.env.example"))?;
    eprintln!("Created: {}", env_path.display());

    // Keep secrets and local state out of version control
    let ignored = [".env", ".clusters/", ".clusterctl/"];
    let existing = if gitignore_path.exists() {
        std::fs::read_to_string(&gitignore_path)?
    } else {
        String::new()
    };
    let missing: Vec<&str> = ignored
        .into_iter()
        .filter(|entry| !existing.lines().any(|line| line.trim() == *entry))
        .collect();
    if !missing.is_empty() {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&gitignore_path)?;
        if !existing.is_empty() {
            writeln!(file, "\n# clusterctl")?;
        }
        for entry in missing {
            writeln!(file, "{entry}")?;
        }
        eprintln!("Updated: {}", gitignore_path.display());
    }

    eprintln!("\nNext steps:");
    eprintln!("  1. Edit clusterctl.yaml to pick a store backend and tool binary");
    eprintln!("  2. Run 'clusterctl validate' to check your configuration");
    eprintln!("  3. Run 'clusterctl create <name>' to declare a cluster");
    eprintln!("  4. Run 'clusterctl run' to start the controllers");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let result = ConfigValidator::new().validate(&config)?;
    emit(&formatter.format_validation(&result, show_warnings))?;

    eprintln!("\nConfiguration summary:");
    eprintln!("  Store: {}", config.store.backend);
    eprintln!("  Tool: {}", config.tooling.binary.display());
    eprintln!("  Work dir: {}", config.tooling.work_dir.display());
    eprintln!("  Poll interval: {}s", config.controller.poll_interval_secs);

    Ok(())
}

/// Run the controllers until interrupted.
async fn cmd_run(config_path: Option<&PathBuf>, poll_interval: Option<u64>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(secs) = poll_interval {
        config.controller.poll_interval_secs = secs;
    }
    ConfigValidator::new().validate(&config)?;

    let store = open_store(&config).await?;
    let runner = ToolRunner::new(&config.tooling.binary, &config.tooling.work_dir);
    let manager = ControllerManager::new(
        store,
        Arc::new(ToolExecutor::new(runner.clone())),
        Arc::new(ToolProvisionerFactory::new(runner)),
    );

    info!("Press Ctrl-C to stop");
    manager
        .run(config.controller.poll_interval(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await;

    Ok(())
}

/// Declare a new cluster.
async fn cmd_create(
    config_path: Option<&PathBuf>,
    name: &str,
    spec: ClusterSpec,
    formatter: &OutputFormatter,
) -> Result<()> {
    let validation = ConfigValidator::new().validate_cluster(name, &spec)?;
    for warning in &validation.warnings {
        eprintln!("{}", formatter.warning(warning));
    }

    let store = open_record_store(config_path).await?;
    match store.get(name).await {
        Ok(_) => {
            return Err(StoreError::AlreadyExists {
                name: name.to_string(),
            }
            .into());
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    store.put(name, &ClusterRecord::new(name, spec)).await?;
    emit(&formatter.success(&format!("Cluster '{name}' declared")))
}

/// Change an existing cluster's spec.
async fn cmd_update(
    config_path: Option<&PathBuf>,
    name: &str,
    edit: SpecEdit,
    formatter: &OutputFormatter,
) -> Result<()> {
    let store = open_record_store(config_path).await?;
    let mut record = store.get(name).await?;
    let before = record.spec.clone();

    edit.apply(&mut record.spec);
    let validation = ConfigValidator::new().validate_cluster(name, &record.spec)?;
    for warning in &validation.warnings {
        eprintln!("{}", formatter.warning(warning));
    }

    if record.spec == before {
        return emit(&formatter.warning(&format!("Cluster '{name}' unchanged")));
    }
    if record.spec.desired_state == DesiredState::Destroyed {
        eprintln!(
            "{}",
            formatter.warning("The cluster is being destroyed; the change has no effect")
        );
    }

    store.put(name, &record).await?;
    emit(&formatter.success(&format!("Cluster '{name}' updated, it will be planned again")))
}

/// Ask for a cluster to be destroyed.
async fn cmd_destroy(
    config_path: Option<&PathBuf>,
    name: &str,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let store = open_record_store(config_path).await?;
    let mut record = store.get(name).await?;

    if record.spec.desired_state == DesiredState::Destroyed {
        return emit(&formatter.warning(&format!("Cluster '{name}' is already being destroyed")));
    }

    if !auto_approve {
        eprint!("This destroys all infrastructure of '{name}'. Type the cluster name to confirm: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != name {
            eprintln!("Destruction cancelled.");
            return Ok(());
        }
    }

    record.spec.desired_state = DesiredState::Destroyed;
    store.put(name, &record).await?;
    emit(&formatter.success(&format!("Cluster '{name}' marked for destruction")))
}

/// Clear the manual retry flag.
async fn cmd_retry(
    config_path: Option<&PathBuf>,
    name: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let store = open_record_store(config_path).await?;
    let mut record = store.get(name).await?;

    if !record.status.waiting_for_manual_retry {
        return emit(&formatter.warning(&format!("Cluster '{name}' is not waiting for a retry")));
    }

    info!(
        "Clearing retry flag of cluster '{name}' in state '{}'",
        record.status.current_state
    );
    record.status.waiting_for_manual_retry = false;
    store.put(name, &record).await?;
    emit(&formatter.success(&format!("Cluster '{name}' will be retried")))
}

/// Show cluster status.
async fn cmd_status(
    config_path: Option<&PathBuf>,
    name: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let store = open_record_store(config_path).await?;

    if let Some(name) = name {
        let record = store.get(name).await?;
        return emit(&formatter.format_cluster(&record));
    }

    let mut records = Vec::new();
    for name in store.list().await? {
        match store.get(&name).await {
            Ok(record) => records.push(record),
            // Deleted between list and get
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!("Failed to read cluster '{name}': {e}"),
        }
    }
    emit(&formatter.format_clusters(&records))
}

/// Resolves the configuration file path.
///
/// Returns `None` when no path was given and no file is found, in which case
/// the defaults apply.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<Option<PathBuf>> {
    match config_path {
        Some(path) => Ok(Some(path.clone())),
        None => match find_config_file(".") {
            Ok(path) => Ok(Some(path)),
            Err(ClusterError::Config(ConfigError::FileNotFound { .. })) => Ok(None),
            Err(e) => Err(e),
        },
    }
}

/// Loads configuration with `.env` and environment overrides applied.
fn load_config(config_path: Option<&PathBuf>) -> Result<ControllerConfig> {
    let config_file = resolve_config_path(config_path)?;

    let base = config_file
        .as_deref()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;

    match config_file {
        Some(path) => parser.load_with_env(path),
        None => {
            debug!("No configuration file found, using defaults");
            let mut config = ControllerConfig::default();
            ConfigParser::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
            Ok(config)
        }
    }
}

/// Opens the configured store for a command that edits or reads records
/// outside `run`.
async fn open_record_store(config_path: Option<&PathBuf>) -> Result<Arc<dyn ClusterStore>> {
    let config = load_config(config_path)?;
    ConfigValidator::new().require_persistent_store(&config)?;
    open_store(&config).await
}

/// Opens the configured record store.
async fn open_store(config: &ControllerConfig) -> Result<Arc<dyn ClusterStore>> {
    let store: Arc<dyn ClusterStore> = match config.store.backend {
        StoreBackend::Local => {
            Arc::new(LocalClusterStore::with_base_dir(config.store.local_path()))
        }
        StoreBackend::S3 => {
            let bucket = config.store.bucket.as_deref().ok_or_else(|| {
                ConfigError::validation("S3 bucket name is required", "store.bucket")
            })?;
            Arc::new(
                S3ClusterStore::new(
                    bucket,
                    config.store.prefix.as_deref(),
                    config.store.region.as_deref(),
                )
                .await?,
            )
        }
        StoreBackend::Memory => {
            warn!("Using the memory store; records are lost on exit");
            Arc::new(MemoryClusterStore::new())
        }
    };

    debug!("Using {} store", store.backend_type());
    Ok(store)
}
