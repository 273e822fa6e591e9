//! CLI command definitions and dispatch.

pub mod lifecycle;
pub mod logs;
pub mod plan;
pub mod ps;
pub mod up;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use convoy_common::config::ConvoyConfig;
use convoy_common::constants::{DEFAULT_COMPOSE_FILE, EVENT_CHANNEL_CAPACITY};
use convoy_compose::environment::MapEnvironmentLookup;
use convoy_project::Project;
use convoy_runtime::ContainerServiceFactory;
use convoy_runtime::backend::{self, BackendKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{output, reload};

/// Convoy — dependency-ordered service orchestration.
#[derive(Parser, Debug)]
#[command(name = "convoy", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Compose file describing the services.
    #[arg(short, long, global = true, default_value = DEFAULT_COMPOSE_FILE)]
    pub file: PathBuf,

    /// Project name; overrides the configuration file.
    #[arg(short, long, global = true)]
    pub project_name: Option<String>,

    /// Convoy configuration file.
    #[arg(long, global = true, env = "CONVOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Container backend.
    #[arg(long, global = true, value_enum, default_value_t = BackendArg::Process)]
    pub backend: BackendArg,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Backend choices on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    /// Run each service's command as a host process.
    Process,
    /// Track containers in memory only (dry run).
    Memory,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Process => Self::Process,
            BackendArg::Memory => Self::Memory,
        }
    }
}

/// Services a command applies to.
#[derive(Args, Debug, Clone, Default)]
pub struct ServiceArgs {
    /// Service names. If empty, every service.
    pub services: Vec<String>,
}

impl ServiceArgs {
    /// Borrowed view of the selection.
    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(String::as_str).collect()
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start services.
    Up(up::UpArgs),
    /// Stop services.
    Down(ServiceArgs),
    /// Create services without starting them.
    Create(ServiceArgs),
    /// Remove services' containers.
    Delete(ServiceArgs),
    /// Restart services.
    Restart(ServiceArgs),
    /// Kill services.
    Kill(ServiceArgs),
    /// Print services' logs.
    Logs(ServiceArgs),
    /// Pull services' images.
    Pull(ServiceArgs),
    /// Show the start order without running anything.
    Plan(plan::PlanArgs),
    /// List services' containers.
    Ps(ps::PsArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let global = cli.global;
    match cli.command {
        Command::Up(args) => up::execute(&global, args).await,
        Command::Down(args) => lifecycle::execute(&global, lifecycle::Verb::Down, &args).await,
        Command::Create(args) => lifecycle::execute(&global, lifecycle::Verb::Create, &args).await,
        Command::Delete(args) => lifecycle::execute(&global, lifecycle::Verb::Delete, &args).await,
        Command::Restart(args) => lifecycle::execute(&global, lifecycle::Verb::Restart, &args).await,
        Command::Kill(args) => lifecycle::execute(&global, lifecycle::Verb::Kill, &args).await,
        Command::Pull(args) => lifecycle::execute(&global, lifecycle::Verb::Pull, &args).await,
        Command::Logs(args) => logs::execute(&global, &args).await,
        Command::Plan(args) => plan::execute(&global, &args),
        Command::Ps(args) => ps::execute(&global, &args).await,
    }
}

/// A loaded project with its progress printer attached.
pub struct Session {
    /// The project built from the compose file.
    pub project: Project,
    printer: JoinHandle<()>,
}

impl Session {
    /// Loads configuration and the compose file and builds the project.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or compose file cannot be loaded.
    pub fn open(global: &GlobalArgs) -> anyhow::Result<Self> {
        let config = load_config(global)?;
        let backend = backend::open_backend(global.backend.into(), &config);
        let factory = ContainerServiceFactory::new(backend, config.clone())
            .with_log_sink(output::stdout_log_sink());

        let project = Project::new(config.project_name.clone(), factory)
            .with_environment_lookup(MapEnvironmentLookup::from_process_env())
            .with_reload_callback(reload::file_reloader(global.file.clone()));

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        project.add_listener(tx);
        let printer = tokio::spawn(output::print_events(rx));

        let content = read_compose(&global.file)?;
        project
            .load(&content)
            .with_context(|| format!("invalid compose file {}", global.file.display()))?;
        tracing::debug!(project = %project.name(), services = ?project.service_names(), "project loaded");

        Ok(Self { project, printer })
    }

    /// Drops the project and waits for pending progress lines to print.
    pub async fn close(self) {
        drop(self.project);
        let _ = self.printer.await;
    }
}

/// Loads the Convoy configuration, applying command line overrides.
///
/// # Errors
///
/// Returns an error if an explicitly given configuration file is unreadable.
pub fn load_config(global: &GlobalArgs) -> anyhow::Result<ConvoyConfig> {
    let mut config = match &global.config {
        Some(path) => ConvoyConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => ConvoyConfig::default(),
    };
    if let Some(name) = &global.project_name {
        config.project_name.clone_from(name);
    }
    Ok(config)
}

/// Reads the compose file.
///
/// # Errors
///
/// Returns an error if the file does not exist or cannot be read.
pub fn read_compose(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        anyhow::bail!(
            "compose file not found: {}\n\
             Create a {DEFAULT_COMPOSE_FILE} or specify a path: convoy -f <file> <command>",
            path.display()
        );
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
