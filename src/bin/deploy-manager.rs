//! deploy-manager CLI
//!
//! Publish projects from git and control them through pm2

use anyhow::Result;
use clap::{Parser, Subcommand};
use deploy_manager::core::config_loader::CONFIG_FILENAME;
use deploy_manager::publishing::progress::ObserverError;
use deploy_manager::{
    format_history, ConfigLoadOptions, ConfigLoader, GitCli, LoggingObserver, ManagerConfig,
    Pm2ProcessManager, ProcessInfo, ProcessManagerError, ProcessRef, ProcessSupervisor,
    ProgressEvent, ProgressKind, ProgressObserver, ProjectPublisher, PublishRequest,
    SafeCommandExecutor, StartOptions, TokioFileSystem,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::prelude::*;

/// Publish projects from git and control them through pm2
#[derive(Parser)]
#[command(name = "deploy-manager")]
#[command(version)]
#[command(about = "Publish projects from git and control them through pm2", long_about = None)]
struct Cli {
    /// Explicit config file (overrides project and global config)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone a repository into a directory and install its dependencies
    Publish {
        /// Repository URL or path
        repository: String,

        /// Destination directory (relative paths use publish.publishRoot)
        publish_path: PathBuf,

        /// Start the published project under pm2 afterwards
        #[arg(long)]
        start: bool,

        /// Process name when starting (defaults to the directory name)
        #[arg(long, requires = "start")]
        name: Option<String>,

        /// Restart the process on file changes
        #[arg(long, requires = "start")]
        watch: bool,

        /// Send progress to the log instead of printing it
        #[arg(long)]
        quiet: bool,
    },

    /// Start a script under pm2
    Start {
        /// Script path (relative paths use processManager.scriptRoot)
        script: PathBuf,

        /// Process name
        #[arg(long)]
        name: String,

        /// Restart the process on file changes
        #[arg(long)]
        watch: bool,
    },

    /// Stop a process but keep it registered
    Stop {
        /// pm2 id or process name
        id: ProcessRef,
    },

    /// Restart a process
    Restart {
        /// pm2 id or process name
        id: ProcessRef,
    },

    /// Stop a process and remove it from pm2
    Kill {
        /// pm2 id or process name
        id: ProcessRef,
    },

    /// Show details of a process
    Describe {
        /// pm2 id or process name
        id: ProcessRef,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List managed processes
    List {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Validate instead of printing
        #[arg(long)]
        validate: bool,
    },
}

/// Prints pipeline progress for the user
struct ConsoleObserver;

impl ProgressObserver for ConsoleObserver {
    fn emit(&self, event: &ProgressEvent) -> Result<(), ObserverError> {
        let icon = match event.kind {
            ProgressKind::Progress => "⏳",
            ProgressKind::Error => "❌",
        };
        for line in event.message.lines() {
            println!("{} {}", icon, line);
        }
        Ok(())
    }
}

/// Collaborators wired from the loaded configuration
struct App {
    config: ManagerConfig,
    publisher: ProjectPublisher,
    supervisor: ProcessSupervisor,
}

impl App {
    fn new(config: ManagerConfig) -> Result<Self> {
        let mut executor = SafeCommandExecutor::with_allowed(config.commands.allowed.clone());
        if let Some(secs) = config.commands.timeout_secs {
            executor.set_timeout(Duration::from_secs(secs));
        }
        let executor = Arc::new(executor);
        let fs = Arc::new(TokioFileSystem);

        let git = Arc::new(GitCli::new(executor.clone(), config.git.binary.clone()));
        let publisher = ProjectPublisher::new(fs, git, executor.clone(), config.publish.clone());

        let working_dir = match &config.process_manager.script_root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        let pm2 = Arc::new(Pm2ProcessManager::new(
            executor,
            config.process_manager.binary.clone(),
            working_dir,
        ));
        let mut supervisor = ProcessSupervisor::new(pm2);
        if let Some(root) = &config.process_manager.script_root {
            supervisor = supervisor.with_script_root(root.clone());
        }

        Ok(Self {
            config,
            publisher,
            supervisor,
        })
    }
}

#[tokio::main]
async fn main() {
    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "deploy_manager=debug,info"
    } else {
        "deploy_manager=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ConfigLoader::load(ConfigLoadOptions {
        project_path: std::env::current_dir()?,
        config_file: cli.config,
        env: std::env::vars().collect(),
    })
    .await?;

    if let Commands::Config { validate } = cli.command {
        return config_command(&config, validate);
    }

    let app = App::new(config)?;

    match cli.command {
        Commands::Publish {
            repository,
            publish_path,
            start,
            name,
            watch,
            quiet,
        } => {
            let observer: Arc<dyn ProgressObserver> = if quiet {
                Arc::new(LoggingObserver)
            } else {
                Arc::new(ConsoleObserver)
            };
            let request = PublishRequest::new(repository, publish_path).with_observer(observer);
            let start = start.then_some((name, watch));
            publish_command(&app, request, start, cli.verbose).await
        }
        Commands::Start {
            script,
            name,
            watch,
        } => {
            let options = StartOptions {
                script,
                name,
                watch,
            };
            report_processes("▶️  Started", app.supervisor.start(options).await)
        }
        Commands::Stop { id } => report_done("⏸️  Stopped", &id, app.supervisor.stop(&id).await),
        Commands::Restart { id } => {
            report_done("🔄 Restarted", &id, app.supervisor.restart(&id).await)
        }
        Commands::Kill { id } => report_done("🗑️  Killed", &id, app.supervisor.kill(&id).await),
        Commands::Describe { id, json } => {
            print_processes(app.supervisor.describe(&id).await, json)
        }
        Commands::List { json } => print_processes(app.supervisor.list().await, json),
        Commands::Config { .. } => Ok(0),
    }
}

async fn publish_command(
    app: &App,
    request: PublishRequest,
    start: Option<(Option<String>, bool)>,
    verbose: bool,
) -> Result<i32> {
    println!("\n📦 deploy-manager publish\n");

    let report = match app.publisher.publish(request).await {
        Ok(report) => report,
        Err(failure) => {
            eprintln!("\n❌ Publishing failed while {}", failure.stage);
            eprintln!("   [{}] {}", failure.error.code(), failure.error);
            for action in failure.error.suggested_actions() {
                eprintln!("   💡 {}", action);
            }
            return Ok(1);
        }
    };

    println!(
        "\n✅ Published {} to {} in {}ms",
        report.repository,
        report.publish_path.display(),
        report.duration_ms
    );
    if verbose {
        println!("\n🕒 State history (run {})", report.run_id);
        for line in format_history(&report.history).lines() {
            println!("   {}", line);
        }
    }
    if !report.project.is_manageable() {
        println!(
            "ℹ️  No {} found, dependencies were not installed",
            app.config.publish.manifest_file
        );
    }

    let Some((name, watch)) = start else {
        return Ok(0);
    };

    let Some(script) = app
        .publisher
        .installer()
        .resolve_entry_point(&report.publish_path)
        .await
    else {
        eprintln!("\n⚠️  Cannot start: no entry point found in the published project");
        return Ok(1);
    };

    let name = name.unwrap_or_else(|| default_process_name(&report.publish_path));
    let options = StartOptions {
        script,
        name,
        watch,
    };
    report_processes("▶️  Started", app.supervisor.start(options).await)
}

fn default_process_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string())
}

fn config_command(config: &ManagerConfig, validate: bool) -> Result<i32> {
    if validate {
        let result = ConfigLoader::validate(config);
        println!("{}", ConfigLoader::format_validation_result(&result));
        return Ok(if result.valid { 0 } else { 1 });
    }

    println!(
        "# defaults < ~/{0} < ./{0} < --config < DEPLOY_* variables\n",
        CONFIG_FILENAME
    );
    print!("{}", serde_yaml::to_string(config)?);
    Ok(0)
}

fn report_pm_error(error: &ProcessManagerError) -> i32 {
    eprintln!("\n❌ [{}] {}", error.code(), error);
    for action in error.suggested_actions() {
        eprintln!("   💡 {}", action);
    }
    1
}

fn report_done(
    verb: &str,
    id: &ProcessRef,
    result: Result<(), ProcessManagerError>,
) -> Result<i32> {
    match result {
        Ok(()) => {
            println!("{} {}", verb, id);
            Ok(0)
        }
        Err(e) => Ok(report_pm_error(&e)),
    }
}

fn report_processes(
    verb: &str,
    result: Result<Vec<ProcessInfo>, ProcessManagerError>,
) -> Result<i32> {
    match result {
        Ok(processes) => {
            for process in &processes {
                println!(
                    "{} {} (id {})",
                    verb,
                    process.name.as_deref().unwrap_or("-"),
                    process
                        .pm_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            Ok(0)
        }
        Err(e) => Ok(report_pm_error(&e)),
    }
}

fn print_processes(
    result: Result<Vec<ProcessInfo>, ProcessManagerError>,
    json: bool,
) -> Result<i32> {
    let processes = match result {
        Ok(processes) => processes,
        Err(e) => return Ok(report_pm_error(&e)),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&processes)?);
        return Ok(0);
    }

    if processes.is_empty() {
        println!("No processes");
        return Ok(0);
    }

    println!(
        "{:<5} {:<24} {:<10} {:<8} {:>6} {:>10} {:>10}",
        "id", "name", "status", "pid", "cpu", "memory", "uptime"
    );
    for p in &processes {
        println!(
            "{:<5} {:<24} {:<10} {:<8} {:>5.1}% {:>8.1}MB {:>10}",
            p.pm_id.map(|id| id.to_string()).unwrap_or_default(),
            p.name.as_deref().unwrap_or("-"),
            p.status.as_deref().unwrap_or("-"),
            p.pid.map(|pid| pid.to_string()).unwrap_or_default(),
            p.cpu,
            p.memory_mb,
            format_uptime(p.uptime_ms),
        );
    }
    Ok(0)
}

fn format_uptime(ms: i64) -> String {
    let secs = ms / 1000;
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}
