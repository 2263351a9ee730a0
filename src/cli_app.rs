//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use prefs_overlay::core::config::Config;
use prefs_overlay::core::errors::PovError;
use prefs_overlay::core::prompt::{AutoDecline, Confirm, StdinConfirm};
use prefs_overlay::engine::apply::RunMode;
use prefs_overlay::fetch::fetcher_for;
use prefs_overlay::logger::eventlog::{EventLog, EventLogConfig, EventType, LogEntry};
use prefs_overlay::notify::{NotificationEvent, NotificationManager, NotificationSink};
use prefs_overlay::ops::backups::{format_backup_list, format_prune_result};
use prefs_overlay::ops::{
    InstallOptions, OpReport, Services, UninstallOptions, UpdateOptions, format_op_report,
    format_preview, install, list_backups, preview_overlay, prune_backups, restore_backup,
    uninstall, update,
};
use prefs_overlay::profile::{SystemProbe, ThreadSleeper};
use prefs_overlay::schedule::{ScheduledCommand, Scheduler, scheduler_for};

/// prefs-overlay: keep a browser profile's user.js in sync with a curated base
/// plus your own overrides.
#[derive(Debug, Parser)]
#[command(
    name = "pov",
    author,
    version,
    about = "Browser preference overlay manager",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Fetch the base configuration, apply it, and schedule updates.
    Install(InstallArgs),
    /// Re-fetch the base configuration and re-apply the overlay.
    Update(UpdateArgs),
    /// Restore the pre-install profile state and remove the update timer.
    Uninstall(UninstallArgs),
    /// Preview what an update would change, without writing anything.
    Diff,
    /// List, restore, or prune profile backups.
    Backups(BackupsArgs),
    /// Show configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct InstallArgs {
    /// Apply without asking for confirmation.
    #[arg(long, short = 'y')]
    yes: bool,
    /// Do not register the periodic update timer.
    #[arg(long)]
    no_schedule: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct UpdateArgs {
    /// Unattended mode: never prompt, never wait for the browser.
    #[arg(long)]
    auto: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct UninstallArgs {
    /// Skip the confirmation prompt (the browser state file is kept as-is).
    #[arg(long, short = 'y')]
    yes: bool,
    /// Also delete fetched data and all backups.
    #[arg(long)]
    purge: bool,
}

#[derive(Debug, Clone, Args)]
struct BackupsArgs {
    #[command(subcommand)]
    command: Option<BackupsCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum BackupsCommand {
    /// List backups, newest first.
    List,
    /// Restore a backup into the profile (newest when ID is omitted).
    Restore {
        /// Backup id as shown by `pov backups list`.
        id: Option<String>,
    },
    /// Delete old backups (the pre-install backup is always kept).
    Prune {
        /// Number of newest backups to keep. Defaults to engine.max_backups.
        #[arg(long, value_name = "N")]
        keep: Option<usize>,
    },
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<PovError> for CliError {
    fn from(err: PovError) -> Self {
        match err {
            PovError::InvalidConfig { .. }
            | PovError::MissingConfig { .. }
            | PovError::ConfigParse { .. }
            | PovError::ProfileNotFound { .. }
            | PovError::BackupNotFound { .. } => Self::User(err.to_string()),
            PovError::Serialization { .. } => Self::Internal(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Install(args) => run_install(cli, args),
        Command::Update(args) => run_update(cli, args),
        Command::Uninstall(args) => run_uninstall(cli, args),
        Command::Diff => run_diff(cli),
        Command::Backups(args) => run_backups(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime capabilities
// ---------------------------------------------------------------------------

/// Real implementations of everything an operation may touch.
struct Runtime {
    log: EventLog,
    probe: SystemProbe,
    sleeper: ThreadSleeper,
    confirm: Box<dyn Confirm>,
    notifier: NotificationManager,
    scheduler: Option<Box<dyn Scheduler>>,
}

impl Runtime {
    fn new(cli: &Cli, config: &Config, mode: RunMode) -> Self {
        let (confirm, notifier): (Box<dyn Confirm>, NotificationManager) = match mode {
            RunMode::Interactive => (Box::new(StdinConfirm), NotificationManager::disabled()),
            RunMode::Unattended => (
                Box::new(AutoDecline),
                NotificationManager::from_config(&config.notifications),
            ),
        };
        Self {
            log: EventLog::open(EventLogConfig::at(config.paths.event_log.clone())),
            probe: SystemProbe::new(&config.profile.process_names),
            sleeper: ThreadSleeper,
            confirm,
            notifier,
            scheduler: resolve_scheduler(cli, config),
        }
    }

    fn services(&mut self) -> Services<'_> {
        Services {
            confirm: self.confirm.as_mut(),
            probe: &self.probe,
            sleeper: &mut self.sleeper,
            notifier: &mut self.notifier,
            log: &mut self.log,
            scheduler: self.scheduler.as_deref(),
        }
    }

    fn record_error(&mut self, err: &PovError) {
        self.log
            .record(&LogEntry::from_error(EventType::Error, err));
    }
}

fn resolve_scheduler(cli: &Cli, config: &Config) -> Option<Box<dyn Scheduler>> {
    match ScheduledCommand::from_env(&config.schedule, cli.config.as_deref()) {
        Ok(command) => Some(scheduler_for(command)),
        Err(e) => {
            eprintln!("[POV-SCHEDULE] WARNING: {e}");
            None
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_install(cli: &Cli, args: &InstallArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mut rt = Runtime::new(cli, &config, RunMode::Interactive);
    let mut fetcher = match fetcher_for(&config.source, &config.paths.fetch_state) {
        Ok(f) => f,
        Err(e) => {
            rt.record_error(&e);
            return Err(e.into());
        }
    };
    let opts = InstallOptions {
        assume_yes: args.yes,
        no_schedule: args.no_schedule,
    };
    let report = install(&config, &mut rt.services(), fetcher.as_mut(), opts)?;
    emit_op_report(cli, &report)
}

fn run_update(cli: &Cli, args: &UpdateArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mode = if args.auto {
        RunMode::Unattended
    } else {
        RunMode::Interactive
    };
    let mut rt = Runtime::new(cli, &config, mode);
    let mut fetcher = match fetcher_for(&config.source, &config.paths.fetch_state) {
        Ok(f) => f,
        Err(e) => {
            rt.record_error(&e);
            rt.notifier.notify(&NotificationEvent::Failed {
                code: e.code().to_string(),
                message: e.to_string(),
            });
            return Err(e.into());
        }
    };
    let report = update(&config, &mut rt.services(), fetcher.as_mut(), UpdateOptions { mode })?;
    emit_op_report(cli, &report)
}

fn run_uninstall(cli: &Cli, args: &UninstallArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mut rt = Runtime::new(cli, &config, RunMode::Interactive);
    let opts = UninstallOptions {
        assume_yes: args.yes,
        purge: args.purge,
    };
    let report = uninstall(&config, &mut rt.services(), opts)?;
    emit_op_report(cli, &report)
}

fn run_diff(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let preview = preview_overlay(&config)?;
    match output_mode(cli) {
        OutputMode::Human => print!("{}", format_preview(&preview)),
        OutputMode::Json => {
            let payload = json!({
                "command": "diff",
                "preview": serde_json::to_value(&preview)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_backups(cli: &Cli, args: &BackupsArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    match &args.command {
        None | Some(BackupsCommand::List) => {
            let inventory = list_backups(&config)?;
            match output_mode(cli) {
                OutputMode::Human => print!("{}", format_backup_list(&inventory)),
                OutputMode::Json => {
                    let payload = json!({
                        "command": "backups list",
                        "backups": serde_json::to_value(&inventory)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(BackupsCommand::Restore { id }) => {
            let mut rt = Runtime::new(cli, &config, RunMode::Interactive);
            let report = restore_backup(&config, &mut rt.services(), id.as_deref())?;
            emit_op_report(cli, &report)
        }
        Some(BackupsCommand::Prune { keep }) => {
            let mut rt = Runtime::new(cli, &config, RunMode::Interactive);
            let result = prune_backups(&config, &mut rt.services(), *keep)?;
            match output_mode(cli) {
                OutputMode::Human => print!("{}", format_prune_result(&result)),
                OutputMode::Json => {
                    let payload = json!({
                        "command": "backups prune",
                        "prune": serde_json::to_value(&result)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
    }
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;
            let hash = config.stable_hash()?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("# effective configuration (hash {hash})");
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "hash": hash,
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn emit_op_report(cli: &Cli, report: &OpReport) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => print!("{}", format_op_report(report)),
        OutputMode::Json => {
            let payload = json!({
                "command": report.command,
                "report": serde_json::to_value(report)?,
                "partial": report.is_partial(),
            });
            write_json_line(&payload)?;
        }
    }
    if report.is_partial() {
        return Err(CliError::Partial(format!(
            "{} completed with errors",
            report.command
        )));
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("POV_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
