//! Command orchestration for install, update, uninstall and backup
//! maintenance.
//!
//! Each operation takes the loaded [`Config`] plus a [`Services`] bundle of
//! injected capabilities, records every step in the event log, routes status
//! through the notification sink, and returns a serializable [`OpReport`].

pub mod backups;
pub mod install;
pub mod uninstall;
pub mod update;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::backup::{BackupManager, BackupReason, PruneResult, RestoreReport, Snapshot};
use crate::core::config::Config;
use crate::core::errors::{PovError, Result};
use crate::core::prompt::{AutoAccept, Confirm};
use crate::engine::apply::{
    ApplyEngine, ApplyInputs, ApplyOutcome, ApplyReport, Preview, RunMode, preview,
};
use crate::fetch::{BaseFetcher, FetchOutcome, store_base};
use crate::logger::eventlog::{EventLog, EventType, LogEntry, Severity};
use crate::notify::{NotificationEvent, NotificationSink};
use crate::profile::process::{BrowserWait, ProcessProbe, Sleeper, wait_for_browser_exit};
use crate::schedule::Scheduler;

pub use backups::{list_backups, prune_backups, restore_backup};
pub use install::{InstallOptions, install};
pub use uninstall::{UninstallOptions, uninstall};
pub use update::{UpdateOptions, update};

// ---------------------------------------------------------------------------
// Injected capabilities
// ---------------------------------------------------------------------------

/// Side-effect capabilities an operation may use.
pub struct Services<'a> {
    pub confirm: &'a mut dyn Confirm,
    pub probe: &'a dyn ProcessProbe,
    pub sleeper: &'a mut dyn Sleeper,
    pub notifier: &'a mut dyn NotificationSink,
    pub log: &'a mut EventLog,
    /// `None` when no timer backend should be touched.
    pub scheduler: Option<&'a dyn Scheduler>,
}

impl Services<'_> {
    fn record(&mut self, entry: &LogEntry) {
        self.log.record(entry);
    }

    fn notify(&mut self, event: &NotificationEvent) {
        self.notifier.notify(event);
    }

    /// Log and announce a fatal error, handing it back for propagation.
    fn fail(&mut self, err: PovError) -> PovError {
        self.log
            .record(&LogEntry::from_error(EventType::Error, &err));
        self.notifier.notify(&NotificationEvent::Failed {
            code: err.code().to_string(),
            message: err.to_string(),
        });
        err
    }

    fn wait_for_browser(&mut self, config: &Config) -> BrowserWait {
        wait_for_browser_exit(
            self.probe,
            &mut *self.sleeper,
            poll_interval(config),
            true,
            || eprintln!("[POV] browser is running; close it to continue (Ctrl-C to abort)"),
        )
    }
}

fn poll_interval(config: &Config) -> Duration {
    Duration::from_millis(config.engine.browser_poll_interval_ms)
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// A single step in an operation.
#[derive(Debug, Clone, Serialize)]
pub struct OpStep {
    pub description: String,
    pub done: bool,
    pub error: Option<String>,
}

/// Outcome of registering or removing the periodic update timer.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReport {
    pub backend: &'static str,
    pub action: &'static str,
    pub definition: PathBuf,
    pub ok: bool,
    pub error: Option<String>,
}

/// Structured report from any top-level operation.
#[derive(Debug, Clone, Serialize)]
pub struct OpReport {
    pub command: &'static str,
    pub profile_dir: Option<PathBuf>,
    pub fetch: Option<FetchOutcome>,
    pub apply: Option<ApplyReport>,
    pub backup: Option<Snapshot>,
    pub restore: Option<RestoreReport>,
    pub prune: Option<PruneResult>,
    pub schedule: Option<ScheduleReport>,
    /// The user answered "no" to the top-level question.
    pub declined: bool,
    pub steps: Vec<OpStep>,
    pub follow_up: Vec<String>,
}

impl OpReport {
    fn new(command: &'static str) -> Self {
        Self {
            command,
            profile_dir: None,
            fetch: None,
            apply: None,
            backup: None,
            restore: None,
            prune: None,
            schedule: None,
            declined: false,
            steps: Vec::new(),
            follow_up: Vec::new(),
        }
    }

    fn step_ok(&mut self, description: impl Into<String>) {
        self.steps.push(OpStep {
            description: description.into(),
            done: true,
            error: None,
        });
    }

    fn step_fail(&mut self, description: impl Into<String>, error: impl Into<String>) {
        self.steps.push(OpStep {
            description: description.into(),
            done: false,
            error: Some(error.into()),
        });
    }

    fn step_skip(&mut self, description: impl Into<String>) {
        self.steps.push(OpStep {
            description: description.into(),
            done: false,
            error: None,
        });
    }

    /// The main action succeeded but a secondary step (scheduling, pruning,
    /// purging) failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.steps.iter().any(|s| s.error.is_some())
    }
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

fn backup_manager(config: &Config) -> BackupManager {
    BackupManager::new(config.paths.backup_dir.clone(), &config.profile)
}

fn apply_inputs(config: &Config, profile_dir: &Path) -> ApplyInputs {
    ApplyInputs {
        profile_dir: profile_dir.to_path_buf(),
        live_file: config.profile.live_file.clone(),
        base_file: config.paths.base_file.clone(),
        override_file: config.paths.override_file.clone(),
    }
}

/// Fetch the upstream base and store it as the local base copy.
fn sync_base(
    config: &Config,
    svc: &mut Services<'_>,
    fetcher: &mut dyn BaseFetcher,
    report: &mut OpReport,
) -> Result<()> {
    let outcome = fetcher.fetch().map_err(|e| svc.fail(e))?;
    store_base(&config.paths.base_file, &outcome).map_err(|e| svc.fail(e))?;

    svc.record(
        &LogEntry::new(EventType::Fetch, Severity::Info)
            .path(&config.paths.base_file)
            .details(format!(
                "origin={} changed={}",
                outcome.origin, outcome.changed
            )),
    );
    if outcome.changed {
        report.step_ok(format!("Fetched base configuration from {}", outcome.origin));
    } else {
        report.step_ok(format!("Base configuration unchanged at {}", outcome.origin));
    }
    report.fetch = Some(outcome);
    Ok(())
}

fn record_snapshot(svc: &mut Services<'_>, snap: &Snapshot, report: &mut OpReport) {
    let manifest = &snap.manifest;
    svc.record(
        &LogEntry::new(EventType::BackupCreated, Severity::Info)
            .backup_id(&manifest.id)
            .path(&manifest.profile)
            .details(format!(
                "reason={} files={}",
                manifest.reason,
                manifest.file_names().join(",")
            )),
    );
    for file in &snap.skipped {
        svc.record(
            &LogEntry::new(EventType::BackupSkippedFile, Severity::Info)
                .backup_id(&manifest.id)
                .details(format!("{file} not present in profile")),
        );
    }
    report.step_ok(format!(
        "Backed up {} file(s) to {}",
        manifest.files.len(),
        manifest.id
    ));
}

/// Run the apply engine and record everything it found.
fn apply_overlay(
    config: &Config,
    svc: &mut Services<'_>,
    profile_dir: &Path,
    mode: RunMode,
    assume_yes: bool,
    reason: BackupReason,
    report: &mut OpReport,
) -> Result<ApplyOutcome> {
    let inputs = apply_inputs(config, profile_dir);
    let backups = backup_manager(config);

    let mut auto = AutoAccept;
    let confirm: &mut dyn Confirm = if assume_yes {
        &mut auto
    } else {
        &mut *svc.confirm
    };
    let result = ApplyEngine {
        backups: &backups,
        confirm,
        probe: svc.probe,
        sleeper: &mut *svc.sleeper,
        poll_interval: poll_interval(config),
        mode,
    }
    .run(&inputs, reason);
    let applied = result.map_err(|e| svc.fail(e))?;

    record_snapshot(svc, &applied.backup, report);
    record_preview(svc, &applied.preview, report);

    match applied.browser {
        Some(BrowserWait::ProceededWhileRunning) => {
            svc.record(
                &LogEntry::new(EventType::BrowserRunning, Severity::Warning)
                    .details("browser running during unattended apply; changes take effect after restart"),
            );
            svc.notify(&NotificationEvent::BrowserRunning);
        }
        Some(BrowserWait::Exited { polls }) => {
            svc.record(
                &LogEntry::new(EventType::BrowserRunning, Severity::Info)
                    .details(format!("waited {polls} poll(s) for the browser to exit")),
            );
        }
        Some(BrowserWait::NotRunning) | None => {}
    }

    let live = applied.preview.live_path.clone();
    match applied.outcome {
        ApplyOutcome::Applied => {
            svc.record(
                &LogEntry::new(EventType::Applied, Severity::Info)
                    .path(&live)
                    .backup_id(&applied.backup.manifest.id)
                    .details(applied.preview.summary.clone()),
            );
            svc.notify(&NotificationEvent::UpdateApplied {
                summary: applied.preview.summary.clone(),
            });
        }
        ApplyOutcome::UpToDate => {
            svc.record(&LogEntry::new(EventType::UpToDate, Severity::Info).path(&live));
            svc.notify(&NotificationEvent::UpToDate);
        }
        ApplyOutcome::Declined => {
            svc.record(&LogEntry::new(EventType::Declined, Severity::Info).path(&live));
            svc.notify(&NotificationEvent::Declined);
        }
    }
    report.step_ok(capitalize(&applied.status_line()));

    let outcome = applied.outcome;
    report.apply = Some(applied);
    prune_after_snapshot(config, svc, &backups, report);
    Ok(outcome)
}

fn record_preview(svc: &mut Services<'_>, preview: &Preview, report: &mut OpReport) {
    if !preview.conflicts.is_empty() {
        svc.record(
            &LogEntry::new(EventType::Conflicts, Severity::Warning)
                .details(preview.conflicts.keys().join(", ")),
        );
        svc.notify(&NotificationEvent::Conflicts {
            count: preview.conflicts.len(),
        });
        report.follow_up.push(format!(
            "{} override key(s) shadow base preferences: {}",
            preview.conflicts.len(),
            preview.conflicts.keys().join(", ")
        ));
    }
    if preview.joins_lines {
        svc.record(
            &LogEntry::new(EventType::Conflicts, Severity::Warning)
                .details("base lacks a trailing newline; its last line joins the override's first"),
        );
        report
            .follow_up
            .push("Base configuration does not end in a newline; check the merged file.".to_string());
    }

    let mut details = format!("added: {}", preview.summary);
    if let Some(result) = preview.diff.result() {
        let removed = result.removed_keys();
        if !removed.is_empty() {
            let _ = write!(details, "; removed: {}", removed.join(", "));
        }
    }
    svc.record(
        &LogEntry::new(EventType::DiffComputed, Severity::Info)
            .path(&preview.live_path)
            .details(details),
    );
}

fn prune_after_snapshot(
    config: &Config,
    svc: &mut Services<'_>,
    backups: &BackupManager,
    report: &mut OpReport,
) {
    match backups.prune(config.engine.max_backups) {
        Ok(result) => {
            if result.removed > 0 {
                svc.record(
                    &LogEntry::new(EventType::BackupPruned, Severity::Info)
                        .details(result.removed_ids.join(",")),
                );
                report.step_ok(format!("Pruned {} old backup(s)", result.removed));
            }
            report.prune = Some(result);
        }
        Err(e) => {
            svc.record(&LogEntry::from_error(EventType::BackupPruned, &e));
            report.step_fail("Prune old backups", e.to_string());
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Compute what an update would change, without fetching or writing.
pub fn preview_overlay(config: &Config) -> Result<Preview> {
    let profile_dir = crate::profile::require_profile(&config.profile)?;
    preview(&apply_inputs(config, &profile_dir))
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Format an operation report for terminal output.
#[must_use]
pub fn format_op_report(report: &OpReport) -> String {
    let mut out = String::new();

    for step in &report.steps {
        let icon = if step.done {
            "[ OK ]"
        } else if step.error.is_some() {
            "[FAIL]"
        } else {
            "[SKIP]"
        };
        let _ = writeln!(out, "  {icon} {}", step.description);
        if let Some(err) = &step.error {
            let _ = writeln!(out, "         {err}");
        }
    }

    if let Some(restore) = &report.restore {
        let _ = write!(out, "{}", format_restore_report(restore));
    }

    let _ = writeln!(out);
    if report.declined {
        let _ = writeln!(out, "No changes applied.");
    } else if let Some(apply) = &report.apply {
        let _ = writeln!(out, "{}: {}", report.command, apply.status_line());
    } else if report.is_partial() {
        let _ = writeln!(out, "{} finished with errors. See above.", report.command);
    } else {
        let _ = writeln!(out, "{} complete.", report.command);
    }

    for action in &report.follow_up {
        let _ = writeln!(out, "  -> {action}");
    }
    out
}

/// Format a restore report as an itemized list.
#[must_use]
pub fn format_restore_report(report: &RestoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Restored from backup {}:", report.backup_id);
    for file in &report.restored {
        let _ = writeln!(out, "  restored  {file}");
    }
    for file in &report.declined {
        let _ = writeln!(out, "  kept      {file} (not confirmed)");
    }
    for file in &report.missing {
        let _ = writeln!(out, "  missing   {file} (absent from backup)");
    }
    for file in &report.deleted {
        let _ = writeln!(out, "  deleted   {file}");
    }
    out
}

/// Format a preview for `pov diff`.
#[must_use]
pub fn format_preview(preview: &Preview) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Live file: {}", preview.live_path.display());
    if preview.up_to_date {
        let _ = writeln!(out, "Already up to date.");
        return out;
    }
    let _ = writeln!(out, "Changes: {}", preview.summary);
    if let Some(result) = preview.diff.result() {
        for key in result.added_keys() {
            let _ = writeln!(out, "  + {key}");
        }
        for key in result.removed_keys() {
            let _ = writeln!(out, "  - {key}");
        }
    }
    if !preview.conflicts.is_empty() {
        let _ = writeln!(
            out,
            "Overrides shadowing base: {}",
            preview.conflicts.keys().join(", ")
        );
    }
    out
}
