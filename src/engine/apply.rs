//! The apply state machine.
//!
//! ```text
//! Start → Backed-up → Merged → Diffed ─┬─ identical ─────────────→ Done (up to date)
//!                                      ├─ Confirmed → Written ───→ Done (applied)
//!                                      └─ Declined ──────────────→ Done (no changes)
//! ```
//!
//! Any fatal error leaves the live file exactly as it was.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use super::atomic::atomic_write;
use super::conflicts::ConflictSet;
use super::diff::{DiffOutcome, summarize};
use super::merge::{MergedCandidate, merge};
use crate::backup::{BackupManager, BackupReason, Snapshot};
use crate::core::errors::{PovError, Result};
use crate::core::prompt::Confirm;
use crate::profile::process::{BrowserWait, ProcessProbe, Sleeper, wait_for_browser_exit};

/// Who is driving the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// A user at a terminal: confirm before writing, wait for the browser.
    Interactive,
    /// Scheduled: never prompt, never block.
    Unattended,
}

/// Where the documents live.
#[derive(Debug, Clone)]
pub struct ApplyInputs {
    pub profile_dir: PathBuf,
    pub live_file: String,
    pub base_file: PathBuf,
    /// Absent file means "no override".
    pub override_file: PathBuf,
}

impl ApplyInputs {
    #[must_use]
    pub fn live_path(&self) -> PathBuf {
        self.profile_dir.join(&self.live_file)
    }
}

/// Candidate and diff, computed without writing anything.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub live_path: PathBuf,
    #[serde(skip)]
    pub candidate: MergedCandidate,
    pub conflicts: ConflictSet,
    pub diff: DiffOutcome,
    pub summary: String,
    /// Candidate is byte-identical to the live file.
    pub up_to_date: bool,
    /// Base lacks a trailing newline, so its last line joins the override's first.
    pub joins_lines: bool,
}

/// Terminal state of an apply run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    UpToDate,
    Applied,
    Declined,
}

/// Everything an apply run did and found.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub outcome: ApplyOutcome,
    pub mode: RunMode,
    pub backup: Snapshot,
    #[serde(flatten)]
    pub preview: Preview,
    /// `None` when the run ended before the browser check.
    pub browser: Option<BrowserWait>,
}

impl ApplyReport {
    /// One-line status for users and notifications.
    #[must_use]
    pub fn status_line(&self) -> String {
        match self.outcome {
            ApplyOutcome::UpToDate => "already up to date".to_string(),
            ApplyOutcome::Applied => format!("applied: {}", self.preview.summary),
            ApplyOutcome::Declined => "no changes applied".to_string(),
        }
    }
}

/// Read base + override + live and compute what an apply would do.
pub fn preview(inputs: &ApplyInputs) -> Result<Preview> {
    let base = fs::read_to_string(&inputs.base_file).map_err(|e| PovError::BaseConfig {
        path: inputs.base_file.clone(),
        details: e.to_string(),
    })?;
    let overrides = read_optional_text(&inputs.override_file)?;
    let candidate = merge(&base, overrides.as_deref());

    let live_path = inputs.live_path();
    let live = match fs::read(&live_path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(source) => return Err(PovError::io(&live_path, source)),
    };

    let up_to_date = live
        .as_deref()
        .is_some_and(|bytes| bytes == candidate.text.as_bytes());
    let live_text = live.as_deref().map(String::from_utf8_lossy);
    let diff = summarize(live_text.as_deref(), &candidate.text);

    Ok(Preview {
        live_path,
        conflicts: candidate.conflicts.clone(),
        summary: diff.summary(),
        diff,
        up_to_date,
        joins_lines: candidate.joins_lines,
        candidate,
    })
}

fn read_optional_text(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PovError::io(path, source)),
    }
}

/// Drives one apply run with injected side-effect capabilities.
pub struct ApplyEngine<'a> {
    pub backups: &'a BackupManager,
    pub confirm: &'a mut dyn Confirm,
    pub probe: &'a dyn ProcessProbe,
    pub sleeper: &'a mut dyn Sleeper,
    pub poll_interval: Duration,
    pub mode: RunMode,
}

impl ApplyEngine<'_> {
    /// Backup, merge, diff, confirm, wait for the browser, write.
    pub fn run(&mut self, inputs: &ApplyInputs, reason: BackupReason) -> Result<ApplyReport> {
        let backup = self.backups.snapshot(&inputs.profile_dir, reason)?;
        let preview = preview(inputs)?;

        let mut report = ApplyReport {
            outcome: ApplyOutcome::UpToDate,
            mode: self.mode,
            backup,
            preview,
            browser: None,
        };
        if report.preview.up_to_date {
            return Ok(report);
        }

        if self.mode == RunMode::Interactive {
            let prompt = format!(
                "Changes: {}\nApply to {}?",
                report.preview.summary,
                report.preview.live_path.display()
            );
            if !self.confirm.confirm(&prompt) {
                report.outcome = ApplyOutcome::Declined;
                return Ok(report);
            }
        }

        let block = self.mode == RunMode::Interactive;
        report.browser = Some(wait_for_browser_exit(
            self.probe,
            &mut *self.sleeper,
            self.poll_interval,
            block,
            || eprintln!("[POV] browser is running; close it to continue (Ctrl-C to abort)"),
        ));

        atomic_write(
            &report.preview.live_path,
            report.preview.candidate.text.as_bytes(),
        )?;
        report.outcome = ApplyOutcome::Applied;
        Ok(report)
    }
}
