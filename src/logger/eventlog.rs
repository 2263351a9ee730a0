//! Append-only text event log.
//!
//! One line per event: `<RFC3339 UTC millis> [<severity>] <event> <fields...>`.
//! Each line is assembled in memory and handed to a single `write_all`.
//!
//! Degradation chain:
//! 1. Primary file path
//! 2. Fallback path (defaults to the system temp directory)
//! 3. stderr with `[POV-LOG]` prefix
//! 4. Silent discard (logging must never fail an operation)

#![allow(missing_docs)]

use std::fmt::{self, Write as _};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{PovError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Event identifiers written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    InstallStart,
    UpdateStart,
    UninstallStart,
    Fetch,
    BackupCreated,
    BackupSkippedFile,
    BackupRestored,
    BackupPruned,
    Conflicts,
    DiffComputed,
    BrowserRunning,
    Applied,
    UpToDate,
    Declined,
    Scheduled,
    ScheduleFailed,
    Unscheduled,
    Error,
}

impl EventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InstallStart => "install_start",
            Self::UpdateStart => "update_start",
            Self::UninstallStart => "uninstall_start",
            Self::Fetch => "fetch",
            Self::BackupCreated => "backup_created",
            Self::BackupSkippedFile => "backup_skipped_file",
            Self::BackupRestored => "backup_restored",
            Self::BackupPruned => "backup_pruned",
            Self::Conflicts => "conflicts",
            Self::DiffComputed => "diff_computed",
            Self::BrowserRunning => "browser_running",
            Self::Applied => "applied",
            Self::UpToDate => "up_to_date",
            Self::Declined => "declined",
            Self::Scheduled => "scheduled",
            Self::ScheduleFailed => "schedule_failed",
            Self::Unscheduled => "unscheduled",
            Self::Error => "error",
        }
    }
}

/// A single log line before formatting.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with milliseconds.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Affected path, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Backup id involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    /// POV error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Freeform details; always last on the line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            path: None,
            backup_id: None,
            error_code: None,
            details: None,
        }
    }

    /// Entry for a failed operation, carrying the error's code and message.
    pub fn from_error(event: EventType, err: &PovError) -> Self {
        let mut entry = Self::new(event, Severity::Error);
        entry.error_code = Some(err.code().to_string());
        entry.details = Some(err.to_string());
        entry
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn path(mut self, path: &Path) -> Self {
        self.path = Some(path.display().to_string());
        self
    }

    #[must_use]
    pub fn backup_id(mut self, id: impl Into<String>) -> Self {
        self.backup_id = Some(id.into());
        self
    }

    /// Render as one log line, newline included.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = format!("{} [{}] {}", self.ts, self.severity, self.event.as_str());
        if let Some(code) = &self.error_code {
            let _ = write!(line, " code={code}");
        }
        if let Some(id) = &self.backup_id {
            let _ = write!(line, " backup={id}");
        }
        if let Some(path) = &self.path {
            let _ = write!(line, " path={path}");
        }
        if let Some(details) = &self.details {
            // Keep one event per line.
            let flat = details.replace(['\n', '\r'], " ");
            let _ = write!(line, " {flat}");
        }
        line.push('\n');
        line
    }
}

/// Degradation state of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Fallback,
    Stderr,
    Discard,
}

/// Configuration for the event log writer.
#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// Primary log file path.
    pub path: PathBuf,
    /// Optional fallback path (e.g. on a different filesystem).
    pub fallback_path: Option<PathBuf>,
}

impl EventLogConfig {
    /// Primary `path` with the default temp-directory fallback.
    #[must_use]
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            fallback_path: Some(std::env::temp_dir().join("prefs-overlay-events.log")),
        }
    }
}

/// Append-only event log with multi-level fallback.
pub struct EventLog {
    config: EventLogConfig,
    file: Option<File>,
    state: WriterState,
}

impl EventLog {
    /// Open the log. Falls through the degradation chain on failure.
    pub fn open(config: EventLogConfig) -> Self {
        let mut log = Self {
            config,
            file: None,
            state: WriterState::Discard,
        };
        log.try_open_primary();
        log
    }

    /// A log that drops everything. For callers that must not touch disk.
    pub fn discard() -> Self {
        Self {
            config: EventLogConfig {
                path: PathBuf::new(),
                fallback_path: None,
            },
            file: None,
            state: WriterState::Discard,
        }
    }

    /// Append one entry.
    pub fn record(&mut self, entry: &LogEntry) {
        self.write_line(&entry.to_line());
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal | WriterState::Fallback => {
                if let Some(f) = self.file.as_mut() {
                    if f.write_all(line.as_bytes()).is_err() {
                        self.degrade();
                        self.write_line(line);
                    }
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[POV-LOG] {line}").is_err() {
                    self.state = WriterState::Discard;
                }
            }
            WriterState::Discard => {}
        }
    }

    fn try_open_primary(&mut self) {
        match open_append(&self.config.path) {
            Ok(file) => {
                self.file = Some(file);
                self.state = WriterState::Normal;
            }
            Err(_) => self.try_open_fallback(),
        }
    }

    fn try_open_fallback(&mut self) {
        if let Some(fb) = &self.config.fallback_path {
            match open_append(fb) {
                Ok(file) => {
                    let _ = writeln!(
                        io::stderr(),
                        "[POV-LOG] primary path failed, using fallback: {}",
                        fb.display()
                    );
                    self.file = Some(file);
                    self.state = WriterState::Fallback;
                }
                Err(_) => {
                    self.state = WriterState::Stderr;
                    let _ = writeln!(
                        io::stderr(),
                        "[POV-LOG] both primary and fallback paths failed, using stderr"
                    );
                }
            }
        } else {
            self.state = WriterState::Stderr;
            let _ = writeln!(
                io::stderr(),
                "[POV-LOG] primary path failed and no fallback configured, using stderr"
            );
        }
    }

    fn degrade(&mut self) {
        self.file = None;
        match self.state {
            WriterState::Normal => self.try_open_fallback(),
            WriterState::Fallback => {
                self.state = WriterState::Stderr;
                let _ = writeln!(io::stderr(), "[POV-LOG] fallback write failed, using stderr");
            }
            WriterState::Stderr => self.state = WriterState::Discard,
            WriterState::Discard => {}
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| PovError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| PovError::io(path, source))
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
