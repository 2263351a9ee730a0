//! Multi-channel notifications: desktop, file, and console channels.
//!
//! Unattended runs have no terminal, so their outcome is routed through
//! here. Every channel is fire-and-forget: failures are swallowed and never
//! affect the operation that produced the event.

#![allow(missing_docs)]

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};

// ──────────────────── notification level ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ──────────────────── notification events ────────────────────

/// A structured notification event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    UpdateApplied {
        /// Bounded summary of added keys.
        summary: String,
    },
    UpToDate,
    Declined,
    BrowserRunning,
    Conflicts {
        count: usize,
    },
    ScheduleFailed {
        message: String,
    },
    Failed {
        code: String,
        message: String,
    },
}

impl NotificationEvent {
    /// The severity level of this event (for min-level filtering).
    #[must_use]
    pub const fn level(&self) -> NotificationLevel {
        match self {
            Self::UpdateApplied { .. } | Self::UpToDate | Self::Declined => {
                NotificationLevel::Info
            }
            Self::BrowserRunning | Self::Conflicts { .. } | Self::ScheduleFailed { .. } => {
                NotificationLevel::Warning
            }
            Self::Failed { .. } => NotificationLevel::Error,
        }
    }

    /// Short human-readable summary line.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::UpdateApplied { summary } => format!("Preferences updated: {summary}"),
            Self::UpToDate => "Preferences already up to date".to_string(),
            Self::Declined => "No changes applied".to_string(),
            Self::BrowserRunning => {
                "Browser is running; new preferences take effect after restart".to_string()
            }
            Self::Conflicts { count } => {
                format!("{count} override key(s) shadow base preferences")
            }
            Self::ScheduleFailed { message } => {
                format!("Automatic updates could not be scheduled: {message}")
            }
            Self::Failed { code, message } => format!("Update failed [{code}]: {message}"),
        }
    }
}

// ──────────────────── configuration ────────────────────

/// Top-level notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Master switch for all notifications.
    pub enabled: bool,
    /// Which channel names to activate.
    pub channels: Vec<String>,
    pub desktop: DesktopConfig,
    pub file: FileConfig,
    pub console: ConsoleConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: vec!["desktop".to_string(), "console".to_string()],
            desktop: DesktopConfig::default(),
            file: FileConfig::default(),
            console: ConsoleConfig::default(),
        }
    }
}

/// Desktop notification settings (notify-send on Linux, osascript on macOS).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DesktopConfig {
    pub enabled: bool,
    pub min_level: NotificationLevel,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_level: NotificationLevel::Info,
        }
    }
}

/// File notification settings (append-only JSONL).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub path: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        Self {
            path: home
                .join(".local")
                .join("share")
                .join("prefs-overlay")
                .join("notifications.jsonl"),
        }
    }
}

/// Console notification settings (stderr, picked up by the service journal).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub min_level: NotificationLevel,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            min_level: NotificationLevel::Info,
        }
    }
}

// ──────────────────── sink ────────────────────

/// Anything that can display a notification.
pub trait NotificationSink {
    fn notify(&mut self, event: &NotificationEvent);
}

/// Keeps every summary in memory. Useful for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Vec<NotificationEvent>,
}

impl MemorySink {
    #[must_use]
    pub fn events(&self) -> &[NotificationEvent] {
        &self.events
    }

    /// Summaries in delivery order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.events.iter().map(NotificationEvent::summary).collect()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&mut self, event: &NotificationEvent) {
        self.events.push(event.clone());
    }
}

// ──────────────────── JSONL record ────────────────────

#[derive(Debug, Serialize)]
struct NotificationRecord {
    ts: String,
    level: NotificationLevel,
    summary: String,
    #[serde(flatten)]
    event: NotificationEvent,
}

// ──────────────────── notification channels ────────────────────

trait Channel {
    fn name(&self) -> &'static str;
    fn send(&self, event: &NotificationEvent);
}

// ──── Desktop (notify-send / osascript) ────

struct DesktopChannel {
    min_level: NotificationLevel,
}

impl Channel for DesktopChannel {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn send(&self, event: &NotificationEvent) {
        if event.level() < self.min_level {
            return;
        }

        let summary = event.summary();
        let urgency = match event.level() {
            NotificationLevel::Error => "critical",
            NotificationLevel::Warning => "normal",
            NotificationLevel::Info => "low",
        };

        #[cfg(target_os = "linux")]
        {
            let _ = Command::new("notify-send")
                .arg("--urgency")
                .arg(urgency)
                .arg("--app-name=pov")
                .arg("Browser preferences")
                .arg(&summary)
                .spawn();
        }

        #[cfg(target_os = "macos")]
        {
            let script = format!(
                "display notification \"{}\" with title \"pov\" subtitle \"Browser preferences\"",
                summary.replace('\\', "\\\\").replace('"', "\\\"")
            );
            let _ = Command::new("osascript").arg("-e").arg(&script).spawn();
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let _ = (urgency, summary);
        }
    }
}

// ──── File (append-only JSONL) ────

struct FileChannel {
    path: PathBuf,
}

impl Channel for FileChannel {
    fn name(&self) -> &'static str {
        "file"
    }

    fn send(&self, event: &NotificationEvent) {
        let record = NotificationRecord {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            level: event.level(),
            summary: event.summary(),
            event: event.clone(),
        };

        let Ok(json) = serde_json::to_string(&record) else {
            return;
        };

        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        let file = {
            let mut opts = OpenOptions::new();
            opts.create(true).append(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt as _;
                opts.mode(0o600);
            }
            opts.open(&self.path)
        };

        if let Ok(mut f) = file {
            let _ = writeln!(f, "{json}");
        }
    }
}

// ──── Console (stderr) ────

struct ConsoleChannel {
    min_level: NotificationLevel,
}

impl Channel for ConsoleChannel {
    fn name(&self) -> &'static str {
        "console"
    }

    fn send(&self, event: &NotificationEvent) {
        if event.level() < self.min_level {
            return;
        }
        let tag = match event.level() {
            NotificationLevel::Error => "ERROR",
            NotificationLevel::Warning => "WARNING",
            NotificationLevel::Info => "INFO",
        };
        eprintln!("[POV-NOTIFY] [{tag}] {}", event.summary());
    }
}

// ──────────────────── notification manager ────────────────────

/// Dispatches events to every enabled channel.
pub struct NotificationManager {
    channels: Vec<Box<dyn Channel>>,
    enabled: bool,
}

impl NotificationManager {
    /// Build a manager from configuration. Unknown channel names are skipped.
    #[must_use]
    pub fn from_config(config: &NotificationConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        let mut channels: Vec<Box<dyn Channel>> = Vec::new();
        for channel_name in &config.channels {
            match channel_name.as_str() {
                "desktop" if config.desktop.enabled => {
                    channels.push(Box::new(DesktopChannel {
                        min_level: config.desktop.min_level,
                    }));
                }
                "file" => {
                    channels.push(Box::new(FileChannel {
                        path: config.file.path.clone(),
                    }));
                }
                "console" => {
                    channels.push(Box::new(ConsoleChannel {
                        min_level: config.console.min_level,
                    }));
                }
                _ => {}
            }
        }

        Self {
            channels,
            enabled: true,
        }
    }

    /// A no-op manager.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            channels: Vec::new(),
            enabled: false,
        }
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }
}

impl NotificationSink for NotificationManager {
    fn notify(&mut self, event: &NotificationEvent) {
        if !self.enabled {
            return;
        }
        for channel in &self.channels {
            channel.send(event);
        }
    }
}

// ──────────────────── tests ────────────────────
