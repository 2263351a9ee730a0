//! Periodic re-application: register `pov update --auto` with the OS scheduler.
//!
//! systemd user timers on Linux, launchd user agents on macOS. Registration
//! failures are reported by the caller but never undo a configuration write.

pub mod launchd;
pub mod systemd;

use std::env;
use std::path::{Path, PathBuf};

use crate::core::config::ScheduleConfig;
use crate::core::errors::{PovError, Result};

pub use launchd::LaunchdScheduler;
pub use systemd::SystemdTimerScheduler;

/// Registers the updater entry point with an OS timer facility.
pub trait Scheduler {
    /// Short backend name for reports (`systemd`, `launchd`).
    fn name(&self) -> &'static str;
    /// Where the definition lives on disk.
    fn definition_path(&self) -> PathBuf;
    fn register(&self) -> Result<()>;
    /// Removing an absent registration is not an error.
    fn unregister(&self) -> Result<()>;
    fn status(&self) -> Result<String>;
}

/// What the timer runs and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCommand {
    pub binary: PathBuf,
    /// Passed as `--config` when the user chose a non-default config file.
    pub config_path: Option<PathBuf>,
    pub on_calendar: String,
    pub interval_secs: u64,
}

impl ScheduledCommand {
    pub fn from_env(schedule: &ScheduleConfig, config_path: Option<&Path>) -> Result<Self> {
        Ok(Self {
            binary: resolve_pov_binary()?,
            config_path: config_path.map(Path::to_path_buf),
            on_calendar: schedule.on_calendar.clone(),
            interval_secs: schedule.interval_secs,
        })
    }

    /// argv of the scheduled invocation.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.binary.display().to_string()];
        if let Some(cfg) = &self.config_path {
            argv.push("--config".to_string());
            argv.push(cfg.display().to_string());
        }
        argv.push("update".to_string());
        argv.push("--auto".to_string());
        argv
    }
}

/// Scheduler backend for the current platform.
pub fn scheduler_for(command: ScheduledCommand) -> Box<dyn Scheduler> {
    if cfg!(target_os = "macos") {
        Box::new(LaunchdScheduler::user(command))
    } else {
        Box::new(SystemdTimerScheduler::user(command))
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
}

/// The running executable, falling back to common install locations.
fn resolve_pov_binary() -> Result<PathBuf> {
    if let Ok(exe) = env::current_exe()
        && exe.exists()
    {
        return Ok(exe);
    }
    for candidate in ["/usr/local/bin/pov", "/usr/bin/pov"] {
        let p = Path::new(candidate);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }
    Err(PovError::Schedule {
        details: "could not locate the pov binary; install it to a PATH directory first"
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_without_config() {
        let cmd = ScheduledCommand {
            binary: PathBuf::from("/usr/bin/pov"),
            config_path: None,
            on_calendar: "daily".to_string(),
            interval_secs: 86_400,
        };
        assert_eq!(cmd.argv(), ["/usr/bin/pov", "update", "--auto"]);
    }

    #[test]
    fn argv_carries_explicit_config() {
        let cmd = ScheduledCommand {
            binary: PathBuf::from("/usr/bin/pov"),
            config_path: Some(PathBuf::from("/etc/pov.toml")),
            on_calendar: "daily".to_string(),
            interval_secs: 86_400,
        };
        assert_eq!(
            cmd.argv(),
            ["/usr/bin/pov", "--config", "/etc/pov.toml", "update", "--auto"]
        );
    }

    #[test]
    fn current_exe_resolves() {
        assert!(resolve_pov_binary().is_ok());
    }
}
