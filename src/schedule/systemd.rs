//! systemd user timer: a oneshot `.service` plus a `.timer` that triggers it.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use super::{ScheduledCommand, Scheduler, home_dir};
use crate::core::errors::{PovError, Result};
use crate::engine::atomic::atomic_write;

const SERVICE_UNIT: &str = "prefs-overlay-update.service";
const TIMER_UNIT: &str = "prefs-overlay-update.timer";

#[derive(Debug, Clone)]
pub struct SystemdTimerScheduler {
    command: ScheduledCommand,
    unit_dir: PathBuf,
    systemctl: PathBuf,
}

impl SystemdTimerScheduler {
    /// Units in `$XDG_CONFIG_HOME/systemd/user` (or `~/.config/systemd/user`).
    #[must_use]
    pub fn user(command: ScheduledCommand) -> Self {
        let config_home = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map_or_else(|| home_dir().join(".config"), PathBuf::from);
        Self::new(command, config_home.join("systemd").join("user"), PathBuf::from("systemctl"))
    }

    #[must_use]
    pub fn new(command: ScheduledCommand, unit_dir: PathBuf, systemctl: PathBuf) -> Self {
        Self {
            command,
            unit_dir,
            systemctl,
        }
    }

    #[must_use]
    pub fn service_path(&self) -> PathBuf {
        self.unit_dir.join(SERVICE_UNIT)
    }

    #[must_use]
    pub fn timer_path(&self) -> PathBuf {
        self.unit_dir.join(TIMER_UNIT)
    }

    #[must_use]
    pub fn generate_service_unit(&self) -> String {
        let exec = self
            .command
            .argv()
            .iter()
            .map(|arg| quote_arg(arg))
            .collect::<Vec<_>>()
            .join(" ");

        let mut unit = String::with_capacity(512);
        writeln!(unit, "[Unit]").ok();
        writeln!(unit, "Description=Apply browser preference overlay updates").ok();
        writeln!(unit, "After=network-online.target").ok();
        writeln!(unit, "Wants=network-online.target").ok();
        writeln!(unit).ok();
        writeln!(unit, "[Service]").ok();
        writeln!(unit, "Type=oneshot").ok();
        writeln!(unit, "ExecStart={exec}").ok();
        writeln!(unit, "Nice=10").ok();
        writeln!(unit, "IOSchedulingClass=idle").ok();
        unit
    }

    #[must_use]
    pub fn generate_timer_unit(&self) -> String {
        let mut unit = String::with_capacity(256);
        writeln!(unit, "[Unit]").ok();
        writeln!(unit, "Description=Periodic browser preference overlay update").ok();
        writeln!(unit).ok();
        writeln!(unit, "[Timer]").ok();
        writeln!(unit, "OnCalendar={}", self.command.on_calendar).ok();
        writeln!(unit, "Persistent=true").ok();
        writeln!(unit, "RandomizedDelaySec=15m").ok();
        writeln!(unit, "Unit={SERVICE_UNIT}").ok();
        writeln!(unit).ok();
        writeln!(unit, "[Install]").ok();
        writeln!(unit, "WantedBy=timers.target").ok();
        unit
    }

    fn run_systemctl(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.systemctl)
            .arg("--user")
            .args(args)
            .output()
            .map_err(|e| PovError::Schedule {
                details: format!("failed to execute systemctl: {e}"),
            })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(PovError::Schedule {
                details: format!(
                    "systemctl --user {} failed (exit {}): {}",
                    args.join(" "),
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }

    /// Like `run_systemctl`, but a non-zero exit is not an error.
    fn run_systemctl_lenient(&self, args: &[&str]) -> String {
        Command::new(&self.systemctl)
            .arg("--user")
            .args(args)
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .unwrap_or_default()
    }
}

impl Scheduler for SystemdTimerScheduler {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn definition_path(&self) -> PathBuf {
        self.timer_path()
    }

    fn register(&self) -> Result<()> {
        let write = |path: PathBuf, content: String| {
            atomic_write(&path, content.as_bytes()).map_err(|e| PovError::Schedule {
                details: e.to_string(),
            })
        };
        write(self.service_path(), self.generate_service_unit())?;
        write(self.timer_path(), self.generate_timer_unit())?;

        self.run_systemctl(&["daemon-reload"])?;
        self.run_systemctl(&["enable", "--now", TIMER_UNIT])?;
        Ok(())
    }

    fn unregister(&self) -> Result<()> {
        if !self.timer_path().exists() && !self.service_path().exists() {
            return Ok(());
        }
        self.run_systemctl_lenient(&["disable", "--now", TIMER_UNIT]);

        let mut removed = false;
        for path in [self.timer_path(), self.service_path()] {
            match fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(PovError::io(&path, source)),
            }
        }
        if removed {
            self.run_systemctl(&["daemon-reload"])?;
        }
        Ok(())
    }

    fn status(&self) -> Result<String> {
        if !self.timer_path().exists() {
            return Ok("not installed".to_string());
        }
        let state = self.run_systemctl_lenient(&["is-active", TIMER_UNIT]);
        if state.is_empty() {
            return Ok("unknown".to_string());
        }
        Ok(state)
    }
}

/// systemd command-line quoting for arguments with spaces or quotes.
fn quote_arg(arg: &str) -> String {
    if arg.contains([' ', '"', '\\']) {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn command() -> ScheduledCommand {
        ScheduledCommand {
            binary: PathBuf::from("/home/u/.local/bin/pov"),
            config_path: None,
            on_calendar: "*-*-* 04:00:00".to_string(),
            interval_secs: 86_400,
        }
    }

    #[test]
    fn service_runs_unattended_update() {
        let s = SystemdTimerScheduler::new(command(), PathBuf::from("/x"), PathBuf::from("systemctl"));
        let unit = s.generate_service_unit();
        assert!(unit.contains("Type=oneshot\n"));
        assert!(unit.contains("ExecStart=/home/u/.local/bin/pov update --auto\n"));
    }

    #[test]
    fn timer_uses_configured_calendar() {
        let s = SystemdTimerScheduler::new(command(), PathBuf::from("/x"), PathBuf::from("systemctl"));
        let unit = s.generate_timer_unit();
        assert!(unit.contains("OnCalendar=*-*-* 04:00:00\n"));
        assert!(unit.contains("Persistent=true\n"));
        assert!(unit.contains("WantedBy=timers.target\n"));
    }

    #[test]
    fn exec_start_quotes_spaced_paths() {
        let mut cmd = command();
        cmd.config_path = Some(PathBuf::from("/home/u/My Config/pov.toml"));
        let s = SystemdTimerScheduler::new(cmd, PathBuf::from("/x"), PathBuf::from("systemctl"));
        assert!(
            s.generate_service_unit()
                .contains("--config \"/home/u/My Config/pov.toml\" update --auto")
        );
    }

    /// Stand-in systemctl that appends its argv to `calls.log` next to itself.
    #[cfg(unix)]
    fn fake_systemctl(dir: &Path, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-systemctl");
        fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" >> \"{}\"\nexit {exit_code}\n", dir.join("calls.log").display()),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn register_writes_units_and_enables_timer() {
        let dir = tempfile::tempdir().unwrap();
        let units = dir.path().join("units");
        let s = SystemdTimerScheduler::new(command(), units.clone(), fake_systemctl(dir.path(), 0));

        s.register().unwrap();
        assert!(units.join(SERVICE_UNIT).exists());
        assert!(units.join(TIMER_UNIT).exists());
        let calls = fs::read_to_string(dir.path().join("calls.log")).unwrap();
        assert_eq!(
            calls,
            "--user daemon-reload\n--user enable --now prefs-overlay-update.timer\n"
        );
        assert_eq!(s.status().unwrap(), "unknown");

        s.unregister().unwrap();
        assert!(!units.join(TIMER_UNIT).exists());
        assert!(!units.join(SERVICE_UNIT).exists());
        assert_eq!(s.status().unwrap(), "not installed");
    }

    #[cfg(unix)]
    #[test]
    fn failing_systemctl_is_schedule_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = SystemdTimerScheduler::new(
            command(),
            dir.path().join("units"),
            fake_systemctl(dir.path(), 1),
        );
        assert_eq!(s.register().unwrap_err().code(), "POV-3101");
    }

    #[test]
    fn unregister_when_absent_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let s = SystemdTimerScheduler::new(
            command(),
            dir.path().join("units"),
            PathBuf::from("/nonexistent/systemctl"),
        );
        s.unregister().unwrap();
    }
}
