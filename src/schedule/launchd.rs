//! launchd user agent running the updater every `interval_secs`.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use super::{ScheduledCommand, Scheduler, home_dir};
use crate::core::errors::{PovError, Result};
use crate::engine::atomic::atomic_write;

const LAUNCHD_LABEL: &str = "org.prefs-overlay.update";

#[derive(Debug, Clone)]
pub struct LaunchdScheduler {
    command: ScheduledCommand,
    agent_dir: PathBuf,
    log_dir: PathBuf,
    launchctl: PathBuf,
}

impl LaunchdScheduler {
    /// Agent in `~/Library/LaunchAgents`, logs in `~/Library/Logs/prefs-overlay`.
    #[must_use]
    pub fn user(command: ScheduledCommand) -> Self {
        let home = home_dir();
        Self::new(
            command,
            home.join("Library/LaunchAgents"),
            home.join("Library/Logs/prefs-overlay"),
            PathBuf::from("launchctl"),
        )
    }

    #[must_use]
    pub fn new(
        command: ScheduledCommand,
        agent_dir: PathBuf,
        log_dir: PathBuf,
        launchctl: PathBuf,
    ) -> Self {
        Self {
            command,
            agent_dir,
            log_dir,
            launchctl,
        }
    }

    #[must_use]
    pub fn plist_path(&self) -> PathBuf {
        self.agent_dir.join(format!("{LAUNCHD_LABEL}.plist"))
    }

    #[must_use]
    pub fn generate_plist(&self) -> String {
        let args = self
            .command
            .argv()
            .iter()
            .map(|a| format!("        <string>{}</string>\n", escape_xml(a)))
            .collect::<String>();
        let stdout_log = escape_xml(&self.log_dir.join("update.log").to_string_lossy());
        let stderr_log = escape_xml(&self.log_dir.join("update.err").to_string_lossy());
        let interval = self.command.interval_secs;

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{LAUNCHD_LABEL}</string>
    <key>ProgramArguments</key>
    <array>
{args}    </array>
    <key>StartInterval</key>
    <integer>{interval}</integer>
    <key>RunAtLoad</key>
    <false/>
    <key>Nice</key>
    <integer>10</integer>
    <key>LowPriorityIO</key>
    <true/>
    <key>StandardOutPath</key>
    <string>{stdout_log}</string>
    <key>StandardErrorPath</key>
    <string>{stderr_log}</string>
</dict>
</plist>
"#
        )
    }

    fn run_launchctl(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.launchctl)
            .args(args)
            .output()
            .map_err(|e| PovError::Schedule {
                details: format!("failed to execute launchctl: {e}"),
            })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(PovError::Schedule {
                details: format!(
                    "launchctl {} failed (exit {}): {}",
                    args.join(" "),
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }

    fn run_launchctl_lenient(&self, args: &[&str]) -> String {
        Command::new(&self.launchctl)
            .args(args)
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .unwrap_or_default()
    }

    fn plist_arg(&self) -> Result<String> {
        self.plist_path()
            .to_str()
            .map(str::to_string)
            .ok_or_else(|| PovError::Schedule {
                details: "plist path is not valid UTF-8".to_string(),
            })
    }
}

impl Scheduler for LaunchdScheduler {
    fn name(&self) -> &'static str {
        "launchd"
    }

    fn definition_path(&self) -> PathBuf {
        self.plist_path()
    }

    fn register(&self) -> Result<()> {
        fs::create_dir_all(&self.log_dir).map_err(|source| PovError::io(&self.log_dir, source))?;
        atomic_write(&self.plist_path(), self.generate_plist().as_bytes()).map_err(|e| {
            PovError::Schedule {
                details: e.to_string(),
            }
        })?;
        let plist = self.plist_arg()?;
        // Reloading an already-loaded agent fails; unload first.
        self.run_launchctl_lenient(&["unload", &plist]);
        self.run_launchctl(&["load", "-w", &plist])?;
        Ok(())
    }

    fn unregister(&self) -> Result<()> {
        let path = self.plist_path();
        if !path.exists() {
            return Ok(());
        }
        if let Ok(plist) = self.plist_arg() {
            self.run_launchctl_lenient(&["unload", "-w", &plist]);
        }
        fs::remove_file(&path).map_err(|source| PovError::io(&path, source))
    }

    fn status(&self) -> Result<String> {
        if !self.plist_path().exists() {
            return Ok("not installed".to_string());
        }
        let output = self.run_launchctl_lenient(&["list", LAUNCHD_LABEL]);
        if output.is_empty() {
            Ok("not loaded".to_string())
        } else {
            Ok("loaded".to_string())
        }
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
