#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_pov") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "pov.exe" } else { "pov" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve pov binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_in(case_name, args, None)
}

/// Run `pov` with HOME pointed at `home` so nothing touches the real profile.
pub fn run_cli_case_in(case_name: &str, args: &[&str], home: Option<&Path>) -> CmdResult {
    let root = std::env::temp_dir().join("pov-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("RUST_BACKTRACE", "1")
        .env_remove("POV_OUTPUT_FORMAT")
        .env_remove("POV_PROFILE_DIR")
        .env_remove("POV_OVERRIDE_FILE");
    if let Some(home) = home {
        command
            .env("HOME", home)
            .env("XDG_CONFIG_HOME", home.join(".config"));
    }
    let output = command.output().expect("execute pov command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// A throwaway profile, upstream base file, and config pointing at both.
pub struct Sandbox {
    pub root: TempDir,
    pub profile: PathBuf,
    pub upstream: PathBuf,
    pub override_file: PathBuf,
    pub data: PathBuf,
    pub config_path: PathBuf,
}

impl Sandbox {
    pub fn new(base: &str) -> Self {
        let root = tempfile::tempdir().expect("create sandbox");
        let profile = root.path().join("profile");
        fs::create_dir_all(&profile).expect("create profile dir");
        let upstream = root.path().join("upstream-user.js");
        fs::write(&upstream, base).expect("write upstream base");
        let data = root.path().join("data");
        let override_file = root.path().join("user-overrides.js");
        let config_path = root.path().join("config.toml");

        let config = format!(
            r#"[paths]
base_file = '{data}/base-user.js'
override_file = '{override_file}'
backup_dir = '{data}/backups'
event_log = '{data}/events.log'
fetch_state = '{data}/fetch-state.json'

[profile]
dir = '{profile}'
process_names = ["pov-test-no-such-browser"]

[source]
kind = "file"
local_path = '{upstream}'
checkout_dir = '{data}/upstream'

[schedule]
enabled = false

[notifications]
enabled = false
"#,
            data = data.display(),
            override_file = override_file.display(),
            profile = profile.display(),
            upstream = upstream.display(),
        );
        fs::write(&config_path, config).expect("write config");

        Self {
            root,
            profile,
            upstream,
            override_file,
            data,
            config_path,
        }
    }

    pub fn home(&self) -> &Path {
        self.root.path()
    }

    pub fn config_arg(&self) -> String {
        self.config_path.display().to_string()
    }

    pub fn live(&self) -> Option<String> {
        fs::read_to_string(self.profile.join("user.js")).ok()
    }

    pub fn event_log(&self) -> String {
        fs::read_to_string(self.data.join("events.log")).unwrap_or_default()
    }

    pub fn run(&self, case_name: &str, args: &[&str]) -> CmdResult {
        let config = self.config_arg();
        let mut full: Vec<&str> = vec!["--config", &config];
        full.extend_from_slice(args);
        run_cli_case_in(case_name, &full, Some(self.home()))
    }
}
