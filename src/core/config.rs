//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{PovError, Result};
use crate::core::paths::resolve_user_path;
use crate::notify::NotificationConfig;

/// Full prefs-overlay configuration model.
///
/// Built once by [`Config::load`] and passed by reference into every
/// component; nothing reads paths or mode flags from ambient globals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub profile: ProfileConfig,
    pub source: SourceConfig,
    pub engine: EngineConfig,
    pub schedule: ScheduleConfig,
    pub notifications: NotificationConfig,
}

/// Filesystem locations owned by prefs-overlay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Local copy of the most recently fetched base configuration.
    pub base_file: PathBuf,
    /// User-authored override file; absence is valid.
    pub override_file: PathBuf,
    pub backup_dir: PathBuf,
    pub event_log: PathBuf,
    /// Digest of the last fetched base, used by the file fetcher.
    pub fetch_state: PathBuf,
}

/// Where the browser profile lives and which files inside it are managed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfileConfig {
    /// Directory scanned for profiles.
    pub root: PathBuf,
    /// Glob (`*`, `?`) matched against directory names under `root`.
    pub name_pattern: String,
    /// Explicit profile directory; skips discovery when set.
    pub dir: Option<PathBuf>,
    /// Live configuration file name inside the profile.
    pub live_file: String,
    /// Files captured by backups and governed by restore.
    pub tracked_files: Vec<String>,
    /// Session-state file that needs confirmation before it is restored.
    pub sensitive_file: String,
    /// Process names that indicate the browser is running.
    pub process_names: Vec<String>,
}

/// Kind of upstream the base configuration is fetched from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Git,
    File,
}

/// Base configuration upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub repo_url: String,
    pub checkout_dir: PathBuf,
    /// Path of the base file inside the repository checkout.
    pub repo_file: String,
    /// Source file for `kind = "file"`.
    pub local_path: Option<PathBuf>,
}

/// Apply engine knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Poll interval while waiting for the browser to exit.
    pub browser_poll_interval_ms: u64,
    /// Backups retained after each snapshot (the pre-install backup is always kept).
    pub max_backups: usize,
}

/// Periodic re-application settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// systemd `OnCalendar=` expression.
    pub on_calendar: String,
    /// launchd `StartInterval` in seconds.
    pub interval_secs: u64,
}

fn home_dir(purpose: &str) -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[POV-CONFIG] WARNING: HOME not set, falling back to /tmp for {purpose}");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn default_data_dir() -> PathBuf {
    home_dir("data paths")
        .join(".local")
        .join("share")
        .join("prefs-overlay")
}

impl Default for PathsConfig {
    fn default() -> Self {
        let cfg_dir = home_dir("config paths")
            .join(".config")
            .join("prefs-overlay");
        let data = default_data_dir();
        Self {
            config_file: cfg_dir.join("config.toml"),
            base_file: data.join("base-user.js"),
            override_file: cfg_dir.join("user-overrides.js"),
            backup_dir: data.join("backups"),
            event_log: data.join("events.log"),
            fetch_state: data.join("fetch-state.json"),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        let home = home_dir("profile paths");
        let root = if cfg!(target_os = "macos") {
            home.join("Library")
                .join("Application Support")
                .join("Firefox")
                .join("Profiles")
        } else {
            home.join(".mozilla").join("firefox")
        };
        Self {
            root,
            name_pattern: "*.default-release".to_string(),
            dir: None,
            live_file: "user.js".to_string(),
            tracked_files: vec!["user.js".to_string(), "prefs.js".to_string()],
            sensitive_file: "prefs.js".to_string(),
            process_names: vec![
                "firefox".to_string(),
                "firefox-bin".to_string(),
                "firefox-esr".to_string(),
            ],
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Git,
            repo_url: "https://github.com/arkenfox/user.js".to_string(),
            checkout_dir: default_data_dir().join("upstream"),
            repo_file: "user.js".to_string(),
            local_path: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            browser_poll_interval_ms: 2_000,
            max_backups: 10,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_calendar: "daily".to_string(),
            interval_secs: 24 * 60 * 60,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| PovError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(PovError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for log correlation.
    ///
    /// FNV-1a over canonical JSON so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Path of the live configuration file inside `profile_dir`.
    #[must_use]
    pub fn live_path(&self, profile_dir: &Path) -> PathBuf {
        profile_dir.join(&self.profile.live_file)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // paths
        if let Some(raw) = lookup("POV_OVERRIDE_FILE") {
            self.paths.override_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("POV_BASE_FILE") {
            self.paths.base_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("POV_BACKUP_DIR") {
            self.paths.backup_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("POV_EVENT_LOG") {
            self.paths.event_log = PathBuf::from(raw);
        }

        // profile
        if let Some(raw) = lookup("POV_PROFILE_DIR") {
            self.profile.dir = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("POV_PROFILE_ROOT") {
            self.profile.root = PathBuf::from(raw);
        }

        // source
        if let Some(raw) = lookup("POV_SOURCE_KIND") {
            self.source.kind = match raw.trim().to_ascii_lowercase().as_str() {
                "git" => SourceKind::Git,
                "file" => SourceKind::File,
                other => {
                    return Err(PovError::ConfigParse {
                        context: "env",
                        details: format!("POV_SOURCE_KIND={other:?}: expected \"git\" or \"file\""),
                    });
                }
            };
        }
        if let Some(raw) = lookup("POV_SOURCE_REPO_URL") {
            self.source.repo_url = raw;
        }
        if let Some(raw) = lookup("POV_SOURCE_LOCAL_PATH") {
            self.source.local_path = Some(PathBuf::from(raw));
        }

        // engine
        if let Some(raw) = lookup("POV_ENGINE_BROWSER_POLL_INTERVAL_MS") {
            self.engine.browser_poll_interval_ms =
                parse_env_u64("POV_ENGINE_BROWSER_POLL_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("POV_ENGINE_MAX_BACKUPS") {
            self.engine.max_backups = parse_env_usize("POV_ENGINE_MAX_BACKUPS", &raw)?;
        }

        // schedule + notifications
        if let Some(raw) = lookup("POV_SCHEDULE_ENABLED") {
            self.schedule.enabled = parse_env_bool("POV_SCHEDULE_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("POV_NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = parse_env_bool("POV_NOTIFICATIONS_ENABLED", &raw)?;
        }

        Ok(())
    }

    /// Expand `~` and make every configured path absolute.
    fn normalize_paths(&mut self) {
        for path in [
            &mut self.paths.base_file,
            &mut self.paths.override_file,
            &mut self.paths.backup_dir,
            &mut self.paths.event_log,
            &mut self.paths.fetch_state,
            &mut self.profile.root,
            &mut self.source.checkout_dir,
        ] {
            *path = resolve_user_path(path);
        }
        if let Some(dir) = self.profile.dir.as_mut() {
            *dir = resolve_user_path(dir);
        }
        if let Some(local) = self.source.local_path.as_mut() {
            *local = resolve_user_path(local);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.profile.tracked_files.is_empty() {
            return Err(PovError::InvalidConfig {
                details: "profile.tracked_files must not be empty".to_string(),
            });
        }

        // Tracked names are joined onto the profile and backup dirs; keep them flat.
        for name in &self.profile.tracked_files {
            if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
                return Err(PovError::InvalidConfig {
                    details: format!("profile.tracked_files entry {name:?} must be a plain file name"),
                });
            }
        }

        if !self.profile.tracked_files.contains(&self.profile.live_file) {
            return Err(PovError::InvalidConfig {
                details: format!(
                    "profile.live_file ({}) must be listed in profile.tracked_files",
                    self.profile.live_file
                ),
            });
        }

        if !self.profile.sensitive_file.is_empty()
            && !self.profile.tracked_files.contains(&self.profile.sensitive_file)
        {
            return Err(PovError::InvalidConfig {
                details: format!(
                    "profile.sensitive_file ({}) must be listed in profile.tracked_files",
                    self.profile.sensitive_file
                ),
            });
        }

        if self.profile.sensitive_file == self.profile.live_file {
            return Err(PovError::InvalidConfig {
                details: "profile.sensitive_file cannot be the live configuration file".to_string(),
            });
        }

        crate::profile::discovery::compile_name_pattern(&self.profile.name_pattern)?;

        if self.engine.browser_poll_interval_ms == 0 {
            return Err(PovError::InvalidConfig {
                details: "engine.browser_poll_interval_ms must be > 0".to_string(),
            });
        }

        if self.engine.max_backups == 0 {
            return Err(PovError::InvalidConfig {
                details: "engine.max_backups must be >= 1".to_string(),
            });
        }

        match self.source.kind {
            SourceKind::Git if self.source.repo_url.trim().is_empty() => {
                return Err(PovError::InvalidConfig {
                    details: "source.repo_url must be set when source.kind = \"git\"".to_string(),
                });
            }
            SourceKind::File if self.source.local_path.is_none() => {
                return Err(PovError::InvalidConfig {
                    details: "source.local_path must be set when source.kind = \"file\"".to_string(),
                });
            }
            _ => {}
        }

        if self.schedule.enabled && self.schedule.interval_secs == 0 {
            return Err(PovError::InvalidConfig {
                details: "schedule.interval_secs must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| PovError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.parse::<usize>().map_err(|error| PovError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| PovError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
