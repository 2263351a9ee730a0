//! Locate the browser profile directory.
//!
//! An explicitly configured directory wins. Otherwise the profile root is
//! listed and directory names are matched against a glob (`*`, `?`).

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::core::config::ProfileConfig;
use crate::core::errors::{PovError, Result};

/// Compile a directory-name glob into an anchored regex.
pub fn compile_name_pattern(pattern: &str) -> Result<Regex> {
    if pattern.is_empty() {
        return Err(PovError::InvalidConfig {
            details: "profile.name_pattern must not be empty".to_string(),
        });
    }
    if pattern.contains('/') {
        return Err(PovError::InvalidConfig {
            details: format!("profile.name_pattern {pattern:?} must match a single directory name"),
        });
    }

    let mut regex_str = String::with_capacity(pattern.len() + 8);
    regex_str.push('^');
    for c in pattern.chars() {
        match c {
            '*' => regex_str.push_str(".*"),
            '?' => regex_str.push('.'),
            c => regex_str.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex_str.push('$');

    Regex::new(&regex_str).map_err(|err| PovError::InvalidConfig {
        details: format!("invalid profile.name_pattern {pattern:?}: {err}"),
    })
}

/// Directories under `root` whose names match `pattern`, sorted by name.
///
/// A missing root yields an empty list.
pub fn scan_profiles(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = compile_name_pattern(pattern)?;
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(PovError::io(root, source)),
    };

    let mut found: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter(|e| matcher.is_match(&e.file_name().to_string_lossy()))
        .map(|e| e.path())
        .collect();
    found.sort();
    Ok(found)
}

/// Zero or one profile directory.
///
/// More than one match is a configuration problem: the user must pin
/// `profile.dir` so the overlay never lands in the wrong profile.
pub fn find_profile(cfg: &ProfileConfig) -> Result<Option<PathBuf>> {
    if let Some(dir) = &cfg.dir {
        return Ok(dir.is_dir().then(|| dir.clone()));
    }

    let mut found = scan_profiles(&cfg.root, &cfg.name_pattern)?;
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        n => Err(PovError::InvalidConfig {
            details: format!(
                "{n} profiles match {:?} under {}; set profile.dir (or POV_PROFILE_DIR) to choose one",
                cfg.name_pattern,
                cfg.root.display()
            ),
        }),
    }
}

/// Like [`find_profile`], but absence is an error.
pub fn require_profile(cfg: &ProfileConfig) -> Result<PathBuf> {
    find_profile(cfg)?.ok_or_else(|| PovError::ProfileNotFound {
        root: cfg.dir.clone().unwrap_or_else(|| cfg.root.clone()),
        pattern: cfg.name_pattern.clone(),
    })
}
