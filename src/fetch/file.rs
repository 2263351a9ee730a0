//! Local-file base source. Change detection compares a SHA-256 digest with
//! the one recorded by the previous fetch.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{BaseFetcher, FetchOutcome};
use crate::backup::sha256_hex;
use crate::core::config::SourceConfig;
use crate::core::errors::{PovError, Result};
use crate::engine::atomic::atomic_write;

/// Persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FetchState {
    source: PathBuf,
    sha256: String,
    fetched_at: String,
}

/// Reads the base document from a local path.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    source: PathBuf,
    state_path: PathBuf,
}

impl FileFetcher {
    pub fn from_config(source: &SourceConfig, state_path: &Path) -> Result<Self> {
        let local = source
            .local_path
            .clone()
            .ok_or_else(|| PovError::InvalidConfig {
                details: "source.kind = \"file\" requires source.local_path".to_string(),
            })?;
        Ok(Self::new(local, state_path.to_path_buf()))
    }

    #[must_use]
    pub fn new(source: PathBuf, state_path: PathBuf) -> Self {
        Self { source, state_path }
    }

    fn previous_digest(&self) -> Option<String> {
        let raw = fs::read_to_string(&self.state_path).ok()?;
        match serde_json::from_str::<FetchState>(&raw) {
            Ok(state) if state.source == self.source => Some(state.sha256),
            Ok(_) => None,
            Err(e) => {
                eprintln!(
                    "[POV-FETCH] ignoring unreadable fetch state {}: {e}",
                    self.state_path.display()
                );
                None
            }
        }
    }

    fn record(&self, sha256: String) -> Result<()> {
        let state = FetchState {
            source: self.source.clone(),
            sha256,
            fetched_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        let json = serde_json::to_string_pretty(&state)?;
        atomic_write(&self.state_path, json.as_bytes())
    }
}

impl BaseFetcher for FileFetcher {
    fn fetch(&mut self) -> Result<FetchOutcome> {
        let content = fs::read_to_string(&self.source).map_err(|e| PovError::Fetch {
            details: format!("cannot read {}: {e}", self.source.display()),
        })?;
        let digest = sha256_hex(content.as_bytes());
        let changed = self.previous_digest().as_deref() != Some(digest.as_str());
        if changed {
            self.record(digest)?;
        }
        Ok(FetchOutcome {
            content,
            changed,
            origin: self.source.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fetch_is_changed_then_stable() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("upstream.js");
        fs::write(&src, "user_pref(\"a\", 1);\n").unwrap();
        let mut f = FileFetcher::new(src.clone(), dir.path().join("state.json"));

        let first = f.fetch().unwrap();
        assert!(first.changed);
        assert_eq!(first.content, "user_pref(\"a\", 1);\n");
        assert!(!f.fetch().unwrap().changed);

        fs::write(&src, "user_pref(\"a\", 2);\n").unwrap();
        assert!(f.fetch().unwrap().changed);
        assert!(!f.fetch().unwrap().changed);
    }

    #[test]
    fn different_source_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        let a = dir.path().join("a.js");
        let b = dir.path().join("b.js");
        fs::write(&a, "same").unwrap();
        fs::write(&b, "same").unwrap();

        FileFetcher::new(a, state.clone()).fetch().unwrap();
        assert!(FileFetcher::new(b, state).fetch().unwrap().changed);
    }

    #[test]
    fn corrupt_state_counts_as_changed() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("u.js");
        let state = dir.path().join("state.json");
        fs::write(&src, "x").unwrap();
        fs::write(&state, "{not json").unwrap();
        assert!(FileFetcher::new(src, state).fetch().unwrap().changed);
    }

    #[test]
    fn missing_source_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = FileFetcher::new(dir.path().join("absent.js"), dir.path().join("s.json"));
        assert_eq!(f.fetch().unwrap_err().code(), "POV-2201");
    }
}
