//! Git-backed base source: shallow clone on first use, fast-forward pull after.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{BaseFetcher, FetchOutcome, which_binary};
use crate::core::config::SourceConfig;
use crate::core::errors::{PovError, Result};

const INSTALL_HINT: &str =
    "install git: apt install git (Debian/Ubuntu), dnf install git (Fedora), brew install git (macOS)";

/// Keeps a checkout of the upstream repository and reads one file from it.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: PathBuf,
    repo_url: String,
    checkout_dir: PathBuf,
    repo_file: String,
}

impl GitFetcher {
    /// Locate `git` on `PATH`; its absence is fatal.
    pub fn from_config(source: &SourceConfig) -> Result<Self> {
        let program = which_binary("git").ok_or_else(|| PovError::ToolMissing {
            tool: "git",
            remediation: INSTALL_HINT.to_string(),
        })?;
        Ok(Self::with_program(program, source))
    }

    /// Use an explicit git executable.
    #[must_use]
    pub fn with_program(program: PathBuf, source: &SourceConfig) -> Self {
        Self {
            program,
            repo_url: source.repo_url.clone(),
            checkout_dir: source.checkout_dir.clone(),
            repo_file: source.repo_file.clone(),
        }
    }

    fn git(&self, op: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PovError::ToolMissing {
                        tool: "git",
                        remediation: INSTALL_HINT.to_string(),
                    }
                } else {
                    PovError::Fetch {
                        details: format!("failed to execute git: {e}"),
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PovError::Fetch {
                details: format!("git {op} exited with {}: {}", output.status, stderr.trim()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn head(&self) -> Result<String> {
        let dir = self.checkout_dir.to_string_lossy();
        self.git("rev-parse", &["-C", &dir, "rev-parse", "HEAD"])
    }

    fn pull(&self) -> Result<()> {
        let dir = self.checkout_dir.to_string_lossy();
        self.git("pull", &["-C", &dir, "pull", "--ff-only", "--quiet"])
            .map(drop)
    }

    fn clone_fresh(&self) -> Result<()> {
        if self.repo_url.starts_with('-') {
            return Err(PovError::InvalidConfig {
                details: format!("source.repo_url {:?} cannot start with '-'", self.repo_url),
            });
        }
        if let Some(parent) = self.checkout_dir.parent() {
            fs::create_dir_all(parent).map_err(|source| PovError::io(parent, source))?;
        }
        let dest = self.checkout_dir.to_string_lossy();
        self.git(
            "clone",
            &["clone", "--depth", "1", "--quiet", "--", &self.repo_url, &dest],
        )
        .map(drop)
    }

    fn read_file(&self) -> Result<String> {
        let path = self.checkout_dir.join(&self.repo_file);
        fs::read_to_string(&path).map_err(|e| PovError::BaseConfig {
            path,
            details: e.to_string(),
        })
    }
}

fn is_checkout(dir: &Path) -> bool {
    dir.join(".git").exists()
}

impl BaseFetcher for GitFetcher {
    fn fetch(&mut self) -> Result<FetchOutcome> {
        let changed = if is_checkout(&self.checkout_dir) {
            let before = self.head()?;
            self.pull()?;
            self.head()? != before
        } else {
            let occupied = fs::read_dir(&self.checkout_dir)
                .map(|mut rd| rd.next().is_some())
                .unwrap_or(false);
            if occupied {
                return Err(PovError::Fetch {
                    details: format!(
                        "{} exists but is not a git checkout; remove it or change source.checkout_dir",
                        self.checkout_dir.display()
                    ),
                });
            }
            self.clone_fresh()?;
            true
        };

        Ok(FetchOutcome {
            content: self.read_file()?,
            changed,
            origin: self.repo_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_in(dir: &Path) -> SourceConfig {
        SourceConfig {
            repo_url: "https://example.invalid/prefs.git".to_string(),
            checkout_dir: dir.join("upstream"),
            ..SourceConfig::default()
        }
    }

    #[test]
    fn missing_program_is_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = GitFetcher::with_program(
            PathBuf::from("/nonexistent/pov-git"),
            &source_in(dir.path()),
        );
        let err = fetcher.fetch().unwrap_err();
        assert_eq!(err.code(), "POV-1102");
    }

    #[test]
    fn occupied_non_checkout_dir_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_in(dir.path());
        fs::create_dir_all(&source.checkout_dir).unwrap();
        fs::write(source.checkout_dir.join("stray"), "x").unwrap();
        let mut fetcher = GitFetcher::with_program(PathBuf::from("git"), &source);
        assert_eq!(fetcher.fetch().unwrap_err().code(), "POV-2201");
    }

    #[test]
    fn dash_url_is_rejected_before_running_git() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = source_in(dir.path());
        source.repo_url = "--upload-pack=evil".to_string();
        let mut fetcher = GitFetcher::with_program(PathBuf::from("/nonexistent/git"), &source);
        assert_eq!(fetcher.fetch().unwrap_err().code(), "POV-1001");
    }

    /// Stand-in git: `clone` creates a checkout, `rev-parse` prints a stored
    /// head, `pull` adopts `.git/upstream` when present.
    #[cfg(unix)]
    fn fake_git(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-git");
        fs::write(
            &script,
            r#"#!/bin/sh
if [ "$1" = "clone" ]; then
  for last; do :; done
  mkdir -p "$last/.git"
  printf 'user_pref("a", 1);\n' > "$last/user.js"
  echo 1 > "$last/.git/fake-head"
  exit 0
fi
case "$3" in
  rev-parse) cat "$2/.git/fake-head" ;;
  pull) if [ -f "$2/.git/upstream" ]; then cp "$2/.git/upstream" "$2/.git/fake-head"; fi ;;
  *) exit 1 ;;
esac
"#,
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn clone_then_pull_reports_changes_by_head() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_in(dir.path());
        let mut fetcher = GitFetcher::with_program(fake_git(dir.path()), &source);

        let first = fetcher.fetch().unwrap();
        assert!(first.changed);
        assert_eq!(first.content, "user_pref(\"a\", 1);\n");

        let second = fetcher.fetch().unwrap();
        assert!(!second.changed);

        // Upstream moves; the next pull fast-forwards HEAD.
        fs::write(source.checkout_dir.join(".git/upstream"), "2\n").unwrap();
        fs::write(source.checkout_dir.join("user.js"), "user_pref(\"b\", 2);\n").unwrap();
        let third = fetcher.fetch().unwrap();
        assert!(third.changed);
        assert_eq!(third.content, "user_pref(\"b\", 2);\n");

        assert!(!fetcher.fetch().unwrap().changed);
    }

    #[cfg(unix)]
    #[test]
    fn missing_repo_file_is_base_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = source_in(dir.path());
        source.repo_file = "absent.js".to_string();
        let mut fetcher = GitFetcher::with_program(fake_git(dir.path()), &source);
        assert_eq!(fetcher.fetch().unwrap_err().code(), "POV-2001");
    }
}
