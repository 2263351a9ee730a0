//! Backup manifest: what was captured, when, from where, and why.
//!
//! On disk the manifest is a small line-oriented text file:
//!
//! ```text
//! # prefs-overlay backup manifest v1
//! created=2026-03-01T10:00:00.000Z
//! profile=/home/u/.mozilla/firefox/abcd.default-release
//! reason=install
//! file=user.js sha256=9f86d081...
//! ```

use std::fmt::{self, Write as _};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::core::errors::{PovError, Result};

/// File name of the manifest inside each backup directory.
pub const MANIFEST_FILE: &str = "MANIFEST";

const HEADER: &str = "# prefs-overlay backup manifest v1";

/// Why a backup was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupReason {
    Install,
    Update,
    Uninstall,
    Restore,
}

impl BackupReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::Uninstall => "uninstall",
            Self::Restore => "restore",
        }
    }
}

impl fmt::Display for BackupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupReason {
    type Err = PovError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "install" => Ok(Self::Install),
            "update" => Ok(Self::Update),
            "uninstall" => Ok(Self::Uninstall),
            "restore" => Ok(Self::Restore),
            other => Err(PovError::Backup {
                details: format!("unknown backup reason {other:?}"),
            }),
        }
    }
}

/// One captured file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub file: String,
    pub sha256: String,
}

/// Immutable record of a single backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupManifest {
    /// Backup directory name; not stored inside the manifest text.
    pub id: String,
    pub created: DateTime<Utc>,
    pub profile: PathBuf,
    pub reason: BackupReason,
    pub files: Vec<ManifestEntry>,
}

impl BackupManifest {
    /// Whether `file` was captured.
    #[must_use]
    pub fn contains(&self, file: &str) -> bool {
        self.files.iter().any(|e| e.file == file)
    }

    /// Captured file names in capture order.
    #[must_use]
    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(|e| e.file.as_str()).collect()
    }

    /// Render to the on-disk text form.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{HEADER}");
        let _ = writeln!(
            out,
            "created={}",
            self.created.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let _ = writeln!(out, "profile={}", self.profile.display());
        let _ = writeln!(out, "reason={}", self.reason);
        for entry in &self.files {
            let _ = writeln!(out, "file={} sha256={}", entry.file, entry.sha256);
        }
        out
    }

    /// Parse the on-disk text form for the backup named `id`.
    pub fn parse(id: &str, text: &str) -> Result<Self> {
        let bad = |details: String| PovError::Backup {
            details: format!("manifest {id}: {details}"),
        };

        let mut created = None;
        let mut profile = None;
        let mut reason = None;
        let mut files = Vec::new();

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(bad(format!("malformed line {line:?}")));
            };
            match key {
                "created" => {
                    let ts = DateTime::parse_from_rfc3339(value)
                        .map_err(|e| bad(format!("bad created timestamp: {e}")))?;
                    created = Some(ts.with_timezone(&Utc));
                }
                "profile" => profile = Some(PathBuf::from(value)),
                "reason" => reason = Some(value.parse::<BackupReason>()?),
                "file" => {
                    let Some((file, sha256)) = value.rsplit_once(" sha256=") else {
                        return Err(bad(format!("file entry without digest: {line:?}")));
                    };
                    if !is_flat_name(file) {
                        return Err(bad(format!("file entry {file:?} is not a plain file name")));
                    }
                    files.push(ManifestEntry {
                        file: file.to_string(),
                        sha256: sha256.to_string(),
                    });
                }
                _ => {}
            }
        }

        Ok(Self {
            id: id.to_string(),
            created: created.ok_or_else(|| bad("missing created".to_string()))?,
            profile: profile.ok_or_else(|| bad("missing profile".to_string()))?,
            reason: reason.ok_or_else(|| bad("missing reason".to_string()))?,
            files,
        })
    }
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn is_flat_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample() -> BackupManifest {
        BackupManifest {
            id: "20260301-100000-000".to_string(),
            created: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            profile: PathBuf::from("/home/u/.mozilla/firefox/x.default-release"),
            reason: BackupReason::Install,
            files: vec![ManifestEntry {
                file: "user.js".to_string(),
                sha256: sha256_hex(b"abc"),
            }],
        }
    }

    #[test]
    fn render_then_parse_preserves_fields() {
        let m = sample();
        let text = m.render();
        assert!(text.starts_with(HEADER));
        assert!(text.contains("reason=install\n"));
        assert_eq!(BackupManifest::parse(&m.id, &text).unwrap(), m);
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn path_traversal_entry_rejected() {
        let text = "created=2026-03-01T10:00:00.000Z\nprofile=/p\nreason=update\nfile=../x sha256=00\n";
        let err = BackupManifest::parse("id", text).unwrap_err();
        assert_eq!(err.code(), "POV-2002");
    }

    #[test]
    fn missing_header_field_rejected() {
        let text = "profile=/p\nreason=update\n";
        assert!(BackupManifest::parse("id", text).is_err());
    }

    #[test]
    fn empty_file_list_is_valid() {
        let text = "created=2026-03-01T10:00:00.000Z\nprofile=/p\nreason=uninstall\n";
        let m = BackupManifest::parse("id", text).unwrap();
        assert!(m.files.is_empty());
        assert_eq!(m.reason, BackupReason::Uninstall);
    }

    #[test]
    fn unknown_reason_rejected() {
        assert!("sideways".parse::<BackupReason>().is_err());
        assert_eq!("restore".parse::<BackupReason>().unwrap(), BackupReason::Restore);
    }
}
