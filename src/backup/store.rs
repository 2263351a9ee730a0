//! Timestamped backup directories of a profile's tracked files.
//!
//! Layout under the backup root:
//!
//! ```text
//! backups/
//!   LAST                       id of the newest backup
//!   20260301-100000-000/
//!     MANIFEST
//!     user.js
//!     prefs.js
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::manifest::{BackupManifest, BackupReason, MANIFEST_FILE, ManifestEntry, sha256_hex};
use crate::core::config::ProfileConfig;
use crate::core::errors::{PovError, Result};
use crate::core::prompt::Confirm;
use crate::engine::atomic::{atomic_write, stage_write};

/// Name of the last-backup pointer file in the backup root.
pub const LAST_POINTER: &str = "LAST";

/// Outcome of [`BackupManager::snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub manifest: BackupManifest,
    /// Tracked files absent from the profile at snapshot time.
    pub skipped: Vec<String>,
}

/// Outcome of [`BackupManager::restore`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreReport {
    pub backup_id: String,
    pub restored: Vec<String>,
    /// Sensitive files the user chose not to restore.
    pub declined: Vec<String>,
    /// Manifest entries whose backup copy has disappeared.
    pub missing: Vec<String>,
    /// Tracked files removed from the profile because the backup lacked them.
    pub deleted: Vec<String>,
}

/// Outcome of [`BackupManager::prune`].
#[derive(Debug, Clone, Serialize)]
pub struct PruneResult {
    pub kept: usize,
    pub removed: usize,
    pub removed_ids: Vec<String>,
}

/// Full listing with the root it came from.
#[derive(Debug, Clone, Serialize)]
pub struct BackupInventory {
    pub backups: Vec<BackupManifest>,
    pub backup_dir: PathBuf,
}

/// Creates, lists, restores and prunes profile backups.
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
    tracked: Vec<String>,
    sensitive: String,
}

impl BackupManager {
    /// Manager rooted at `root` capturing the files named in `profile`.
    #[must_use]
    pub fn new(root: PathBuf, profile: &ProfileConfig) -> Self {
        Self {
            root,
            tracked: profile.tracked_files.clone(),
            sensitive: profile.sensitive_file.clone(),
        }
    }

    /// Backup root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.root
    }

    /// Directory of the backup named `id`.
    #[must_use]
    pub fn dir_for(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Copy every tracked file present in `profile_dir` into a new backup.
    ///
    /// Absent tracked files are skipped. A partially written backup directory
    /// is removed before the error is returned.
    pub fn snapshot(&self, profile_dir: &Path, reason: BackupReason) -> Result<Snapshot> {
        fs::create_dir_all(&self.root).map_err(|e| PovError::Backup {
            details: format!("cannot create backup root {}: {e}", self.root.display()),
        })?;

        // Millisecond precision, matching what the manifest text can hold.
        let now = Utc::now();
        let created = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        let (id, entry_dir) = self.claim_dir(created)?;

        match self.capture(profile_dir, &entry_dir, &id, created, reason) {
            Ok(snapshot) => {
                self.write_last(&id)?;
                Ok(snapshot)
            }
            Err(err) => {
                let _ = fs::remove_dir_all(&entry_dir);
                Err(err)
            }
        }
    }

    fn claim_dir(&self, created: DateTime<Utc>) -> Result<(String, PathBuf)> {
        let stamp = created.format("%Y%m%d-%H%M%S-%3f").to_string();
        for attempt in 0..100_u32 {
            let id = if attempt == 0 {
                stamp.clone()
            } else {
                format!("{stamp}-{attempt:02}")
            };
            let dir = self.root.join(&id);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((id, dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => {
                    return Err(PovError::Backup {
                        details: format!("cannot create {}: {e}", dir.display()),
                    });
                }
            }
        }
        Err(PovError::Backup {
            details: format!("could not allocate a backup directory for {stamp}"),
        })
    }

    fn capture(
        &self,
        profile_dir: &Path,
        entry_dir: &Path,
        id: &str,
        created: DateTime<Utc>,
        reason: BackupReason,
    ) -> Result<Snapshot> {
        let mut files = Vec::new();
        let mut skipped = Vec::new();

        for name in &self.tracked {
            let src = profile_dir.join(name);
            let bytes = match fs::read(&src) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    skipped.push(name.clone());
                    continue;
                }
                Err(e) => {
                    return Err(PovError::Backup {
                        details: format!("cannot read {}: {e}", src.display()),
                    });
                }
            };
            let dest = entry_dir.join(name);
            fs::write(&dest, &bytes).map_err(|e| PovError::Backup {
                details: format!("cannot write {}: {e}", dest.display()),
            })?;
            files.push(ManifestEntry {
                file: name.clone(),
                sha256: sha256_hex(&bytes),
            });
        }

        let manifest = BackupManifest {
            id: id.to_string(),
            created,
            profile: profile_dir.to_path_buf(),
            reason,
            files,
        };
        atomic_write(&entry_dir.join(MANIFEST_FILE), manifest.render().as_bytes()).map_err(
            |e| PovError::Backup {
                details: format!("cannot write manifest for {id}: {e}"),
            },
        )?;

        Ok(Snapshot { manifest, skipped })
    }

    /// All readable backups, newest first.
    ///
    /// Directories without a parseable manifest are skipped with a warning.
    pub fn list(&self) -> Result<Vec<BackupManifest>> {
        let read_dir = match fs::read_dir(&self.root) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(PovError::io(&self.root, source)),
        };

        let mut manifests = Vec::new();
        for entry in read_dir.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match self.load(&id) {
                Ok(m) => manifests.push(m),
                Err(err) => eprintln!("[POV-BACKUP] skipping {id}: {err}"),
            }
        }

        manifests.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.id.cmp(&a.id)));
        Ok(manifests)
    }

    /// Listing plus the root directory, for reports.
    pub fn inventory(&self) -> Result<BackupInventory> {
        Ok(BackupInventory {
            backups: self.list()?,
            backup_dir: self.root.clone(),
        })
    }

    /// Newest backup by manifest timestamp.
    pub fn latest(&self) -> Result<Option<BackupManifest>> {
        Ok(self.list()?.into_iter().next())
    }

    /// Newest backup taken for `reason`.
    pub fn latest_for(&self, reason: BackupReason) -> Result<Option<BackupManifest>> {
        Ok(self.list()?.into_iter().find(|m| m.reason == reason))
    }

    /// The profile as it was before the overlay went on: the oldest install
    /// backup taken since the last uninstall, else the newest install backup.
    pub fn install_baseline(&self) -> Result<Option<BackupManifest>> {
        Ok(install_baseline_of(&self.list()?).cloned())
    }

    /// Read the manifest of backup `id`.
    pub fn load(&self, id: &str) -> Result<BackupManifest> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(PovError::BackupNotFound { id: id.to_string() });
        }
        let path = self.root.join(id).join(MANIFEST_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PovError::BackupNotFound { id: id.to_string() });
            }
            Err(source) => return Err(PovError::io(&path, source)),
        };
        BackupManifest::parse(id, &text)
    }

    /// Id recorded in the last-backup pointer, if any.
    pub fn read_last(&self) -> Result<Option<String>> {
        let path = self.root.join(LAST_POINTER);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                let id = raw.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PovError::io(&path, source)),
        }
    }

    fn write_last(&self, id: &str) -> Result<()> {
        atomic_write(&self.root.join(LAST_POINTER), format!("{id}\n").as_bytes()).map_err(|e| {
            PovError::Backup {
                details: format!("cannot update last-backup pointer: {e}"),
            }
        })
    }

    /// Put the files captured in `manifest` back into `profile_dir`.
    ///
    /// Every digest is checked before the profile is touched; a mismatch
    /// aborts with the profile unchanged. The sensitive file is restored only
    /// on an affirmative answer from `confirm`. Afterwards every tracked file
    /// that the manifest does not list is removed from the profile.
    pub fn restore(
        &self,
        manifest: &BackupManifest,
        profile_dir: &Path,
        confirm: &mut dyn Confirm,
    ) -> Result<RestoreReport> {
        let entry_dir = self.dir_for(&manifest.id);
        let mut report = RestoreReport {
            backup_id: manifest.id.clone(),
            ..RestoreReport::default()
        };

        let mut verified = Vec::new();
        for entry in &manifest.files {
            if !self.tracked.contains(&entry.file) {
                eprintln!(
                    "[POV-BACKUP] ignoring untracked file {} in backup {}",
                    entry.file, manifest.id
                );
                continue;
            }
            let path = entry_dir.join(&entry.file);
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    report.missing.push(entry.file.clone());
                    continue;
                }
                Err(source) => return Err(PovError::io(&path, source)),
            };
            let actual = sha256_hex(&bytes);
            if actual != entry.sha256 {
                return Err(PovError::IntegrityMismatch {
                    path,
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
            verified.push((entry.file.as_str(), bytes));
        }

        // Stage every accepted file before renaming any of them, so a failed
        // write leaves the profile as it was.
        let mut staged = Vec::new();
        for (file, bytes) in verified {
            if file == self.sensitive
                && !confirm.confirm(&format!(
                    "Restore {file}? This replaces the browser's current saved state."
                ))
            {
                report.declined.push(file.to_string());
                continue;
            }
            staged.push((file, stage_write(&profile_dir.join(file), &bytes)?));
        }
        for (file, pending) in staged {
            if let Err(err) = pending.commit() {
                return Err(PovError::Backup {
                    details: format!(
                        "restore of {} stopped after [{}]: {err}",
                        manifest.id,
                        report.restored.join(", ")
                    ),
                });
            }
            report.restored.push(file.to_string());
        }

        for name in &self.tracked {
            if manifest.contains(name) {
                continue;
            }
            let path = profile_dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => report.deleted.push(name.clone()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(PovError::io(&path, source)),
            }
        }

        Ok(report)
    }

    /// Keep the `keep` newest backups plus the install baseline.
    pub fn prune(&self, keep: usize) -> Result<PruneResult> {
        if keep == 0 {
            return Err(PovError::InvalidConfig {
                details: "backup retention must keep at least one backup".to_string(),
            });
        }

        let entries = self.list()?;
        let baseline = install_baseline_of(&entries).map(|m| m.id.clone());

        let mut removed_ids = Vec::new();
        for entry in entries.iter().skip(keep) {
            if baseline.as_deref() == Some(entry.id.as_str()) {
                continue;
            }
            let dir = self.dir_for(&entry.id);
            fs::remove_dir_all(&dir).map_err(|source| PovError::io(&dir, source))?;
            removed_ids.push(entry.id.clone());
        }

        Ok(PruneResult {
            kept: entries.len() - removed_ids.len(),
            removed: removed_ids.len(),
            removed_ids,
        })
    }
}

/// `entries` is newest first.
fn install_baseline_of(entries: &[BackupManifest]) -> Option<&BackupManifest> {
    entries
        .iter()
        .take_while(|m| m.reason != BackupReason::Uninstall)
        .filter(|m| m.reason == BackupReason::Install)
        .last()
        .or_else(|| entries.iter().find(|m| m.reason == BackupReason::Install))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prompt::{AutoAccept, AutoDecline, ScriptedConfirm};

    fn setup() -> (tempfile::TempDir, BackupManager, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join("profile");
        fs::create_dir(&profile).unwrap();
        let mgr = BackupManager::new(tmp.path().join("backups"), &ProfileConfig::default());
        (tmp, mgr, profile)
    }

    #[test]
    fn snapshot_captures_present_files_and_skips_absent() {
        let (_tmp, mgr, profile) = setup();
        fs::write(profile.join("user.js"), "user_pref(\"a\", 1);\n").unwrap();

        let snap = mgr.snapshot(&profile, BackupReason::Install).unwrap();
        assert_eq!(snap.manifest.file_names(), ["user.js"]);
        assert_eq!(snap.skipped, ["prefs.js"]);
        assert_eq!(
            fs::read_to_string(mgr.dir_for(&snap.manifest.id).join("user.js")).unwrap(),
            "user_pref(\"a\", 1);\n"
        );
        assert_eq!(mgr.read_last().unwrap(), Some(snap.manifest.id.clone()));
    }

    #[test]
    fn snapshot_of_empty_profile_has_empty_manifest() {
        let (_tmp, mgr, profile) = setup();
        let snap = mgr.snapshot(&profile, BackupReason::Update).unwrap();
        assert!(snap.manifest.files.is_empty());
        assert_eq!(mgr.load(&snap.manifest.id).unwrap(), snap.manifest);
    }

    #[test]
    fn rapid_snapshots_get_distinct_ids() {
        let (_tmp, mgr, profile) = setup();
        let a = mgr.snapshot(&profile, BackupReason::Update).unwrap();
        let b = mgr.snapshot(&profile, BackupReason::Update).unwrap();
        assert_ne!(a.manifest.id, b.manifest.id);
        assert_eq!(mgr.list().unwrap().len(), 2);
    }

    #[test]
    fn list_is_newest_first_and_latest_for_filters() {
        let (_tmp, mgr, profile) = setup();
        let install = mgr.snapshot(&profile, BackupReason::Install).unwrap();
        let update = mgr.snapshot(&profile, BackupReason::Update).unwrap();

        let ids: Vec<_> = mgr.list().unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, [update.manifest.id.clone(), install.manifest.id.clone()]);
        assert_eq!(mgr.latest().unwrap().unwrap().id, update.manifest.id);
        assert_eq!(
            mgr.latest_for(BackupReason::Install).unwrap().unwrap().id,
            install.manifest.id
        );
        assert!(mgr.latest_for(BackupReason::Restore).unwrap().is_none());
    }

    #[test]
    fn list_of_missing_root_is_empty() {
        let (_tmp, mgr, _profile) = setup();
        assert!(mgr.list().unwrap().is_empty());
        assert!(mgr.latest().unwrap().is_none());
        assert_eq!(mgr.read_last().unwrap(), None);
    }

    #[test]
    fn load_unknown_or_traversal_id_is_not_found() {
        let (_tmp, mgr, _profile) = setup();
        assert_eq!(mgr.load("nope").unwrap_err().code(), "POV-2004");
        assert_eq!(mgr.load("../etc").unwrap_err().code(), "POV-2004");
    }

    #[test]
    fn restore_deletes_tracked_files_missing_from_manifest() {
        let (_tmp, mgr, profile) = setup();
        fs::write(profile.join("user.js"), "original").unwrap();
        let snap = mgr.snapshot(&profile, BackupReason::Install).unwrap();

        fs::write(profile.join("user.js"), "overlay").unwrap();
        fs::write(profile.join("prefs.js"), "session").unwrap();

        let report = mgr
            .restore(&snap.manifest, &profile, &mut AutoAccept)
            .unwrap();
        assert_eq!(report.restored, ["user.js"]);
        assert_eq!(report.deleted, ["prefs.js"]);
        assert_eq!(fs::read_to_string(profile.join("user.js")).unwrap(), "original");
        assert!(!profile.join("prefs.js").exists());
    }

    #[test]
    fn sensitive_file_needs_confirmation() {
        let (_tmp, mgr, profile) = setup();
        fs::write(profile.join("user.js"), "u1").unwrap();
        fs::write(profile.join("prefs.js"), "p1").unwrap();
        let snap = mgr.snapshot(&profile, BackupReason::Update).unwrap();
        fs::write(profile.join("user.js"), "u2").unwrap();
        fs::write(profile.join("prefs.js"), "p2").unwrap();

        let report = mgr
            .restore(&snap.manifest, &profile, &mut AutoDecline)
            .unwrap();
        assert_eq!(report.restored, ["user.js"]);
        assert_eq!(report.declined, ["prefs.js"]);
        assert_eq!(fs::read_to_string(profile.join("prefs.js")).unwrap(), "p2");

        let mut yes = ScriptedConfirm::new(["YES"]);
        let report = mgr.restore(&snap.manifest, &profile, &mut yes).unwrap();
        assert_eq!(report.restored, ["user.js", "prefs.js"]);
        assert_eq!(fs::read_to_string(profile.join("prefs.js")).unwrap(), "p1");
        assert_eq!(yes.prompts().len(), 1);
    }

    #[test]
    fn tampered_backup_aborts_without_touching_profile() {
        let (_tmp, mgr, profile) = setup();
        fs::write(profile.join("user.js"), "good").unwrap();
        fs::write(profile.join("prefs.js"), "state").unwrap();
        let snap = mgr.snapshot(&profile, BackupReason::Install).unwrap();

        fs::write(mgr.dir_for(&snap.manifest.id).join("prefs.js"), "evil").unwrap();
        fs::write(profile.join("user.js"), "current").unwrap();

        let err = mgr
            .restore(&snap.manifest, &profile, &mut AutoAccept)
            .unwrap_err();
        assert_eq!(err.code(), "POV-2003");
        assert_eq!(fs::read_to_string(profile.join("user.js")).unwrap(), "current");
        assert_eq!(fs::read_to_string(profile.join("prefs.js")).unwrap(), "state");
    }

    #[test]
    fn missing_backup_copy_is_skipped() {
        let (_tmp, mgr, profile) = setup();
        fs::write(profile.join("user.js"), "x").unwrap();
        let snap = mgr.snapshot(&profile, BackupReason::Install).unwrap();
        fs::remove_file(mgr.dir_for(&snap.manifest.id).join("user.js")).unwrap();

        let report = mgr
            .restore(&snap.manifest, &profile, &mut AutoAccept)
            .unwrap();
        assert_eq!(report.missing, ["user.js"]);
        assert!(report.restored.is_empty());
        assert_eq!(fs::read_to_string(profile.join("user.js")).unwrap(), "x");
    }

    #[test]
    fn prune_keeps_newest_and_install_baseline() {
        let (_tmp, mgr, profile) = setup();
        let first_install = mgr.snapshot(&profile, BackupReason::Install).unwrap();
        let second_install = mgr.snapshot(&profile, BackupReason::Install).unwrap();
        let mut updates = Vec::new();
        for _ in 0..4 {
            updates.push(mgr.snapshot(&profile, BackupReason::Update).unwrap());
        }

        let result = mgr.prune(2).unwrap();
        assert_eq!(result.removed, 3);
        assert_eq!(result.kept, 3);

        let ids: Vec<_> = mgr.list().unwrap().into_iter().map(|m| m.id).collect();
        assert!(ids.contains(&first_install.manifest.id));
        assert!(!ids.contains(&second_install.manifest.id));
        assert!(ids.contains(&updates[3].manifest.id));
        assert!(ids.contains(&updates[2].manifest.id));
        assert!(!ids.contains(&updates[0].manifest.id));
    }

    #[test]
    fn install_baseline_is_oldest_install_since_last_uninstall() {
        let (_tmp, mgr, profile) = setup();
        assert!(mgr.install_baseline().unwrap().is_none());

        let first = mgr.snapshot(&profile, BackupReason::Install).unwrap();
        mgr.snapshot(&profile, BackupReason::Install).unwrap();
        mgr.snapshot(&profile, BackupReason::Update).unwrap();
        assert_eq!(mgr.install_baseline().unwrap().unwrap().id, first.manifest.id);

        mgr.snapshot(&profile, BackupReason::Uninstall).unwrap();
        // Nothing installed since: fall back to the newest install backup.
        assert_eq!(
            mgr.install_baseline().unwrap().unwrap().id,
            mgr.latest_for(BackupReason::Install).unwrap().unwrap().id
        );

        let reinstall = mgr.snapshot(&profile, BackupReason::Install).unwrap();
        mgr.snapshot(&profile, BackupReason::Install).unwrap();
        assert_eq!(
            mgr.install_baseline().unwrap().unwrap().id,
            reinstall.manifest.id
        );
    }

    #[test]
    fn failed_restore_write_names_files_already_restored() {
        let (_tmp, mgr, profile) = setup();
        fs::write(profile.join("user.js"), "backed up").unwrap();
        fs::write(profile.join("prefs.js"), "state").unwrap();
        let snap = mgr.snapshot(&profile, BackupReason::Install).unwrap();

        fs::write(profile.join("user.js"), "current").unwrap();
        // A directory in place of prefs.js makes its rename fail.
        fs::remove_file(profile.join("prefs.js")).unwrap();
        fs::create_dir(profile.join("prefs.js")).unwrap();
        fs::write(profile.join("prefs.js").join("keep"), "x").unwrap();

        let err = mgr
            .restore(&snap.manifest, &profile, &mut AutoAccept)
            .unwrap_err();
        assert_eq!(err.code(), "POV-2002");
        assert!(err.to_string().contains("[user.js]"), "{err}");
        assert!(profile.join("prefs.js").join("keep").exists());
        let temps = fs::read_dir(&profile)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".pov-tmp-"))
            .count();
        assert_eq!(temps, 0);
    }

    #[test]
    fn prune_zero_is_rejected() {
        let (_tmp, mgr, _profile) = setup();
        assert!(mgr.prune(0).is_err());
    }

    #[test]
    fn prune_noop_under_limit() {
        let (_tmp, mgr, profile) = setup();
        mgr.snapshot(&profile, BackupReason::Update).unwrap();
        let result = mgr.prune(5).unwrap();
        assert_eq!(result.removed, 0);
        assert_eq!(result.kept, 1);
    }
}
