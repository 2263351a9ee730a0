//! Crash-safe file replacement: write a sibling temp file, fsync, rename.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::random;

use crate::core::errors::{PovError, Result};

/// Sibling temp file that is removed on drop unless it was renamed into place.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn create(target: &Path) -> std::io::Result<(Self, File)> {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let name = target
            .file_name()
            .map_or_else(|| "pov".into(), |n| n.to_string_lossy().into_owned());
        let pid = std::process::id();

        for _attempt in 0..16 {
            let nonce = random::<u64>();
            let path = dir.join(format!(".{name}.pov-tmp-{pid}-{nonce:016x}"));
            let mut opts = OpenOptions::new();
            opts.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt as _;
                opts.mode(0o644);
            }
            match opts.open(&path) {
                Ok(file) => return Ok((Self { path, armed: true }, file)),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err),
            }
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "failed to allocate a unique temp file after 16 attempts",
        ))
    }

    fn persist(mut self, target: &Path) -> std::io::Result<()> {
        fs::rename(&self.path, target)?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// A fully written and synced temp file waiting to be renamed over its
/// target. Dropping it without [`StagedFile::commit`] removes the temp file.
pub struct StagedFile {
    guard: TempFileGuard,
    target: PathBuf,
}

impl StagedFile {
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename into place, then sync the parent directory so the rename
    /// survives a crash.
    pub fn commit(self) -> Result<()> {
        let Self { guard, target } = self;
        guard
            .persist(&target)
            .map_err(|source| PovError::AtomicWrite {
                path: target.clone(),
                source,
            })?;
        sync_parent(&target);
        Ok(())
    }
}

/// Write `contents` next to `target` without touching `target` yet.
pub fn stage_write(target: &Path, contents: &[u8]) -> Result<StagedFile> {
    let wrap = |source| PovError::AtomicWrite {
        path: target.to_path_buf(),
        source,
    };

    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(wrap)?;
    }

    let (guard, mut file) = TempFileGuard::create(target).map_err(wrap)?;
    file.write_all(contents).map_err(wrap)?;
    file.sync_all().map_err(wrap)?;
    drop(file);
    Ok(StagedFile {
        guard,
        target: target.to_path_buf(),
    })
}

/// Replace `target` with `contents` atomically.
///
/// Readers observe either the previous file or the complete new one. On any
/// failure the previous file is untouched and no temp file is left behind.
pub fn atomic_write(target: &Path, contents: &[u8]) -> Result<()> {
    stage_write(target, contents)?.commit()
}

/// Best effort: the data is already in place once the rename succeeded.
#[cfg(unix)]
fn sync_parent(target: &Path) {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent(_target: &Path) {}
