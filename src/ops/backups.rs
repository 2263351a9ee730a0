//! `pov backups list | restore | prune`.

use std::fmt::Write as _;

use super::{OpReport, Services, backup_manager, record_snapshot};
use crate::backup::{BackupInventory, BackupReason, PruneResult};
use crate::core::config::Config;
use crate::core::errors::{PovError, Result};
use crate::logger::eventlog::{EventType, LogEntry, Severity};
use crate::notify::NotificationEvent;
use crate::profile::require_profile;

pub fn list_backups(config: &Config) -> Result<BackupInventory> {
    backup_manager(config).inventory()
}

/// Restore backup `id` (the newest one when `None`) into the profile.
///
/// The current state is snapshotted first so the restore itself can be
/// undone.
pub fn restore_backup(
    config: &Config,
    svc: &mut Services<'_>,
    id: Option<&str>,
) -> Result<OpReport> {
    let mut report = OpReport::new("restore");
    let backups = backup_manager(config);
    let profile_dir = require_profile(&config.profile).map_err(|e| svc.fail(e))?;
    report.profile_dir = Some(profile_dir.clone());

    let target = match id {
        Some(id) => backups.load(id),
        None => backups.latest().and_then(|latest| {
            latest.ok_or_else(|| PovError::BackupNotFound {
                id: "latest".to_string(),
            })
        }),
    }
    .map_err(|e| svc.fail(e))?;

    let prompt = format!(
        "Restore backup {} ({} backup from {}) into {}?",
        target.id,
        target.reason,
        target.created.format("%Y-%m-%d %H:%M:%S UTC"),
        profile_dir.display()
    );
    if !svc.confirm.confirm(&prompt) {
        svc.record(&LogEntry::new(EventType::Declined, Severity::Info).backup_id(&target.id));
        svc.notify(&NotificationEvent::Declined);
        report.declined = true;
        return Ok(report);
    }

    let _ = svc.wait_for_browser(config);
    let snap = backups
        .snapshot(&profile_dir, BackupReason::Restore)
        .map_err(|e| svc.fail(e))?;
    record_snapshot(svc, &snap, &mut report);
    report.backup = Some(snap);

    let restored = backups
        .restore(&target, &profile_dir, &mut *svc.confirm)
        .map_err(|e| svc.fail(e))?;
    svc.record(
        &LogEntry::new(EventType::BackupRestored, Severity::Info)
            .backup_id(&restored.backup_id)
            .path(&profile_dir)
            .details(format!(
                "restored={} declined={} deleted={}",
                restored.restored.join(","),
                restored.declined.join(","),
                restored.deleted.join(",")
            )),
    );
    report.step_ok(format!("Restored profile from backup {}", target.id));
    report.restore = Some(restored);
    Ok(report)
}

/// Prune to `keep` backups (configured retention when `None`).
pub fn prune_backups(
    config: &Config,
    svc: &mut Services<'_>,
    keep: Option<usize>,
) -> Result<PruneResult> {
    let keep = keep.unwrap_or(config.engine.max_backups);
    let result = backup_manager(config)
        .prune(keep)
        .map_err(|e| svc.fail(e))?;
    if result.removed > 0 {
        svc.record(
            &LogEntry::new(EventType::BackupPruned, Severity::Info)
                .details(result.removed_ids.join(",")),
        );
    }
    Ok(result)
}

/// Format a backup inventory as a table, newest first.
#[must_use]
pub fn format_backup_list(inventory: &BackupInventory) -> String {
    let mut out = String::new();

    if inventory.backups.is_empty() {
        let _ = writeln!(out, "No backups found.");
        let _ = writeln!(out, "Backup directory: {}", inventory.backup_dir.display());
        return out;
    }

    let _ = writeln!(
        out,
        "{:<24} {:<10} {:<20} FILES",
        "ID", "REASON", "CREATED (UTC)"
    );
    let _ = writeln!(out, "{}", "-".repeat(72));
    for manifest in &inventory.backups {
        let _ = writeln!(
            out,
            "{:<24} {:<10} {:<20} {}",
            manifest.id,
            manifest.reason.as_str(),
            manifest.created.format("%Y-%m-%d %H:%M:%S"),
            manifest.file_names().join(", ")
        );
    }
    let _ = writeln!(
        out,
        "\n{} backup(s) in {}",
        inventory.backups.len(),
        inventory.backup_dir.display()
    );
    out
}

/// Format a prune result for terminal output.
#[must_use]
pub fn format_prune_result(result: &PruneResult) -> String {
    let mut out = String::new();
    if result.removed == 0 {
        let _ = writeln!(out, "No backups needed pruning ({} total).", result.kept);
    } else {
        for id in &result.removed_ids {
            let _ = writeln!(out, "  Removed backup {id}");
        }
        let _ = writeln!(
            out,
            "Pruned {} backup(s). {} remaining.",
            result.removed, result.kept
        );
    }
    out
}
