//! `pov uninstall`: put the profile back the way install found it.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::{OpReport, ScheduleReport, Services, backup_manager, record_snapshot};
use crate::backup::{BackupManifest, BackupReason};
use crate::core::config::Config;
use crate::core::errors::{PovError, Result};
use crate::core::prompt::{AutoDecline, Confirm};
use crate::logger::eventlog::{EventType, LogEntry, Severity};
use crate::notify::NotificationEvent;
use crate::profile::require_profile;

/// Options for [`uninstall`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallOptions {
    /// Skip the top-level confirmation. The sensitive file still defaults to
    /// "keep current".
    pub assume_yes: bool,
    /// Also remove fetched data and backups.
    pub purge: bool,
}

/// Restore the pre-install backup (falling back to the last backup
/// pointer), then remove the update timer.
pub fn uninstall(
    config: &Config,
    svc: &mut Services<'_>,
    opts: UninstallOptions,
) -> Result<OpReport> {
    let mut report = OpReport::new("uninstall");
    svc.record(&LogEntry::new(EventType::UninstallStart, Severity::Info));

    let profile_dir = require_profile(&config.profile).map_err(|e| svc.fail(e))?;
    report.profile_dir = Some(profile_dir.clone());
    let backups = backup_manager(config);

    let target = restore_target(config).map_err(|e| svc.fail(e))?;
    if !opts.assume_yes {
        let prompt = format!(
            "Remove the preference overlay from {} and restore backup {} ({})?",
            profile_dir.display(),
            target.id,
            target.created.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if !svc.confirm.confirm(&prompt) {
            svc.record(&LogEntry::new(EventType::Declined, Severity::Info).path(&profile_dir));
            svc.notify(&NotificationEvent::Declined);
            report.declined = true;
            return Ok(report);
        }
    }

    let _ = svc.wait_for_browser(config);

    let snap = backups
        .snapshot(&profile_dir, BackupReason::Uninstall)
        .map_err(|e| svc.fail(e))?;
    record_snapshot(svc, &snap, &mut report);
    report.backup = Some(snap);

    let mut decline = AutoDecline;
    let sensitive: &mut dyn Confirm = if opts.assume_yes {
        &mut decline
    } else {
        &mut *svc.confirm
    };
    let restored = backups
        .restore(&target, &profile_dir, sensitive)
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

    unschedule(svc, &mut report);

    if opts.purge {
        purge_data(config, &mut report);
    }
    Ok(report)
}

/// The install baseline, else whatever the last-backup pointer names.
///
/// Re-running install snapshots an already overlaid profile, so the newest
/// install backup is not necessarily the pre-install state.
fn restore_target(config: &Config) -> Result<BackupManifest> {
    let backups = backup_manager(config);
    if let Some(manifest) = backups.install_baseline()? {
        return Ok(manifest);
    }
    match backups.read_last()? {
        Some(id) => backups.load(&id),
        None => Err(PovError::BackupNotFound {
            id: "install".to_string(),
        }),
    }
}

fn unschedule(svc: &mut Services<'_>, report: &mut OpReport) {
    let Some(scheduler) = svc.scheduler else {
        report.step_skip("No scheduler backend to clean up");
        return;
    };
    let mut schedule = ScheduleReport {
        backend: scheduler.name(),
        action: "unregister",
        definition: scheduler.definition_path(),
        ok: true,
        error: None,
    };
    match scheduler.unregister() {
        Ok(()) => {
            svc.record(
                &LogEntry::new(EventType::Unscheduled, Severity::Info)
                    .path(&schedule.definition),
            );
            report.step_ok(format!("Removed {} update timer", schedule.backend));
        }
        Err(e) => {
            svc.record(&LogEntry::from_error(EventType::ScheduleFailed, &e));
            report.step_fail(
                format!("Remove {} update timer", schedule.backend),
                e.to_string(),
            );
            schedule.ok = false;
            schedule.error = Some(e.to_string());
        }
    }
    report.schedule = Some(schedule);
}

/// Remove fetched state and backups. The override file is user-authored and
/// the event log is still open, so both stay.
fn purge_data(config: &Config, report: &mut OpReport) {
    let targets: [&Path; 4] = [
        &config.paths.base_file,
        &config.paths.fetch_state,
        &config.source.checkout_dir,
        &config.paths.backup_dir,
    ];
    for path in targets {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => report.step_ok(format!("Removed {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => report.step_fail(format!("Remove {}", path.display()), e.to_string()),
        }
    }
}
