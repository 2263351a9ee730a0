//! `pov install`: fetch the base, apply the overlay, schedule updates.

use super::{OpReport, ScheduleReport, Services, apply_overlay, sync_base};
use crate::backup::BackupReason;
use crate::core::config::Config;
use crate::core::errors::Result;
use crate::engine::apply::{ApplyOutcome, RunMode};
use crate::fetch::BaseFetcher;
use crate::logger::eventlog::{EventType, LogEntry, Severity};
use crate::notify::NotificationEvent;
use crate::profile::require_profile;

/// Options for [`install`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Apply without asking.
    pub assume_yes: bool,
    /// Skip timer registration regardless of `schedule.enabled`.
    pub no_schedule: bool,
}

/// First-time setup.
///
/// A scheduler failure after the overlay was written is recorded as a failed
/// step; the written configuration stays in place.
pub fn install(
    config: &Config,
    svc: &mut Services<'_>,
    fetcher: &mut dyn BaseFetcher,
    opts: InstallOptions,
) -> Result<OpReport> {
    let mut report = OpReport::new("install");
    svc.record(&LogEntry::new(EventType::InstallStart, Severity::Info));

    sync_base(config, svc, fetcher, &mut report)?;
    let profile_dir = require_profile(&config.profile).map_err(|e| svc.fail(e))?;
    report.step_ok(format!("Using profile {}", profile_dir.display()));
    report.profile_dir = Some(profile_dir.clone());

    let outcome = apply_overlay(
        config,
        svc,
        &profile_dir,
        RunMode::Interactive,
        opts.assume_yes,
        BackupReason::Install,
        &mut report,
    )?;
    if outcome == ApplyOutcome::Declined {
        report.declined = true;
        report.step_skip("Scheduling skipped (nothing installed)");
        return Ok(report);
    }

    if opts.no_schedule || !config.schedule.enabled {
        report.step_skip("Scheduling disabled");
        return Ok(report);
    }
    let Some(scheduler) = svc.scheduler else {
        report.step_skip("No scheduler backend available");
        return Ok(report);
    };

    let mut schedule = ScheduleReport {
        backend: scheduler.name(),
        action: "register",
        definition: scheduler.definition_path(),
        ok: true,
        error: None,
    };
    match scheduler.register() {
        Ok(()) => {
            svc.record(
                &LogEntry::new(EventType::Scheduled, Severity::Info)
                    .path(&schedule.definition)
                    .details(format!("backend={}", schedule.backend)),
            );
            report.step_ok(format!(
                "Scheduled periodic updates via {}",
                schedule.backend
            ));
        }
        Err(e) => {
            svc.record(&LogEntry::from_error(EventType::ScheduleFailed, &e));
            svc.notify(&NotificationEvent::ScheduleFailed {
                message: e.to_string(),
            });
            report.step_fail(
                format!("Schedule periodic updates via {}", schedule.backend),
                e.to_string(),
            );
            report
                .follow_up
                .push("Run `pov update` periodically, or fix the scheduler and re-run `pov install`.".to_string());
            schedule.ok = false;
            schedule.error = Some(e.to_string());
        }
    }
    report.schedule = Some(schedule);
    Ok(report)
}
