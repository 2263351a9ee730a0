//! `pov update`: refresh the base and re-apply the overlay.

use super::{OpReport, Services, apply_overlay, sync_base};
use crate::backup::BackupReason;
use crate::core::config::Config;
use crate::core::errors::Result;
use crate::engine::apply::{ApplyOutcome, RunMode};
use crate::fetch::BaseFetcher;
use crate::logger::eventlog::{EventType, LogEntry, Severity};
use crate::profile::require_profile;

/// Options for [`update`].
#[derive(Debug, Clone, Copy)]
pub struct UpdateOptions {
    pub mode: RunMode,
}

/// Fetch, back up, merge, diff and (after confirmation) write.
///
/// In [`RunMode::Unattended`] nothing reads stdin and a running browser only
/// produces a warning.
pub fn update(
    config: &Config,
    svc: &mut Services<'_>,
    fetcher: &mut dyn BaseFetcher,
    opts: UpdateOptions,
) -> Result<OpReport> {
    let mut report = OpReport::new("update");
    let mode = match opts.mode {
        RunMode::Interactive => "interactive",
        RunMode::Unattended => "unattended",
    };
    svc.record(&LogEntry::new(EventType::UpdateStart, Severity::Info).details(format!("mode={mode}")));

    sync_base(config, svc, fetcher, &mut report)?;
    let profile_dir = require_profile(&config.profile).map_err(|e| svc.fail(e))?;
    report.profile_dir = Some(profile_dir.clone());

    let outcome = apply_overlay(
        config,
        svc,
        &profile_dir,
        opts.mode,
        false,
        BackupReason::Update,
        &mut report,
    )?;
    report.declined = outcome == ApplyOutcome::Declined;
    Ok(report)
}
