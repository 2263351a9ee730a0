//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use prefs_overlay::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{PovError, Result};
pub use crate::core::prompt::{AutoAccept, AutoDecline, Confirm, StdinConfirm};

// Engine
pub use crate::engine::apply::{ApplyEngine, ApplyInputs, ApplyOutcome, ApplyReport, RunMode};
pub use crate::engine::conflicts::{ConflictSet, detect_conflicts};
pub use crate::engine::diff::{DiffOutcome, DiffResult, summarize};
pub use crate::engine::keys::{PreferenceKey, extract_keys};
pub use crate::engine::merge::{MergedCandidate, merge};

// Backups
pub use crate::backup::{BackupManager, BackupManifest, BackupReason};

// Profile
pub use crate::profile::{ProcessProbe, Sleeper, SystemProbe, ThreadSleeper, require_profile};

// Collaborators
pub use crate::fetch::{BaseFetcher, FetchOutcome, fetcher_for};
pub use crate::logger::eventlog::{EventLog, EventLogConfig};
pub use crate::notify::{NotificationEvent, NotificationManager, NotificationSink};
pub use crate::schedule::{ScheduledCommand, Scheduler, scheduler_for};

// Operations
pub use crate::ops::{OpReport, Services};
