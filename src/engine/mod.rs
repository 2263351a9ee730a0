//! Merge, diff and apply engine.

pub mod apply;
pub mod atomic;
pub mod conflicts;
pub mod diff;
pub mod keys;
pub mod merge;

pub use apply::{ApplyEngine, ApplyInputs, ApplyOutcome, ApplyReport, Preview, RunMode, preview};
pub use conflicts::{ConflictSet, detect_conflicts};
pub use diff::{DiffOutcome, DiffResult, render_summary, summarize};
pub use keys::{PreferenceKey, extract_keys};
pub use merge::{MergedCandidate, merge};
