//! Line-level diff between the live file and a candidate, reduced to
//! preference keys, plus the bounded one-line summary shown to users.

use std::collections::HashSet;
use std::fmt;

use diffy::Line;
use serde::Serialize;

use super::keys::{PreferenceKey, parse_assignment};

/// Number of keys named in a summary before the remainder is counted.
pub const DISPLAY_LIMIT: usize = 3;

/// Summary rendered when no assignment line was added.
pub const NO_CHANGES_MESSAGE: &str = "no preferences changed";

/// Summary rendered when there is no previous live file to compare with.
pub const NO_PREVIOUS_MESSAGE: &str = "no previous configuration; all entries are new";

/// Direction of a changed assignment line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => f.write_str("added"),
            Self::Removed => f.write_str("removed"),
        }
    }
}

/// One changed assignment line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub key: PreferenceKey,
}

/// Ordered assignment-line changes between two documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub changes: Vec<Change>,
}

impl DiffResult {
    /// Added keys in first-appearance order, each named once.
    #[must_use]
    pub fn added_keys(&self) -> Vec<&str> {
        self.keys_of(ChangeKind::Added)
    }

    /// Removed keys in first-appearance order, each named once.
    #[must_use]
    pub fn removed_keys(&self) -> Vec<&str> {
        self.keys_of(ChangeKind::Removed)
    }

    fn keys_of(&self, kind: ChangeKind) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.changes
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.key.as_str())
            .filter(|k| seen.insert(*k))
            .collect()
    }
}

/// Outcome of comparing a candidate against the live file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DiffOutcome {
    /// There was no live file; everything in the candidate is new.
    NoPrevious,
    Compared(DiffResult),
}

impl DiffOutcome {
    /// User-facing summary line; only added keys are named.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::NoPrevious => NO_PREVIOUS_MESSAGE.to_string(),
            Self::Compared(result) => render_summary(&result.added_keys()),
        }
    }

    /// The comparison result, if there was something to compare against.
    #[must_use]
    pub fn result(&self) -> Option<&DiffResult> {
        match self {
            Self::NoPrevious => None,
            Self::Compared(result) => Some(result),
        }
    }
}

/// Compare `old` (the live file, if any) with `new` (the candidate).
#[must_use]
pub fn summarize(old: Option<&str>, new: &str) -> DiffOutcome {
    let Some(old) = old else {
        return DiffOutcome::NoPrevious;
    };

    let patch = diffy::create_patch(old, new);
    let mut changes = Vec::new();
    for hunk in patch.hunks() {
        for line in hunk.lines() {
            let (kind, text) = match line {
                Line::Insert(text) => (ChangeKind::Added, *text),
                Line::Delete(text) => (ChangeKind::Removed, *text),
                Line::Context(_) => continue,
            };
            if let Some(key) = parse_assignment(text) {
                changes.push(Change {
                    kind,
                    key: key.to_string(),
                });
            }
        }
    }
    DiffOutcome::Compared(DiffResult { changes })
}

/// Render `keys` as a bounded, comma-joined list.
///
/// `[]` → [`NO_CHANGES_MESSAGE`]; up to [`DISPLAY_LIMIT`] keys are listed in
/// full; beyond that the first [`DISPLAY_LIMIT`] are listed followed by
/// `(+N more)`.
#[must_use]
pub fn render_summary(keys: &[&str]) -> String {
    if keys.is_empty() {
        return NO_CHANGES_MESSAGE.to_string();
    }
    if keys.len() <= DISPLAY_LIMIT {
        return keys.join(", ");
    }
    format!(
        "{} (+{} more)",
        keys[..DISPLAY_LIMIT].join(", "),
        keys.len() - DISPLAY_LIMIT
    )
}
