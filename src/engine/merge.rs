//! Base + override concatenation.
//!
//! The candidate is always `base` byte-for-byte followed by `override`
//! byte-for-byte. Nothing is deduplicated or rewritten: when a key appears in
//! both, the browser's loader applies the later (override) assignment.

use serde::Serialize;

use super::conflicts::{ConflictSet, detect_conflicts};
use super::keys::extract_keys;

/// Ephemeral merged document plus advisory findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedCandidate {
    /// Full candidate text.
    pub text: String,
    /// Byte length of the base prefix inside `text`.
    pub base_len: usize,
    /// Keys assigned by both documents.
    pub conflicts: ConflictSet,
    /// Base had no trailing newline, so its last line runs into the override's first.
    pub joins_lines: bool,
}

impl MergedCandidate {
    /// The override part of the candidate (empty when no override was given).
    #[must_use]
    pub fn override_part(&self) -> &str {
        &self.text[self.base_len..]
    }
}

/// Concatenate `base` and an optional `overrides` document.
#[must_use]
pub fn merge(base: &str, overrides: Option<&str>) -> MergedCandidate {
    let Some(overrides) = overrides else {
        return MergedCandidate {
            text: base.to_string(),
            base_len: base.len(),
            conflicts: ConflictSet::default(),
            joins_lines: false,
        };
    };

    let conflicts = detect_conflicts(&extract_keys(base), &extract_keys(overrides));
    let joins_lines = !base.is_empty() && !overrides.is_empty() && !base.ends_with('\n');

    let mut text = String::with_capacity(base.len() + overrides.len());
    text.push_str(base);
    text.push_str(overrides);

    MergedCandidate {
        text,
        base_len: base.len(),
        conflicts,
        joins_lines,
    }
}
