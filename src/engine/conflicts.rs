//! Advisory conflict detection between base and override key sets.

use std::collections::BTreeSet;

use serde::Serialize;

use super::keys::PreferenceKey;

/// Keys assigned by both the base and the override document.
///
/// Purely informational: the override is appended after the base regardless,
/// so its assignment wins when the browser loads the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictSet {
    keys: Vec<PreferenceKey>,
}

impl ConflictSet {
    /// Conflicting keys, deduplicated and sorted lexicographically.
    #[must_use]
    pub fn keys(&self) -> &[PreferenceKey] {
        &self.keys
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.binary_search_by(|k| k.as_str().cmp(key)).is_ok()
    }
}

/// Intersection of `base` and `overrides`.
#[must_use]
pub fn detect_conflicts(base: &[PreferenceKey], overrides: &[PreferenceKey]) -> ConflictSet {
    let base: BTreeSet<&str> = base.iter().map(String::as_str).collect();
    let overrides: BTreeSet<&str> = overrides.iter().map(String::as_str).collect();
    ConflictSet {
        keys: base
            .intersection(&overrides)
            .map(|k| (*k).to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<PreferenceKey> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn disjoint_sets_have_no_conflicts() {
        let set = detect_conflicts(&keys(&["a", "b"]), &keys(&["c"]));
        assert!(set.is_empty());
    }

    #[test]
    fn intersection_is_sorted_and_deduplicated() {
        let set = detect_conflicts(
            &keys(&["z.last", "a.first", "m.mid", "a.first"]),
            &keys(&["m.mid", "z.last", "z.last", "q.only"]),
        );
        assert_eq!(set.keys(), ["m.mid", "z.last"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("z.last"));
        assert!(!set.contains("a.first"));
    }

    #[test]
    fn empty_override_yields_empty_set() {
        assert!(detect_conflicts(&keys(&["a"]), &[]).is_empty());
    }
}
