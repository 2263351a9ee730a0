//! Property-based tests for the merge, conflict and diff-summary rules.

use std::collections::BTreeSet;

use proptest::prelude::*;

use prefs_overlay::engine::diff::{DISPLAY_LIMIT, NO_CHANGES_MESSAGE};
use prefs_overlay::engine::{DiffOutcome, extract_keys, merge, render_summary, summarize};

// ──────────────────── strategies ────────────────────

fn arb_key() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(\\.[a-z0-9]{1,6}){0,2}"
}

fn arb_keys(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(arb_key(), 0..max).prop_map(|s| s.into_iter().collect())
}

fn arb_value() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("true".to_string()),
        Just("false".to_string()),
        (0i32..1000).prop_map(|n| n.to_string()),
        "[a-z ]{0,8}".prop_map(|s| format!("\"{s}\"")),
    ]
}

fn render(keys: &[String], value: &str) -> String {
    keys.iter()
        .map(|k| format!("user_pref(\"{k}\", {value});\n"))
        .collect()
}

// ──────────────────── properties ────────────────────

proptest! {
    #[test]
    fn candidate_is_base_then_override_verbatim(base in ".{0,200}", overrides in ".{0,200}") {
        let candidate = merge(&base, Some(&overrides));
        prop_assert_eq!(&candidate.text, &format!("{base}{overrides}"));
        prop_assert_eq!(candidate.override_part(), overrides.as_str());
    }

    #[test]
    fn absent_override_yields_base(base in ".{0,200}") {
        let candidate = merge(&base, None);
        prop_assert_eq!(candidate.text, base);
        prop_assert!(candidate.conflicts.is_empty());
    }

    #[test]
    fn disjoint_keys_never_conflict(keys in arb_keys(20), value in arb_value()) {
        let (left, right) = keys.split_at(keys.len() / 2);
        let candidate = merge(&render(left, &value), Some(&render(right, &value)));
        prop_assert!(candidate.conflicts.is_empty());
    }

    #[test]
    fn shared_key_is_reported_once_and_both_lines_kept(
        keys in arb_keys(10),
        shared in arb_key(),
        base_value in arb_value(),
        override_value in arb_value(),
    ) {
        let others: Vec<String> = keys.into_iter().filter(|k| *k != shared).collect();
        let mut base_keys = others.clone();
        base_keys.push(shared.clone());
        let base = render(&base_keys, &base_value);
        let overrides = render(std::slice::from_ref(&shared), &override_value);

        let candidate = merge(&base, Some(&overrides));
        prop_assert_eq!(candidate.conflicts.keys(), std::slice::from_ref(&shared));

        let base_line = format!("user_pref(\"{shared}\", {base_value});");
        let override_line = format!("user_pref(\"{shared}\", {override_value});");
        let base_at = candidate.text.find(&base_line);
        let override_at = candidate.text.rfind(&override_line);
        prop_assert!(base_at.is_some() && override_at.is_some());
        prop_assert!(base_at < override_at);
    }

    #[test]
    fn extracted_keys_follow_document_order(keys in arb_keys(20)) {
        let text = render(&keys, "1");
        prop_assert_eq!(extract_keys(&text), keys);
    }

    #[test]
    fn summary_lists_at_most_the_display_limit(keys in prop::collection::vec(arb_key(), 0..12)) {
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let summary = render_summary(&refs);
        if refs.is_empty() {
            prop_assert_eq!(summary, NO_CHANGES_MESSAGE);
        } else if refs.len() <= DISPLAY_LIMIT {
            prop_assert_eq!(summary, refs.join(", "));
        } else {
            let expected = format!(
                "{} (+{} more)",
                refs[..DISPLAY_LIMIT].join(", "),
                refs.len() - DISPLAY_LIMIT
            );
            prop_assert_eq!(summary, expected);
        }
    }

    #[test]
    fn identical_documents_have_no_changes(keys in arb_keys(15)) {
        let text = render(&keys, "true");
        match summarize(Some(&text), &text) {
            DiffOutcome::Compared(result) => prop_assert!(result.changes.is_empty()),
            DiffOutcome::NoPrevious => prop_assert!(false, "expected a comparison"),
        }
    }

    #[test]
    fn appended_keys_show_up_as_added(old_keys in arb_keys(10), new_keys in arb_keys(10)) {
        let fresh: Vec<String> = new_keys
            .into_iter()
            .filter(|k| !old_keys.contains(k))
            .collect();
        let old = render(&old_keys, "1");
        let new = format!("{old}{}", render(&fresh, "1"));

        let outcome = summarize(Some(&old), &new);
        let result = outcome.result().expect("compared");
        let added: BTreeSet<&str> = result.added_keys().into_iter().collect();
        let expected: BTreeSet<&str> = fresh.iter().map(String::as_str).collect();
        prop_assert_eq!(added, expected);
        prop_assert!(result.removed_keys().is_empty());
    }
}
