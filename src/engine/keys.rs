//! Preference-key extraction from configuration text.
//!
//! An assignment line starts (after optional indentation) with the
//! `user_pref` token, an opening parenthesis, and a quoted key as the first
//! argument: `user_pref("browser.startup.page", 0);`. Every other line is
//! opaque to the engine.

/// Declaration token that opens a preference-assignment line.
pub const DECLARATION_TOKEN: &str = "user_pref";

/// Key of a single preference assignment. Compared by exact text equality.
pub type PreferenceKey = String;

/// Extract the key from one line, or `None` if the line is not an assignment.
#[must_use]
pub fn parse_assignment(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix(DECLARATION_TOKEN)?;
    let rest = rest.trim_start().strip_prefix('(')?;
    let rest = rest.trim_start();

    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &rest[quote.len_utf8()..];
    let end = body.find(quote)?;
    let key = &body[..end];
    if key.is_empty() {
        return None;
    }

    // The key must be followed by the argument separator.
    body[end + quote.len_utf8()..]
        .trim_start()
        .starts_with(',')
        .then_some(key)
}

/// True when `line` is a preference-assignment line.
#[must_use]
pub fn is_assignment(line: &str) -> bool {
    parse_assignment(line).is_some()
}

/// Ordered keys of every assignment line in `text`, duplicates included.
#[must_use]
pub fn extract_keys(text: &str) -> Vec<PreferenceKey> {
    text.lines()
        .filter_map(parse_assignment)
        .map(str::to_string)
        .collect()
}
