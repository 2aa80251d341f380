//! Isolate the final answer in raw model output.

use regex::Regex;
use std::sync::LazyLock;

static ANSWER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)Answer\s*:\s*(.*)").ok());

/// Return the text after the first `Answer:` marker, up to the end of its line.
///
/// Output without a marker is returned whole, trimmed.
pub fn extract_answer(text: &str) -> String {
    match ANSWER_PATTERN.as_ref() {
        Some(pattern) => extract_answer_with(text, pattern),
        None => text.trim().to_string(),
    }
}

/// Like [`extract_answer`] with a caller-supplied pattern.
///
/// The first capture group holds the answer; only its first line is kept.
pub fn extract_answer_with(text: &str, pattern: &Regex) -> String {
    let Some(captured) = pattern.captures(text).and_then(|caps| caps.get(1)) else {
        return text.trim().to_string();
    };

    captured
        .as_str()
        .trim()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
