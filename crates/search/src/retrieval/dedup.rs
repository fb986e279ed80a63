//! Near-duplicate suppression
//!
//! Overlapping chunks and repeated boilerplate produce hits that start with
//! the same text. Results are keyed on a normalized prefix of the content
//! shown to the reader (the raw table for tables) and only the first
//! (highest scoring) hit per key is kept.

use ipdf_common::models::SearchResult;
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

/// First `prefix_chars` characters, whitespace collapsed and lowercased
pub fn dedup_key(content: &str, prefix_chars: usize) -> String {
    let collapsed = whitespace().replace_all(content.trim(), " ");
    collapsed
        .chars()
        .take(prefix_chars)
        .collect::<String>()
        .to_lowercase()
}

/// Keep the first result for each key, preserving order
pub fn deduplicate(results: Vec<SearchResult>, prefix_chars: usize) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(dedup_key(r.payload.display_content(), prefix_chars)))
        .collect()
}
