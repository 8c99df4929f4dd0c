//! Tokenization and the negation lexicon used by the negation rule.

use std::collections::HashSet;

/// Markers that make a statement read as a denial of its counterpart.
pub const NEGATION_MARKERS: [&str; 6] = ["not", "never", "no", "false", "deny", "reject"];

/// Lowercase and split on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

pub fn is_negation_marker(token: &str) -> bool {
    NEGATION_MARKERS.contains(&token)
}

pub fn contains_negation(tokens: &[String]) -> bool {
    tokens.iter().any(|t| is_negation_marker(t))
}

/// Tokens at least `min_len` characters long that are not negation markers.
pub fn significant_tokens(tokens: &[String], min_len: usize) -> HashSet<&str> {
    tokens
        .iter()
        .filter(|t| t.chars().count() >= min_len && !is_negation_marker(t))
        .map(String::as_str)
        .collect()
}

/// Significant vocabulary shared by two token lists, sorted.
pub fn shared_vocabulary(a: &[String], b: &[String], min_len: usize) -> Vec<String> {
    let left = significant_tokens(a, min_len);
    let right = significant_tokens(b, min_len);
    let mut shared: Vec<String> = left.intersection(&right).map(|t| t.to_string()).collect();
    shared.sort();
    shared
}
