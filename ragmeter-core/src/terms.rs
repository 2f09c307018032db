//! Key-term extraction shared by every overlap metric.
//!
//! All metrics tokenize through [`extract_key_terms`] so that term counts in
//! one metric's diagnostics are directly comparable with another's.

use std::collections::HashSet;

/// High-frequency function words excluded from term overlap.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "is", "are", "was", "were", "be", "been", "being", "this", "that", "these", "those",
    "it", "its", "they", "their", "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should", "may", "might", "can", "which", "who", "what", "where", "when", "why",
    "how",
];

/// Tokens of this many characters or fewer are never key terms.
pub const MIN_TERM_CHARS: usize = 2;

/// A set of distinct key terms.
pub type KeyTerms = HashSet<String>;

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Extract the distinct key terms of `text`.
///
/// The text is lowercased, every character that is neither alphanumeric nor
/// whitespace becomes a space, and the result is split on whitespace. Stop
/// words and tokens of at most [`MIN_TERM_CHARS`] characters are dropped.
pub fn extract_key_terms(text: &str) -> KeyTerms {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| !is_stop_word(word) && word.chars().count() > MIN_TERM_CHARS)
        .map(str::to_string)
        .collect()
}

/// Number of terms shared by both sets.
pub(crate) fn overlap(a: &KeyTerms, b: &KeyTerms) -> usize {
    a.intersection(b).count()
}

/// `numerator / denominator`, or `None` when the denominator is zero.
pub(crate) fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}
