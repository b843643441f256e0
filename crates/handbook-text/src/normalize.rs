use crate::patterns::{replace_all, RE_DISALLOWED, RE_LONG_NUMBER, RE_WHITESPACE};

/// Normalize chunk text for embedding and lexical indexing: collapse
/// whitespace, blank out symbols and runs of four or more digits.
pub fn clean_text(content: &str) -> String {
    let s = replace_all(&RE_WHITESPACE, content, " ");
    let s = replace_all(&RE_DISALLOWED, &s, " ");
    let s = replace_all(&RE_LONG_NUMBER, &s, " ");
    s.trim().to_string()
}

/// Prefix of at most `max` characters, cut on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
