//! Word trigram similarity in the style of `pg_trgm`: each lower-cased
//! alphanumeric word is padded with two leading and one trailing blank.

use std::collections::HashSet;

pub fn trigrams(s: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    for word in s.to_lowercase().split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let padded: Vec<char> = "  ".chars().chain(word.chars()).chain(" ".chars()).collect();
        for w in padded.windows(3) {
            out.insert(w.iter().collect());
        }
    }
    out
}

/// Shared trigrams over the union; 0 when both sides are empty.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let (ta, tb) = (trigrams(a), trigrams(b));
    let union = ta.union(&tb).count();
    if union == 0 { return 0.0; }
    ta.intersection(&tb).count() as f64 / union as f64
}
