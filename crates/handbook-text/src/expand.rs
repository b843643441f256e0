//! Synonym expansion for algebra and coding-theory queries.
//!
//! Expands queries with related terms to improve lexical recall, e.g.
//! "hamming" -> "hamming error correction linear code generator".

use std::collections::HashMap;

pub const DEFAULT_SYNONYMS: &[(&str, &[&str])] = &[
    // coding theory
    ("hamming", &["error", "correction", "linear", "code", "generator"]),
    ("reed", &["solomon", "polynomial", "evaluation", "error"]),
    ("bch", &["cyclic", "polynomial", "primitive", "code"]),
    ("code", &["algorithm", "implementation", "function", "linear", "block"]),
    ("generator", &["matrix", "basis", "span", "linear"]),
    ("matrix", &["linear", "transformation", "operator", "generator"]),
    // group theory
    ("group", &["algebra", "structure", "set", "permutation", "symmetric"]),
    ("permutation", &["symmetric", "alternating", "cycle", "transposition"]),
    ("sylow", &["subgroup", "theorem", "prime", "power"]),
    // fields
    ("field", &["ring", "domain", "arithmetic", "finite", "galois"]),
    ("finite", &["field", "galois", "primitive", "polynomial"]),
    ("polynomial", &["expression", "equation", "formula", "irreducible"]),
    // elliptic curves
    ("elliptic", &["curve", "point", "addition", "weierstrass", "jacobian"]),
    ("curve", &["elliptic", "algebraic", "geometry", "point", "rational"]),
];

#[derive(Debug, Clone)]
pub struct QueryExpander {
    table: HashMap<String, Vec<String>>,
}

impl QueryExpander {
    /// Keys are matched case-insensitively against whitespace-separated tokens.
    pub fn new<I, K, V, S>(table: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = table
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_lowercase(), v.into_iter().map(Into::into).collect()))
            .collect();
        Self { table }
    }

    /// Append the synonyms of every known token to the query. The input is
    /// always a literal prefix of the output; a token repeated in the query
    /// contributes its synonyms once per occurrence.
    pub fn expand(&self, query: &str) -> String {
        let mut expanded = query.to_string();
        for word in query.to_lowercase().split_whitespace() {
            if let Some(synonyms) = self.table.get(word).filter(|s| !s.is_empty()) {
                expanded.push(' ');
                expanded.push_str(&synonyms.join(" "));
            }
        }
        expanded
    }

    pub fn len(&self) -> usize { self.table.len() }

    pub fn is_empty(&self) -> bool { self.table.is_empty() }
}

impl Default for QueryExpander {
    fn default() -> Self { Self::new(DEFAULT_SYNONYMS.iter().map(|(k, v)| (*k, v.iter().copied()))) }
}
