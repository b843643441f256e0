//! Ordered regex rules mapping chunk text to a [`Category`].

use handbook_core::error::{Error, Result};
use handbook_core::types::Category;
use regex::Regex;

/// Built-in rule table. Order matters: the first category with any match wins.
pub const DEFAULT_RULES: &[(Category, &[&str])] = &[
    (
        Category::Function,
        &[
            r"intrinsic\s+[A-Z][a-zA-Z]*\s*\(",
            r"procedure\s+[A-Z][a-zA-Z]*\s*\(",
            r"function\s+[A-Z][a-zA-Z]*\s*\(",
            r"(?m)^[A-Z][a-zA-Z]*\s*\([^)]*\)\s*$",
        ],
    ),
    (Category::Example, &[r"(?i)example\s+h\d+e\d+", r"(?m)^>\s+[A-Z]", r"(?m)^> "]),
    (Category::Syntax, &[r"::=", r"(?i)grammar", r"(?i)syntax", r"<[a-z-]+>"]),
    (Category::Algorithm, &[r"(?i)algorithm", r"(?i)procedure", r"(?i)method", r"(?i)step\s+\d+"]),
    (
        Category::Theory,
        &[r"(?i)theorem", r"(?i)lemma", r"(?i)proposition", r"(?i)proof", r"(?i)corollary"],
    ),
];

#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: Category,
    patterns: Vec<Regex>,
}

impl CategoryRule {
    pub fn new<S: AsRef<str>>(category: Category, patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref())
                    .map_err(|e| Error::InvalidConfig(format!("bad {category} pattern '{}': {e}", p.as_ref())))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { category, patterns })
    }

    pub fn matches(&self, content: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(content))
    }
}

/// Assigns exactly one category per text. Total and deterministic.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
}

impl Categorizer {
    pub fn new(rules: Vec<CategoryRule>) -> Self { Self { rules } }

    pub fn from_table<S: AsRef<str>>(table: &[(Category, &[S])]) -> Result<Self> {
        let rules = table.iter().map(|(c, pats)| CategoryRule::new(*c, pats)).collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    pub fn categorize(&self, content: &str) -> Category {
        self.rules
            .iter()
            .find(|r| r.matches(content))
            .map_or(Category::General, |r| r.category)
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(category, pats)| CategoryRule {
                category: *category,
                patterns: pats.iter().filter_map(|p| Regex::new(p).ok()).collect(),
            })
            .collect();
        Self::new(rules)
    }
}
