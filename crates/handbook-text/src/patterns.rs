use regex::Regex;
use std::sync::LazyLock;

macro_rules! pattern {
    ($name:ident, $regex_str:expr) => {
        pub(crate) static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

// normalize
pattern!(RE_WHITESPACE, r"\s+");
pattern!(RE_DISALLOWED, r"[^A-Za-z0-9_\s\-+*/()\[\]{}.:;,]");
pattern!(RE_LONG_NUMBER, r"[0-9]{4,}");

// enrich
pattern!(RE_CHAPTER, r"(?i)Chapter\s+(\d+[\w\s]*)");
pattern!(RE_CHAPTER_SHORT, r"(?i)Ch\.\s*(\d+[\w\s]*)");
pattern!(RE_SECTION, r"(\d+\.\d+(?:\.\d+)?)\s+([A-Z][^.]*)");
pattern!(RE_PROMPT_LINE, r"(?m)^>\s+");
pattern!(RE_CODE_WORD, r"(?i)intrinsic|procedure|function");
pattern!(RE_EXAMPLE_TAG, r"(?i)example\s+h\d+e\d+");
pattern!(RE_PROMPT_CALL, r"(?m)^>\s+[A-Z]");

// code
pattern!(RE_CALL, r"([A-Z][a-zA-Z0-9]*)\s*\(");
pattern!(RE_INTRINSIC_DEF, r"(?i)intrinsic\s+([A-Z][a-zA-Z]*)\s*\(([^)]*)\)\s*->?\s*([^{]*)\s*\{([^}]*)\}");
pattern!(RE_EXAMPLE_CALL, r">\s+([A-Z][a-zA-Z]*)\s*\([^)]*\)");
pattern!(RE_CODE_BLOCK, r"(?m)```magma[\s\S]*?```|>.*?$");
pattern!(RE_PROMPT_PREFIX, r"(?m)^>\s*");
pattern!(RE_LOOP, r"for|while");
pattern!(RE_DEFINITION, r"function|procedure");
pattern!(RE_HEAVY_CALL, r"Factorization|IsIrreducible|GaloisGroup");

pub(crate) fn is_match(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(text))
}

pub(crate) fn replace_all(re: &LazyLock<Option<Regex>>, text: &str, with: &str) -> String {
    match re.as_ref() {
        Some(r) => r.replace_all(text, with).into_owned(),
        None => text.to_string(),
    }
}
