//! Heuristics over handbook code: function names, definitions, complexity,
//! and example extraction from retrieved chunks.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use handbook_core::error::Error;
use handbook_core::types::{ChunkMetadata, FunctionDoc};
use serde::{Deserialize, Serialize};

use crate::normalize::truncate_chars;
use crate::patterns::{
    is_match, replace_all, RE_CALL, RE_CODE_BLOCK, RE_DEFINITION, RE_EXAMPLE_CALL, RE_HEAVY_CALL,
    RE_INTRINSIC_DEF, RE_LOOP, RE_PROMPT_PREFIX,
};

const DEFAULT_TITLE: &str = "MAGMA Example";
const EXPLANATION_CHARS: usize = 200;
const DOC_SNIPPET_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Basic,
    Intermediate,
    Advanced,
}

impl Complexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Basic => "basic",
            Complexity::Intermediate => "intermediate",
            Complexity::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Complexity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Complexity::Basic),
            "intermediate" => Ok(Complexity::Intermediate),
            "advanced" => Ok(Complexity::Advanced),
            other => Err(Error::InvalidArgument(format!("unknown complexity '{other}'"))),
        }
    }
}

/// `all`, or a single complexity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ComplexityFilter {
    #[default]
    All,
    Only(Complexity),
}

impl ComplexityFilter {
    pub fn admits(self, c: Complexity) -> bool {
        match self {
            ComplexityFilter::All => true,
            ComplexityFilter::Only(want) => want == c,
        }
    }
}

impl FromStr for ComplexityFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") { return Ok(ComplexityFilter::All); }
        s.parse().map(ComplexityFilter::Only)
    }
}

impl TryFrom<String> for ComplexityFilter {
    type Error = Error;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<ComplexityFilter> for String {
    fn from(f: ComplexityFilter) -> Self {
        match f {
            ComplexityFilter::All => "all".to_string(),
            ComplexityFilter::Only(c) => c.to_string(),
        }
    }
}

/// A code example pulled out of a retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub title: String,
    pub code: String,
    pub explanation: String,
    pub complexity: Complexity,
    pub source: String,
    pub page: u32,
}

/// A function definition found in handbook text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name: String,
    pub signature: String,
    pub description: String,
    pub category: String,
    pub examples: Vec<String>,
}

impl FunctionDefinition {
    pub fn into_doc(self, chapter: Option<String>) -> FunctionDoc {
        FunctionDoc {
            function_name: self.name,
            function_signature: Some(self.signature),
            description: Some(self.description),
            category: Some(self.category),
            chapter,
            usage_examples: self.examples,
            related_functions: Vec::new(),
            similarity_score: None,
        }
    }
}

/// Capitalised identifiers followed by `(`, unique, in first-seen order.
pub fn extract_functions(code: &str) -> Vec<String> {
    let Some(re) = RE_CALL.as_ref() else { return Vec::new() };
    let mut seen = HashSet::new();
    re.captures_iter(code)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// `intrinsic Name(args) -> T { description }` blocks, then `> Name(...)`
/// calls seen in examples. One entry per name; the first occurrence wins.
pub fn extract_function_definitions(content: &str) -> Vec<FunctionDefinition> {
    let mut out: Vec<FunctionDefinition> = Vec::new();
    let mut seen = HashSet::new();

    if let Some(re) = RE_INTRINSIC_DEF.as_ref() {
        for c in re.captures_iter(content) {
            let name = c[1].to_string();
            if !seen.insert(name.clone()) { continue; }
            out.push(FunctionDefinition {
                signature: format!("{}({})", name, &c[2]),
                description: c[4].trim().to_string(),
                category: "intrinsic".to_string(),
                examples: Vec::new(),
                name,
            });
        }
    }

    if let Some(re) = RE_EXAMPLE_CALL.as_ref() {
        for c in re.captures_iter(content) {
            let name = c[1].to_string();
            if !seen.insert(name.clone()) { continue; }
            let full = c[0].to_string();
            out.push(FunctionDefinition {
                signature: full.replacen("> ", "", 1),
                description: "Function found in examples".to_string(),
                category: "function".to_string(),
                examples: vec![full],
                name,
            });
        }
    }
    out
}

pub fn assess_complexity(code: &str) -> Complexity {
    let lines = code.split('\n').count();
    let has_loops = is_match(&RE_LOOP, code);
    let has_functions = is_match(&RE_DEFINITION, code);
    if is_match(&RE_HEAVY_CALL, code) || (has_loops && has_functions) || lines > 20 {
        Complexity::Advanced
    } else if has_loops || has_functions || lines > 10 {
        Complexity::Intermediate
    } else {
        Complexity::Basic
    }
}

/// Strip markdown fences and `>` prompts.
pub fn clean_code(code: &str) -> String {
    let s = code.replace("```magma", "").replace("```", "");
    replace_all(&RE_PROMPT_PREFIX, &s, "").trim().to_string()
}

/// First non-prompt line shorter than 100 characters.
pub fn extract_title(content: &str) -> String {
    content
        .split('\n')
        .find(|line| !line.trim().is_empty() && !line.starts_with('>') && line.chars().count() < 100)
        .map_or_else(|| DEFAULT_TITLE.to_string(), |line| line.trim().to_string())
}

/// Prose around the code, at most 200 characters.
pub fn extract_explanation(content: &str) -> String {
    let parts: Vec<&str> = match RE_CODE_BLOCK.as_ref() {
        Some(re) => re.split(content).collect(),
        None => vec![content],
    };
    let joined = parts
        .into_iter()
        .map(str::trim)
        .filter(|p| p.chars().count() > 20)
        .collect::<Vec<_>>()
        .join(" ");
    truncate_chars(&joined, EXPLANATION_CHARS)
}

/// The first code block or prompt line in `content`, if any.
pub fn extract_example(content: &str, metadata: &ChunkMetadata) -> Option<Example> {
    let raw = RE_CODE_BLOCK.as_ref()?.find(content)?.as_str();
    Some(Example {
        title: extract_title(content),
        code: clean_code(raw),
        explanation: extract_explanation(content),
        complexity: assess_complexity(raw),
        source: metadata.source.clone(),
        page: metadata.page,
    })
}

/// One-line description of a code line: an assignment or a call.
pub fn analyze_line(line: &str, docs: &[FunctionDoc]) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.contains(":=") {
        let mut parts = trimmed.split(":=").map(str::trim);
        let var = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();
        return Some(format!("Assigns `{value}` to variable `{var}`"));
    }
    let name = RE_CALL.as_ref()?.captures(trimmed)?.get(1)?.as_str();
    match docs.iter().find(|d| d.function_name == name) {
        Some(doc) => {
            let desc = doc.description.as_deref().unwrap_or_default();
            Some(format!("Calls `{name}`: {}...", truncate_chars(desc, DOC_SNIPPET_CHARS)))
        }
        None => Some(format!("Calls function `{name}`")),
    }
}
