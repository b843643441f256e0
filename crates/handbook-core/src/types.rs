//! Domain types shared by the text heuristics, stores, and the search engine.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Content category assigned to a chunk at ingestion time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Function,
    Example,
    Syntax,
    Algorithm,
    Theory,
    #[default]
    General,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Function,
        Category::Example,
        Category::Syntax,
        Category::Algorithm,
        Category::Theory,
        Category::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Function => "function",
            Category::Example => "example",
            Category::Syntax => "syntax",
            Category::Algorithm => "algorithm",
            Category::Theory => "theory",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidArgument(format!("unknown category '{s}'")))
    }
}

/// Category restriction for a search: everything, or one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    /// The store-side filter value; `None` means unfiltered.
    pub fn category(self) -> Option<Category> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(c) => Some(c),
        }
    }
}

impl From<Category> for CategoryFilter {
    fn from(c: Category) -> Self { CategoryFilter::Only(c) }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Only(c) => c.fmt(f),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") { return Ok(CategoryFilter::All); }
        s.parse().map(CategoryFilter::Only)
    }
}

impl TryFrom<String> for CategoryFilter {
    type Error = Error;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<CategoryFilter> for String {
    fn from(f: CategoryFilter) -> Self { f.to_string() }
}

/// Retrieval channel selection for the single-query search path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[serde(alias = "vector")]
    Semantic,
    #[serde(alias = "bm25")]
    Keyword,
    #[default]
    Hybrid,
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchType::Semantic => "semantic",
            SearchType::Keyword => "keyword",
            SearchType::Hybrid => "hybrid",
        })
    }
}

/// Metadata attached to a stored chunk.
///
/// Keys the store returns that are not modelled here are kept in `extra` so
/// they survive a round trip through the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default, deserialize_with = "de_lenient_u32")]
    pub page: u32,
    #[serde(default, deserialize_with = "de_lenient_category")]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_code: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_example: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A chunk of handbook text. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A chunk ready for insertion: cleaned text plus its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub chunk: DocumentChunk,
    pub content_clean: String,
    pub embedding: Vec<f32>,
}

/// One ranked hit.
///
/// `score` is the fused ranking signal and is always present. The two
/// sub-scores are carried through from the store for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

impl SearchResult {
    /// Identity used for deduplication: `metadata.id`, then `id`.
    pub fn identity(&self) -> Option<&str> {
        self.metadata.id.as_deref().or(self.id.as_deref())
    }
}

impl From<StoreRow> for SearchResult {
    fn from(row: StoreRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            metadata: row.metadata,
            score: row.combined_score,
            vector_similarity: row.vector_similarity,
            bm25_score: row.bm25_score,
            rank: row.rank,
        }
    }
}

/// Parameters for one combined lexical+vector ranking request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridQuery {
    pub text: String,
    pub vector: Vec<f32>,
    pub threshold: f64,
    pub bm25_weight: f64,
    pub vector_weight: f64,
    pub limit: usize,
    pub category_filter: Option<Category>,
}

/// A row as returned by the store's hybrid ranking function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRow {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    pub content: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub metadata: ChunkMetadata,
    pub combined_score: f64,
    #[serde(default)]
    pub vector_similarity: Option<f64>,
    #[serde(default)]
    pub bm25_score: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_rank")]
    pub rank: Option<u32>,
}

/// A documented handbook function (intrinsic or one seen in examples).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDoc {
    pub function_name: String,
    #[serde(default)]
    pub function_signature: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub usage_examples: Vec<String>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub related_functions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

fn de_null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

// Row ids are bigserial integers on some schemas and uuids on others.
fn de_opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<serde_json::Value>::deserialize(d)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn de_opt_rank<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.filter(|r| r.is_finite() && *r >= 0.0).map(|r| r as u32))
}

fn de_lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(match Option::<serde_json::Value>::deserialize(d)? {
        Some(serde_json::Value::Number(n)) => n.as_u64().map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX)),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn de_lenient_category<'de, D: Deserializer<'de>>(d: D) -> Result<Category, D::Error> {
    Ok(Option::<String>::deserialize(d)?.and_then(|s| s.parse().ok()).unwrap_or_default())
}
