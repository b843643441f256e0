//! The handbook tools: argument schemas, dispatch, and health reporting.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use handbook_core::data_processor::DataProcessor;
use handbook_core::error::{Error, Result};
use handbook_core::traits::{DocumentSink, Embedder, FunctionIndex, QueryGenerator};
use handbook_core::types::{CategoryFilter, SearchType};
use handbook_hybrid::benchmark::{DifficultyFilter, QualityBenchmark};
use handbook_hybrid::{HybridSearchRequest, IndexStats, Indexer, KnowledgeBase, MultiQuerySearch, SearchWeights};
use handbook_text::{Complexity, ComplexityFilter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::format;
use crate::protocol::{ToolCallResult, ToolInfo};

pub const SEARCH_HANDBOOK: &str = "search_handbook";
pub const SEARCH_FUNCTIONS: &str = "search_functions";
pub const GET_EXAMPLES: &str = "get_examples";
pub const EXPLAIN_CODE: &str = "explain_code";
pub const BENCHMARK_QUALITY: &str = "benchmark_quality";
pub const HEALTH_STATUS: &str = "health_status";
pub const ADD_DOCUMENT: &str = "add_document";
pub const SAVE_CONVERSATION: &str = "save_conversation";

const DEFAULT_MAX_LIMIT: usize = 50;
const DEFAULT_SOURCE: &str = "mcp-input";
/// Metadata keys owned by the chunk model; caller tags never override them.
const MODELLED_KEYS: [&str; 9] = ["id", "source", "page", "category", "chapter", "section", "hasCode", "hasExample", "wordCount"];

fn default_limit() -> usize { 5 }
fn default_function_limit() -> usize { 10 }
fn default_true() -> bool { true }
fn default_complexity() -> ComplexityFilter { ComplexityFilter::Only(Complexity::Basic) }

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHandbookArgs {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub category: CategoryFilter,
    #[serde(default, alias = "searchType")]
    pub search_type: SearchType,
    #[serde(default, alias = "vectorWeight")]
    pub vector_weight: Option<f64>,
    #[serde(default, alias = "bm25Weight")]
    pub bm25_weight: Option<f64>,
    /// Defaults to on whenever a phrasing generator is configured.
    #[serde(default, alias = "useMultiQuery")]
    pub use_multi_query: Option<bool>,
    /// Synonym expansion plus re-rank. Defaults to on for vector and bm25.
    #[serde(default)]
    pub enhanced: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchFunctionsArgs {
    #[serde(alias = "functionName")]
    pub function_name: String,
    #[serde(default = "default_function_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetExamplesArgs {
    pub topic: String,
    #[serde(default = "default_complexity")]
    pub complexity: ComplexityFilter,
    #[serde(default = "default_true", alias = "includeCode")]
    pub include_code: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainCodeArgs {
    pub code: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BenchmarkArgs {
    #[serde(default)]
    pub difficulty: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddDocumentArgs {
    pub content: String,
    /// Chunk ids derive from the source, so re-adding under one source
    /// replaces its chunks. Defaults to a fresh `mcp-input-<millis>`.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveConversationArgs {
    pub conversation: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Static facts reported by `health_status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceInfo {
    pub store: String,
    pub chat_model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub store: String,
    pub documents: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
    pub embedder: String,
    pub embedding_dim: usize,
    pub chat_model: Option<String>,
    pub multi_query: bool,
    pub cache_entries: usize,
    pub cache_ttl_secs: u64,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| Error::InvalidArgument(format!("{tool}: {e}")))
}

pub fn definitions() -> Vec<ToolInfo> {
    let tool = |name: &str, description: &str, input_schema: Value| ToolInfo {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    };
    vec![
        tool(
            SEARCH_HANDBOOK,
            "Search the MAGMA handbook with hybrid BM25+vector ranking, optionally fanning out over generated query variants",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"},
                    "limit": {"type": "number", "description": "Maximum number of results (default: 5)"},
                    "category": {
                        "type": "string",
                        "enum": ["syntax", "function", "algorithm", "example", "theory", "general", "all"]
                    },
                    "search_type": {"type": "string", "enum": ["hybrid", "vector", "bm25"]},
                    "vector_weight": {"type": "number", "minimum": 0, "maximum": 1},
                    "bm25_weight": {"type": "number", "minimum": 0, "maximum": 1},
                    "use_multi_query": {
                        "type": "boolean",
                        "description": "Generate alternative phrasings and merge their results over all categories (default: true when a generator is configured)"
                    },
                    "enhanced": {
                        "type": "boolean",
                        "description": "Expand synonyms and re-rank for code and examples (default: true for vector and bm25)"
                    }
                },
                "required": ["query"]
            }),
        ),
        tool(
            SEARCH_FUNCTIONS,
            "Look up MAGMA functions by name with fuzzy matching and signatures",
            json!({
                "type": "object",
                "properties": {
                    "function_name": {"type": "string"},
                    "limit": {"type": "number"}
                },
                "required": ["function_name"]
            }),
        ),
        tool(
            GET_EXAMPLES,
            "Code examples for a topic or function, filtered by complexity",
            json!({
                "type": "object",
                "properties": {
                    "topic": {"type": "string"},
                    "complexity": {"type": "string", "enum": ["basic", "intermediate", "advanced", "all"]},
                    "include_code": {"type": "boolean"}
                },
                "required": ["topic"]
            }),
        ),
        tool(
            EXPLAIN_CODE,
            "Explain MAGMA code line by line with function documentation and related handbook pages",
            json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string"},
                    "context": {"type": "string"}
                },
                "required": ["code"]
            }),
        ),
        tool(
            BENCHMARK_QUALITY,
            "Run the retrieval quality benchmark",
            json!({
                "type": "object",
                "properties": {
                    "difficulty": {"type": "string", "enum": ["easy", "medium", "hard", "all"]}
                },
                "required": []
            }),
        ),
        tool(
            HEALTH_STATUS,
            "Report store, embedder and cache status",
            json!({"type": "object", "properties": {}}),
        ),
        tool(
            ADD_DOCUMENT,
            "Chunk, embed and store a document so later searches can find it",
            json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "Document text; form feeds separate pages"},
                    "source": {"type": "string", "description": "Source name; re-adding under the same source replaces its chunks"},
                    "title": {"type": "string"},
                    "metadata": {"type": "object", "description": "Extra metadata stored with every chunk"}
                },
                "required": ["content"]
            }),
        ),
        tool(
            SAVE_CONVERSATION,
            "Store a conversation transcript for later retrieval",
            json!({
                "type": "object",
                "properties": {
                    "conversation": {"type": "string"},
                    "title": {"type": "string"}
                },
                "required": ["conversation"]
            }),
        ),
    ]
}

pub struct HandbookTools {
    knowledge: Arc<KnowledgeBase>,
    functions: Arc<dyn FunctionIndex>,
    documents: Arc<dyn DocumentSink>,
    multi: Option<MultiQuerySearch>,
    info: ServiceInfo,
    max_limit: usize,
}

impl HandbookTools {
    pub fn new(knowledge: Arc<KnowledgeBase>, functions: Arc<dyn FunctionIndex>, documents: Arc<dyn DocumentSink>) -> Self {
        Self { knowledge, functions, documents, multi: None, info: ServiceInfo::default(), max_limit: DEFAULT_MAX_LIMIT }
    }

    pub fn with_generator(self, generator: Arc<dyn QueryGenerator>) -> Self {
        let multi = MultiQuerySearch::new(self.knowledge.engine().clone(), generator);
        self.with_multi_query(multi)
    }

    pub fn with_multi_query(mut self, multi: MultiQuerySearch) -> Self {
        self.multi = Some(multi);
        self
    }

    /// Largest `limit` a caller may ask for.
    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self
    }

    fn check_limit(&self, limit: usize) -> Result<()> {
        if limit > self.max_limit {
            return Err(Error::InvalidArgument(format!("limit must be at most {}, got {limit}", self.max_limit)));
        }
        Ok(())
    }

    pub fn with_info(mut self, info: ServiceInfo) -> Self {
        self.info = info;
        self
    }

    /// Run a tool. Failures come back as an error result, never as a
    /// protocol error.
    pub async fn call(&self, name: &str, arguments: Value) -> ToolCallResult {
        match self.dispatch(name, arguments).await {
            Ok(text) => ToolCallResult::text(text),
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                ToolCallResult::error(e)
            }
        }
    }

    async fn dispatch(&self, name: &str, arguments: Value) -> Result<String> {
        match name {
            SEARCH_HANDBOOK => self.search_handbook(parse_args(name, arguments)?).await,
            SEARCH_FUNCTIONS => {
                let args: SearchFunctionsArgs = parse_args(name, arguments)?;
                self.check_limit(args.limit)?;
                let found = self.knowledge.search_functions(&args.function_name, args.limit).await?;
                Ok(format::function_results(&args.function_name, &found))
            }
            GET_EXAMPLES => {
                let args: GetExamplesArgs = parse_args(name, arguments)?;
                let examples = self.knowledge.get_examples(&args.topic, args.complexity).await?;
                Ok(format::examples(&args.topic, args.complexity, args.include_code, &examples))
            }
            EXPLAIN_CODE => {
                let args: ExplainCodeArgs = parse_args(name, arguments)?;
                self.knowledge.explain_code(&args.code, args.context.as_deref()).await
            }
            BENCHMARK_QUALITY => {
                let args: BenchmarkArgs = parse_args(name, arguments)?;
                let filter = match args.difficulty.as_deref() {
                    Some(d) => d.parse()?,
                    None => DifficultyFilter::All,
                };
                let bench = QualityBenchmark::new(self.knowledge.engine().clone(), self.functions.clone());
                let report = bench.run(filter).await?;
                info!(queries = report.results.len(), relevance = report.average_relevance(), "benchmark finished");
                Ok(format::benchmark(&report))
            }
            HEALTH_STATUS => {
                let status = self.health().await;
                serde_json::to_string_pretty(&status).map_err(|e| Error::Operation(e.to_string()))
            }
            ADD_DOCUMENT => {
                let args: AddDocumentArgs = parse_args(name, arguments)?;
                let source = args.source.unwrap_or_else(|| format!("{DEFAULT_SOURCE}-{}", unix_millis()));
                let mut tags = args.metadata;
                tags.insert("type".into(), json!("document"));
                if let Some(title) = args.title {
                    tags.insert("title".into(), json!(title));
                }
                let stats = self.add_text(&args.content, &source, tags).await?;
                Ok(format!(
                    "Added document \"{source}\" with {} chunks ({} function definitions)",
                    stats.inserted, stats.functions
                ))
            }
            SAVE_CONVERSATION => {
                let args: SaveConversationArgs = parse_args(name, arguments)?;
                let title = args.title.unwrap_or_else(|| format!("Conversation {}", unix_millis() / 1000));
                let mut tags = Map::new();
                tags.insert("type".into(), json!("conversation"));
                tags.insert("title".into(), json!(title));
                let stats = self.add_text(&args.conversation, &format!("conversation:{title}"), tags).await?;
                Ok(format!("Conversation saved: \"{title}\" ({} chunks)", stats.inserted))
            }
            _ => Err(Error::NotFound(format!("Unknown tool: {name}"))),
        }
    }

    async fn search_handbook(&self, args: SearchHandbookArgs) -> Result<String> {
        self.check_limit(args.limit)?;
        let mut note = "";
        if args.use_multi_query.unwrap_or(self.multi.is_some()) {
            match &self.multi {
                Some(multi) => {
                    let outcome = multi.run(&args.query, args.limit, args.search_type).await?;
                    return Ok(format::multi_query_results(&args.query, args.search_type, &outcome));
                }
                None => {
                    warn!("multi-query requested but no generator is configured");
                    note = "_Multi-query generation is not configured; ran a single query._\n\n";
                }
            }
        }

        let engine = self.knowledge.engine();
        let defaults = engine.weights();
        let weights = SearchWeights::new(
            args.vector_weight.unwrap_or(defaults.vector_weight),
            args.bm25_weight.unwrap_or(defaults.bm25_weight),
        )?
        .for_search_type(args.search_type);
        let results = if args.enhanced.unwrap_or(args.search_type != SearchType::Hybrid) {
            self.knowledge.enhanced_search_with(&args.query, args.limit, args.category, weights).await?
        } else {
            let request = HybridSearchRequest::new(args.query.as_str(), args.limit, args.category, weights);
            engine.hybrid_search(&request).await?
        };
        Ok(format!("{note}{}", format::search_results(&args.query, args.search_type, args.category, &results)))
    }

    /// Chunk and index caller-supplied text, then drop cached results so the
    /// new chunks are visible to the next search.
    async fn add_text(&self, content: &str, source: &str, mut tags: Map<String, Value>) -> Result<IndexStats> {
        let chunks = DataProcessor::new().chunk_document(content, source);
        if chunks.is_empty() {
            return Err(Error::InvalidArgument("content must not be empty".to_string()));
        }
        tags.retain(|key, _| !MODELLED_KEYS.contains(&key.as_str()));
        tags.insert("addedAt".into(), json!(unix_millis() / 1000));

        let engine = self.knowledge.engine();
        let stats = Indexer::new(engine.embedder().clone(), self.documents.clone(), self.functions.clone())
            .with_metadata(tags)
            .index(&chunks)
            .await?;
        engine.cache().clear();
        info!(source, chunks = stats.inserted, functions = stats.functions, "added text");
        Ok(stats)
    }

    pub async fn health(&self) -> HealthStatus {
        let engine = self.knowledge.engine();
        let (documents, store_error) = match self.documents.count().await {
            Ok(n) => (Some(n), None),
            Err(e) => (None, Some(e.to_string())),
        };
        HealthStatus {
            status: if store_error.is_none() { "healthy" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            store: self.info.store.clone(),
            documents,
            store_error,
            embedder: engine.embedder().id().to_string(),
            embedding_dim: engine.embedder().dim(),
            chat_model: self.info.chat_model.clone(),
            multi_query: self.multi.is_some(),
            cache_entries: engine.cache().len(),
            cache_ttl_secs: engine.cache().ttl().as_secs(),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}
