//! PostgREST client for the hosted store: hybrid ranking and fuzzy function
//! search run server-side as SQL functions, inserts go to plain tables.

use std::time::Duration;

use async_trait::async_trait;
use handbook_core::config::SupabaseSettings;
use handbook_core::error::{Error, Result};
use handbook_core::traits::{DocumentSink, FunctionIndex, HybridStore};
use handbook_core::types::{FunctionDoc, HybridQuery, IndexedChunk, StoreRow};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

pub struct SupabaseStore {
    client: reqwest::Client,
    rest_url: String,
    key: String,
    settings: SupabaseSettings,
}

#[derive(Serialize)]
struct DocumentRow<'a> {
    content: &'a str,
    content_clean: &'a str,
    embedding: &'a [f32],
    metadata: &'a handbook_core::types::ChunkMetadata,
    chapter: Option<&'a str>,
    section: Option<&'a str>,
    category: &'a str,
    has_code: bool,
    has_example: bool,
    word_count: u32,
}

impl<'a> From<&'a IndexedChunk> for DocumentRow<'a> {
    fn from(c: &'a IndexedChunk) -> Self {
        let m = &c.chunk.metadata;
        Self {
            content: &c.chunk.content,
            content_clean: &c.content_clean,
            embedding: &c.embedding,
            metadata: m,
            chapter: m.chapter.as_deref(),
            section: m.section.as_deref(),
            category: m.category.as_str(),
            has_code: m.has_code.unwrap_or(false),
            has_example: m.has_example.unwrap_or(false),
            word_count: m.word_count.unwrap_or(0),
        }
    }
}

fn network(e: reqwest::Error) -> Error { Error::Network(format!("supabase: {e}")) }

impl SupabaseStore {
    pub fn new(settings: &SupabaseSettings) -> Result<Self> {
        if settings.url.trim().is_empty() || settings.key.trim().is_empty() {
            return Err(Error::InvalidConfig("supabase.url and supabase.key are required".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Network(format!("http client: {e}")))?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", settings.url.trim_end_matches('/')),
            key: settings.key.clone(),
            settings: settings.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{path}", self.rest_url))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() { return Ok(response); }
        let body = response.text().await.unwrap_or_default();
        Err(Error::from_status(status.as_u16(), &body, Error::Query))
    }

    /// Call a SQL function. A `null` result reads as no rows.
    async fn rpc<T: DeserializeOwned>(&self, function: &str, params: serde_json::Value) -> Result<Vec<T>> {
        debug!(function, "supabase rpc");
        let response = self
            .request(reqwest::Method::POST, &format!("rpc/{function}"))
            .json(&params)
            .send()
            .await
            .map_err(network)?;
        let rows: Option<Vec<T>> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Query(format!("{function} response: {e}")))?;
        Ok(rows.unwrap_or_default())
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, rows: &[T]) -> Result<usize> {
        if rows.is_empty() { return Ok(0); }
        let response = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(network)?;
        Self::check(response).await?;
        debug!(table, n = rows.len(), "inserted rows");
        Ok(rows.len())
    }
}

/// Total from a `Content-Range: 0-0/1234` header.
fn parse_content_range(value: &str) -> Option<usize> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl HybridStore for SupabaseStore {
    async fn hybrid_query(&self, q: &HybridQuery) -> Result<Vec<StoreRow>> {
        let params = json!({
            "query_text": q.text,
            "query_embedding": q.vector,
            "similarity_threshold": q.threshold,
            "bm25_weight": q.bm25_weight,
            "vector_weight": q.vector_weight,
            "match_count": q.limit,
            "category_filter": q.category_filter.map(|c| c.as_str()),
        });
        self.rpc(&self.settings.hybrid_function, params).await
    }
}

#[async_trait]
impl DocumentSink for SupabaseStore {
    async fn insert_chunks(&self, chunks: &[IndexedChunk]) -> Result<usize> {
        let rows: Vec<DocumentRow<'_>> = chunks.iter().map(DocumentRow::from).collect();
        self.insert(&self.settings.documents_table, &rows).await
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .request(reqwest::Method::GET, &format!("{}?select=id", self.settings.documents_table))
            .header("Prefer", "count=exact")
            .header("Range", "0-0")
            .send()
            .await
            .map_err(network)?;
        let response = Self::check(response).await?;
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| Error::Query("count: missing content-range total".to_string()))
    }
}

#[async_trait]
impl FunctionIndex for SupabaseStore {
    async fn search_functions(&self, query: &str, limit: usize) -> Result<Vec<FunctionDoc>> {
        let params = json!({
            "function_query": query,
            "similarity_threshold": self.settings.function_similarity_threshold,
            "match_count": limit,
        });
        self.rpc(&self.settings.function_search_function, params).await
    }

    async fn insert_functions(&self, functions: &[FunctionDoc]) -> Result<usize> {
        let rows: Vec<FunctionDoc> = functions.iter().map(|f| FunctionDoc { similarity_score: None, ..f.clone() }).collect();
        self.insert(&self.settings.functions_table, &rows).await
    }
}
