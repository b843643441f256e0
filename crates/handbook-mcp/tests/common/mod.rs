#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use handbook_core::error::{Error, Result};
use handbook_core::traits::{DocumentSink, Embedder, FunctionIndex, HybridStore, QueryGenerator};
use handbook_core::types::{ChunkMetadata, FunctionDoc, HybridQuery, IndexedChunk, StoreRow};
use handbook_hybrid::{HybridSearchEngine, KnowledgeBase, ResultCache, SearchWeights};
use handbook_mcp::{HandbookTools, McpServer, ServiceInfo};
use handbook_text::QueryExpander;
use serde_json::Value;

pub struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    fn id(&self) -> &str { "fixed" }
    fn dim(&self) -> usize { 2 }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> { Ok(vec![1.0, 0.0]) }
}

pub fn row(id: &str, content: &str, score: f64) -> StoreRow {
    StoreRow {
        id: Some(id.to_string()),
        content: content.to_string(),
        metadata: ChunkMetadata { id: Some(id.to_string()), source: "handbook.txt".into(), page: 12, ..Default::default() },
        combined_score: score,
        vector_similarity: Some(score / 2.0),
        bm25_score: Some(score / 3.0),
        rank: None,
    }
}

/// Answers every hybrid query with the same rows; records queries and inserts.
pub struct FakeStore {
    pub rows: Vec<StoreRow>,
    pub seen: Mutex<Vec<HybridQuery>>,
    pub inserted: Mutex<Vec<IndexedChunk>>,
    pub functions: Mutex<Vec<FunctionDoc>>,
    pub broken: AtomicBool,
}

impl FakeStore {
    pub fn new(rows: Vec<StoreRow>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            seen: Mutex::new(Vec::new()),
            inserted: Mutex::new(Vec::new()),
            functions: Mutex::new(Vec::new()),
            broken: AtomicBool::new(false),
        })
    }

    pub fn queries(&self) -> Vec<HybridQuery> { self.seen.lock().expect("lock").clone() }

    pub fn inserted(&self) -> Vec<IndexedChunk> { self.inserted.lock().expect("lock").clone() }
}

#[async_trait]
impl HybridStore for FakeStore {
    async fn hybrid_query(&self, query: &HybridQuery) -> Result<Vec<StoreRow>> {
        self.seen.lock().expect("lock").push(query.clone());
        Ok(self.rows.iter().take(query.limit).cloned().collect())
    }
}

#[async_trait]
impl DocumentSink for FakeStore {
    async fn insert_chunks(&self, chunks: &[IndexedChunk]) -> Result<usize> {
        self.inserted.lock().expect("lock").extend_from_slice(chunks);
        Ok(chunks.len())
    }

    async fn count(&self) -> Result<usize> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(Error::Network("connection refused".into()));
        }
        Ok(self.rows.len())
    }
}

#[async_trait]
impl FunctionIndex for FakeStore {
    async fn search_functions(&self, query: &str, limit: usize) -> Result<Vec<FunctionDoc>> {
        let known = ["SylowSubgroup", "HammingCode"];
        Ok(known
            .iter()
            .filter(|name| **name == query)
            .take(limit)
            .map(|name| FunctionDoc {
                function_name: (*name).to_string(),
                function_signature: Some(format!("{name}(x)")),
                description: Some(format!("Documentation of {name}")),
                category: Some("intrinsic".into()),
                similarity_score: Some(1.0),
                ..Default::default()
            })
            .collect())
    }

    async fn insert_functions(&self, functions: &[FunctionDoc]) -> Result<usize> {
        self.functions.lock().expect("lock").extend_from_slice(functions);
        Ok(functions.len())
    }
}

pub struct Alternatives(pub Vec<&'static str>);

#[async_trait]
impl QueryGenerator for Alternatives {
    async fn generate_alternatives(&self, _question: &str) -> Result<Vec<String>> {
        Ok(self.0.iter().map(|s| (*s).to_string()).collect())
    }
}

pub fn tools(store: Arc<FakeStore>) -> HandbookTools {
    let weights = SearchWeights::new(0.6, 0.4).expect("weights");
    let engine = HybridSearchEngine::new(
        Arc::new(FixedEmbedder),
        store.clone(),
        ResultCache::new(Duration::from_secs(3600)),
        weights,
    );
    let knowledge = Arc::new(KnowledgeBase::new(Arc::new(engine), store.clone(), QueryExpander::default()));
    HandbookTools::new(knowledge, store.clone(), store)
        .with_info(ServiceInfo { store: "memory".into(), chat_model: None })
}

pub fn server(store: Arc<FakeStore>) -> McpServer { McpServer::new(tools(store)) }

/// `tools/call` through the server; returns (text, isError).
pub async fn call(server: &McpServer, name: &str, arguments: Value) -> (String, bool) {
    let line = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments},
    })
    .to_string();
    let response = server.handle_line(&line).await.expect("response");
    assert_eq!(response.id, Value::from(7));
    let result = response.result.expect("result");
    let text = result["content"][0]["text"].as_str().unwrap_or_default().to_string();
    (text, result["isError"].as_bool().unwrap_or(false))
}
