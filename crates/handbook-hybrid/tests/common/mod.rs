//! Counting stand-ins for the engine's collaborators.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use handbook_core::error::{Error, Result};
use handbook_core::traits::{DocumentSink, Embedder, FunctionIndex, HybridStore, QueryGenerator};
use handbook_core::types::{ChunkMetadata, FunctionDoc, HybridQuery, IndexedChunk, SearchResult, SearchType, StoreRow};
use handbook_hybrid::{DocumentSearch, HybridSearchEngine, ManualClock, ResultCache, SearchWeights};

pub struct CountingEmbedder {
    pub calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Arc<Self> { Arc::new(Self { calls: AtomicUsize::new(0) }) }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn id(&self) -> &str { "counting" }
    fn dim(&self) -> usize { 2 }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![text.len() as f32, 1.0])
    }
}

pub fn row(id: &str, score: f64) -> StoreRow {
    StoreRow {
        id: Some(id.to_string()),
        content: format!("content of {id}"),
        metadata: ChunkMetadata { id: Some(id.to_string()), source: "handbook.txt".into(), page: 1, ..Default::default() },
        combined_score: score,
        vector_similarity: Some(score / 2.0),
        bm25_score: Some(score / 3.0),
        rank: None,
    }
}

/// Returns `rows` truncated to the query limit, or `rows_for[text]` when set.
pub struct ScriptedStore {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub rows: Vec<StoreRow>,
    pub rows_for: HashMap<String, Vec<StoreRow>>,
    pub seen: Mutex<Vec<HybridQuery>>,
}

impl ScriptedStore {
    pub fn new(rows: Vec<StoreRow>) -> Arc<Self> { Self::with_scripts(rows, HashMap::new()) }

    pub fn with_scripts(rows: Vec<StoreRow>, rows_for: HashMap<String, Vec<StoreRow>>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            rows,
            rows_for,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    pub fn set_failing(&self, fail: bool) { self.fail.store(fail, Ordering::SeqCst); }

    pub fn queries(&self) -> Vec<HybridQuery> { self.seen.lock().expect("lock").clone() }
}

#[async_trait]
impl HybridStore for ScriptedStore {
    async fn hybrid_query(&self, query: &HybridQuery) -> Result<Vec<StoreRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().expect("lock").push(query.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Query("function search_magma_hybrid does not exist".into()));
        }
        let rows = self.rows_for.get(&query.text).unwrap_or(&self.rows);
        Ok(rows.iter().take(query.limit).cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryFunctions {
    pub docs: Mutex<Vec<FunctionDoc>>,
    pub searches: Mutex<Vec<String>>,
}

impl MemoryFunctions {
    pub fn with(names: &[(&str, &str)]) -> Arc<Self> {
        let docs = names
            .iter()
            .map(|(name, desc)| FunctionDoc {
                function_name: (*name).to_string(),
                function_signature: Some(format!("{name}(x)")),
                description: Some((*desc).to_string()),
                ..Default::default()
            })
            .collect();
        Arc::new(Self { docs: Mutex::new(docs), searches: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl FunctionIndex for MemoryFunctions {
    async fn search_functions(&self, query: &str, limit: usize) -> Result<Vec<FunctionDoc>> {
        self.searches.lock().expect("lock").push(query.to_string());
        let docs = self.docs.lock().expect("lock");
        Ok(docs.iter().filter(|d| d.function_name == query).take(limit).cloned().collect())
    }

    async fn insert_functions(&self, functions: &[FunctionDoc]) -> Result<usize> {
        self.docs.lock().expect("lock").extend_from_slice(functions);
        Ok(functions.len())
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub batches: Mutex<Vec<usize>>,
    pub chunks: Mutex<Vec<IndexedChunk>>,
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn insert_chunks(&self, chunks: &[IndexedChunk]) -> Result<usize> {
        self.batches.lock().expect("lock").push(chunks.len());
        self.chunks.lock().expect("lock").extend_from_slice(chunks);
        Ok(chunks.len())
    }

    async fn count(&self) -> Result<usize> { Ok(self.chunks.lock().expect("lock").len()) }
}

pub enum Generator {
    Fails,
    Returns(Vec<String>),
}

#[async_trait]
impl QueryGenerator for Generator {
    async fn generate_alternatives(&self, _question: &str) -> Result<Vec<String>> {
        match self {
            Generator::Fails => Err(Error::Generation("model unavailable".into())),
            Generator::Returns(list) => Ok(list.clone()),
        }
    }
}

pub fn result(id: Option<&str>, score: f64) -> SearchResult {
    SearchResult {
        id: None,
        content: format!("content of {}", id.unwrap_or("anonymous")),
        metadata: ChunkMetadata { id: id.map(str::to_string), ..Default::default() },
        score,
        vector_similarity: None,
        bm25_score: None,
        rank: None,
    }
}

/// Per-query canned lists; an unknown query fails. A query with a delay
/// answers only after sleeping that long.
pub struct ScriptedSearch {
    pub lists: HashMap<String, Vec<SearchResult>>,
    pub delays: HashMap<String, Duration>,
    pub calls: Mutex<Vec<(String, usize, SearchType)>>,
}

impl ScriptedSearch {
    pub fn new(lists: Vec<(&str, Vec<SearchResult>)>) -> Arc<Self> { Self::with_delays(lists, Vec::new()) }

    pub fn with_delays(lists: Vec<(&str, Vec<SearchResult>)>, delays: Vec<(&str, Duration)>) -> Arc<Self> {
        Arc::new(Self {
            lists: lists.into_iter().map(|(q, l)| (q.to_string(), l)).collect(),
            delays: delays.into_iter().map(|(q, d)| (q.to_string(), d)).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, usize, SearchType)> { self.calls.lock().expect("lock").clone() }
}

#[async_trait]
impl DocumentSearch for ScriptedSearch {
    async fn search_documents(&self, query: &str, limit: usize, search_type: SearchType) -> Result<Vec<SearchResult>> {
        self.calls.lock().expect("lock").push((query.to_string(), limit, search_type));
        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        match self.lists.get(query) {
            Some(list) => Ok(list.iter().take(limit).cloned().collect()),
            None => Err(Error::Network(format!("no script for '{query}'"))),
        }
    }
}

pub const HOUR: Duration = Duration::from_secs(3600);

pub fn engine(store: Arc<ScriptedStore>, clock: Arc<ManualClock>) -> (HybridSearchEngine, Arc<CountingEmbedder>) {
    let embedder = CountingEmbedder::new();
    let cache = ResultCache::with_clock(HOUR, clock);
    let weights = SearchWeights::new(0.6, 0.4).expect("weights");
    (HybridSearchEngine::new(embedder.clone(), store, cache, weights), embedder)
}

/// Serve one canned `(status, body)` per connection; yields the request bodies.
pub async fn serve(responses: Vec<(u16, String)>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        let mut bodies = Vec::new();
        for (status, body) in responses {
            let (mut sock, _) = listener.accept().await.expect("accept");
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.expect("read");
                if n == 0 { break; }
                buf.extend_from_slice(&chunk[..n]);
                let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") else { continue };
                let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:").map(|v| v.trim().to_string()))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + len {
                    bodies.push(String::from_utf8_lossy(&buf[pos + 4..pos + 4 + len]).to_string());
                    break;
                }
            }
            let resp = format!(
                "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.expect("write");
            let _ = sock.shutdown().await;
        }
        bodies
    });
    (format!("http://{addr}"), handle)
}
