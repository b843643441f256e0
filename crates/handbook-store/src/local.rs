//! In-process hybrid store: tantivy BM25 for the lexical channel, brute-force
//! cosine over stored embeddings for the vector channel.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use handbook_core::error::{Error, Result};
use handbook_core::traits::{DocumentSink, FunctionIndex, HybridStore};
use handbook_core::types::{Category, ChunkMetadata, FunctionDoc, HybridQuery, IndexedChunk, StoreRow};
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use crate::tantivy_utils::{build_schema, register_tokenizer};
use crate::trigram::trigram_similarity;

const WRITER_BUDGET: usize = 50_000_000;
const FUNCTIONS_FILE: &str = "functions.json";
const FUNCTION_THRESHOLD: f64 = 0.3;

struct Fields {
    id: Field,
    category: Field,
    text: Field,
    content: Field,
    metadata: Field,
    embedding: Field,
}

#[derive(Clone)]
struct StoredDoc {
    content: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

struct Inner {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
    docs: RwLock<HashMap<String, StoredDoc>>,
    functions: RwLock<Vec<FunctionDoc>>,
    dir: Option<PathBuf>,
    next_auto_id: AtomicUsize,
}

#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

fn tantivy_err(e: tantivy::TantivyError) -> Error { Error::Query(format!("tantivy: {e}")) }

fn poisoned<T>(_: T) -> Error { Error::Operation("store lock poisoned".to_string()) }

impl LocalStore {
    pub fn in_memory() -> Result<Self> {
        let index = Index::create_in_ram(build_schema());
        Self::from_index(index, None)
    }

    /// Open the index under `dir`, creating it when absent.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let index = if dir.join("meta.json").exists() {
            Index::open_in_dir(dir).map_err(tantivy_err)?
        } else {
            Index::create_in_dir(dir, build_schema()).map_err(tantivy_err)?
        };
        let store = Self::from_index(index, Some(dir.to_path_buf()))?;
        store.inner.load()?;
        Ok(store)
    }

    fn from_index(index: Index, dir: Option<PathBuf>) -> Result<Self> {
        register_tokenizer(&index);
        let schema = index.schema();
        let field = |name: &str| schema.get_field(name).map_err(tantivy_err);
        let fields = Fields {
            id: field("id")?,
            category: field("category")?,
            text: field("text")?,
            content: field("content")?,
            metadata: field("metadata")?,
            embedding: field("embedding")?,
        };
        let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(tantivy_err)?;
        let writer = index.writer(WRITER_BUDGET).map_err(tantivy_err)?;
        let inner = Inner {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
            docs: RwLock::new(HashMap::new()),
            functions: RwLock::new(Vec::new()),
            dir,
            next_auto_id: AtomicUsize::new(0),
        };
        Ok(Self { inner: Arc::new(inner) })
    }
}

impl Inner {
    fn load(&self) -> Result<()> {
        let searcher = self.reader.searcher();
        let addrs = searcher.search(&AllQuery, &DocSetCollector).map_err(tantivy_err)?;
        let mut docs = self.docs.write().map_err(poisoned)?;
        for addr in addrs {
            let doc: TantivyDocument = searcher.doc(addr).map_err(tantivy_err)?;
            let text = |f: Field| doc.get_first(f).and_then(|v| v.as_str()).unwrap_or("").to_string();
            let id = text(self.fields.id);
            let metadata = serde_json::from_str(&text(self.fields.metadata)).unwrap_or_default();
            let embedding = serde_json::from_str(&text(self.fields.embedding)).unwrap_or_default();
            docs.insert(id, StoredDoc { content: text(self.fields.content), metadata, embedding });
        }
        if let Some(dir) = &self.dir {
            let path = dir.join(FUNCTIONS_FILE);
            if path.exists() {
                let loaded: Vec<FunctionDoc> = serde_json::from_str(&fs::read_to_string(&path)?)
                    .map_err(|e| Error::Operation(format!("{}: {e}", path.display())))?;
                *self.functions.write().map_err(poisoned)? = loaded;
            }
        }
        info!(docs = docs.len(), "opened local store");
        Ok(())
    }

    /// Next `doc-N` not already taken. Never reuses a number within a process.
    fn auto_id(&self, docs: &HashMap<String, StoredDoc>) -> String {
        loop {
            let id = format!("doc-{}", self.next_auto_id.fetch_add(1, Ordering::Relaxed));
            if !docs.contains_key(&id) {
                return id;
            }
        }
    }

    fn insert(&self, chunks: Vec<IndexedChunk>) -> Result<usize> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        let mut writer = self.writer.lock().map_err(poisoned)?;
        for c in &chunks {
            let id = match &c.chunk.metadata.id {
                Some(id) => id.clone(),
                None => self.auto_id(&docs),
            };
            let mut metadata = c.chunk.metadata.clone();
            metadata.id = Some(id.clone());
            let metadata_json = serde_json::to_string(&metadata).map_err(|e| Error::Operation(e.to_string()))?;
            let embedding_json = serde_json::to_string(&c.embedding).map_err(|e| Error::Operation(e.to_string()))?;
            writer.delete_term(Term::from_field_text(self.fields.id, &id));
            writer
                .add_document(doc!(
                    self.fields.id => id.clone(),
                    self.fields.category => metadata.category.as_str().to_string(),
                    self.fields.text => c.content_clean.clone(),
                    self.fields.content => c.chunk.content.clone(),
                    self.fields.metadata => metadata_json,
                    self.fields.embedding => embedding_json,
                ))
                .map_err(tantivy_err)?;
            docs.insert(id, StoredDoc { content: c.chunk.content.clone(), metadata, embedding: c.embedding.clone() });
        }
        writer.commit().map_err(tantivy_err)?;
        self.reader.reload().map_err(tantivy_err)?;
        debug!(n = chunks.len(), total = docs.len(), "committed chunks");
        Ok(chunks.len())
    }

    /// Raw BM25 score per matching id.
    fn lexical(&self, text: &str, category: Option<Category>, limit: usize) -> Result<HashMap<String, f32>> {
        let parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
        let (query, errors) = parser.parse_query_lenient(text);
        if !errors.is_empty() {
            debug!(errors = errors.len(), "lenient query parse dropped clauses");
        }
        let query: Box<dyn Query> = match category {
            Some(c) => {
                let term: Box<dyn Query> =
                    Box::new(TermQuery::new(Term::from_field_text(self.fields.category, c.as_str()), IndexRecordOption::Basic));
                Box::new(BooleanQuery::new(vec![(Occur::Must, query), (Occur::Must, term)]))
            }
            None => query,
        };
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit.max(1))).map_err(tantivy_err)?;
        let mut out = HashMap::new();
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr).map_err(tantivy_err)?;
            if let Some(id) = doc.get_first(self.fields.id).and_then(|v| v.as_str()) {
                out.insert(id.to_string(), score);
            }
        }
        Ok(out)
    }

    fn hybrid_query(&self, q: &HybridQuery) -> Result<Vec<StoreRow>> {
        let docs = self.docs.read().map_err(poisoned)?;
        if q.limit == 0 || docs.is_empty() { return Ok(Vec::new()); }
        let lexical = self.lexical(&q.text, q.category_filter, docs.len())?;
        let top = lexical.values().copied().fold(0f32, f32::max);

        let mut rows = Vec::new();
        for (id, d) in docs.iter() {
            if q.category_filter.is_some_and(|c| d.metadata.category != c) { continue; }
            let sim = f64::from(cosine(&q.vector, &d.embedding));
            let bm25 = lexical.get(id).map(|s| if top > 0.0 { f64::from(*s / top) } else { 0.0 });
            if sim < q.threshold && bm25.is_none() { continue; }
            let bm25 = bm25.unwrap_or(0.0);
            rows.push(StoreRow {
                id: Some(id.clone()),
                content: d.content.clone(),
                metadata: d.metadata.clone(),
                combined_score: q.vector_weight * sim + q.bm25_weight * bm25,
                vector_similarity: Some(sim),
                bm25_score: Some(bm25),
                rank: None,
            });
        }
        rows.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score).then_with(|| a.id.cmp(&b.id)));
        rows.truncate(q.limit);
        for (i, r) in rows.iter_mut().enumerate() {
            r.rank = Some(u32::try_from(i + 1).unwrap_or(u32::MAX));
        }
        Ok(rows)
    }

    fn persist_functions(&self, functions: &[FunctionDoc]) -> Result<()> {
        let Some(dir) = &self.dir else { return Ok(()) };
        let json = serde_json::to_string(functions).map_err(|e| Error::Operation(e.to_string()))?;
        fs::write(dir.join(FUNCTIONS_FILE), json)?;
        Ok(())
    }
}

/// Cosine similarity; 0 for mismatched or zero-length vectors.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() { return 0.0; }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { return 0.0; }
    dot / (na * nb)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| Error::Operation(format!("store task: {e}")))?
}

#[async_trait]
impl HybridStore for LocalStore {
    async fn hybrid_query(&self, query: &HybridQuery) -> Result<Vec<StoreRow>> {
        let inner = Arc::clone(&self.inner);
        let query = query.clone();
        blocking(move || inner.hybrid_query(&query)).await
    }
}

#[async_trait]
impl DocumentSink for LocalStore {
    async fn insert_chunks(&self, chunks: &[IndexedChunk]) -> Result<usize> {
        if chunks.is_empty() { return Ok(0); }
        let inner = Arc::clone(&self.inner);
        let chunks = chunks.to_vec();
        blocking(move || inner.insert(chunks)).await
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.inner.docs.read().map_err(poisoned)?.len())
    }
}

#[async_trait]
impl FunctionIndex for LocalStore {
    async fn search_functions(&self, query: &str, limit: usize) -> Result<Vec<FunctionDoc>> {
        let functions = self.inner.functions.read().map_err(poisoned)?;
        let mut hits: Vec<FunctionDoc> = functions
            .iter()
            .filter_map(|f| {
                let score = trigram_similarity(query, &f.function_name);
                (score >= FUNCTION_THRESHOLD).then(|| FunctionDoc { similarity_score: Some(score), ..f.clone() })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity_score.unwrap_or(0.0).total_cmp(&a.similarity_score.unwrap_or(0.0))
                .then_with(|| a.function_name.cmp(&b.function_name))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn insert_functions(&self, functions: &[FunctionDoc]) -> Result<usize> {
        let mut stored = self.inner.functions.write().map_err(poisoned)?;
        let mut known: HashSet<String> = stored.iter().map(|f| f.function_name.clone()).collect();
        let before = stored.len();
        for f in functions {
            if known.insert(f.function_name.clone()) {
                stored.push(FunctionDoc { similarity_score: None, ..f.clone() });
            }
        }
        let added = stored.len() - before;
        if added < functions.len() {
            warn!(skipped = functions.len() - added, "skipped functions already indexed");
        }
        self.inner.persist_functions(&stored)?;
        Ok(added)
    }
}
