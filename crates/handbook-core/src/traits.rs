//! Seams to the external collaborators. Every implementation is async and
//! object-safe so the engine can hold them as `Arc<dyn ...>`.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FunctionDoc, HybridQuery, IndexedChunk, StoreRow};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-small:d1536`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts { out.push(self.embed(t).await?); }
        Ok(out)
    }
}

#[async_trait]
pub trait HybridStore: Send + Sync {
    /// Run one fused lexical+vector ranking. Rows come back in ranked order.
    async fn hybrid_query(&self, query: &HybridQuery) -> Result<Vec<StoreRow>>;
}

#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn insert_chunks(&self, chunks: &[IndexedChunk]) -> Result<usize>;
    async fn count(&self) -> Result<usize>;
}

#[async_trait]
pub trait FunctionIndex: Send + Sync {
    async fn search_functions(&self, query: &str, limit: usize) -> Result<Vec<FunctionDoc>>;
    async fn insert_functions(&self, functions: &[FunctionDoc]) -> Result<usize>;
}

#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Alternative phrasings of `question`. Best effort; callers degrade on error.
    async fn generate_alternatives(&self, question: &str) -> Result<Vec<String>>;
}
