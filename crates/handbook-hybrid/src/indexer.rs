//! Ingestion: enrich raw chunks, embed in batches, insert in batches, then
//! extract and index function definitions.

use std::collections::HashSet;
use std::sync::Arc;

use handbook_core::data_processor::RawChunk;
use handbook_core::error::{Error, Result};
use handbook_core::traits::{DocumentSink, Embedder, FunctionIndex};
use handbook_core::types::{FunctionDoc, IndexedChunk};
use handbook_text::code::extract_function_definitions;
use handbook_text::{EnrichedChunk, Enricher};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

pub const EMBED_BATCH: usize = 50;
pub const INSERT_BATCH: usize = 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub inserted: usize,
    pub functions: usize,
}

pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn DocumentSink>,
    functions: Arc<dyn FunctionIndex>,
    enricher: Enricher,
    metadata: Map<String, Value>,
    embed_batch: usize,
    insert_batch: usize,
    show_progress: bool,
}

fn progress_bar(len: usize, show: bool) -> ProgressBar {
    if !show { return ProgressBar::hidden(); }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>, sink: Arc<dyn DocumentSink>, functions: Arc<dyn FunctionIndex>) -> Self {
        Self {
            embedder,
            sink,
            functions,
            enricher: Enricher::default(),
            metadata: Map::new(),
            embed_batch: EMBED_BATCH,
            insert_batch: INSERT_BATCH,
            show_progress: false,
        }
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = enricher;
        self
    }

    /// Extra metadata stamped on every chunk this indexer stores.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_batch_sizes(mut self, embed_batch: usize, insert_batch: usize) -> Self {
        self.embed_batch = embed_batch.max(1);
        self.insert_batch = insert_batch.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn index(&self, raw: &[RawChunk]) -> Result<IndexStats> {
        if raw.is_empty() {
            warn!("no chunks to index");
            return Ok(IndexStats::default());
        }
        let enriched: Vec<EnrichedChunk> = raw
            .iter()
            .map(|c| {
                let mut e = self.enricher.enrich(c);
                e.chunk.metadata.extra.extend(self.metadata.clone());
                e
            })
            .collect();

        let pb = progress_bar(enriched.len(), self.show_progress);
        pb.set_message("embedding");
        let mut indexed: Vec<IndexedChunk> = Vec::with_capacity(enriched.len());
        for batch in enriched.chunks(self.embed_batch) {
            let texts: Vec<String> = batch.iter().map(|c| c.content_clean.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(Error::Operation(format!("expected {} embeddings, got {}", batch.len(), embeddings.len())));
            }
            indexed.extend(batch.iter().zip(embeddings).map(|(c, embedding)| IndexedChunk {
                chunk: c.chunk.clone(),
                content_clean: c.content_clean.clone(),
                embedding,
            }));
            pb.set_position(indexed.len() as u64);
        }

        pb.set_position(0);
        pb.set_message("inserting");
        let mut inserted = 0;
        for batch in indexed.chunks(self.insert_batch) {
            inserted += self.sink.insert_chunks(batch).await?;
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("indexed");

        let functions = collect_functions(&indexed);
        let functions_added = if functions.is_empty() { 0 } else { self.functions.insert_functions(&functions).await? };

        let stats = IndexStats { chunks: raw.len(), inserted, functions: functions_added };
        info!(chunks = stats.chunks, inserted = stats.inserted, functions = stats.functions, embedder = self.embedder.id(), "indexing complete");
        Ok(stats)
    }
}

/// Function definitions across all chunks, first occurrence of each name.
pub fn collect_functions(chunks: &[IndexedChunk]) -> Vec<FunctionDoc> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .flat_map(|c| {
            let chapter = c.chunk.metadata.chapter.clone();
            extract_function_definitions(&c.chunk.content).into_iter().map(move |d| d.into_doc(chapter.clone()))
        })
        .filter(|f| seen.insert(f.function_name.clone()))
        .collect()
}
