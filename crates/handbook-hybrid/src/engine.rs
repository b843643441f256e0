//! Single-query hybrid search: embed, one fused store ranking, cache.

use std::sync::Arc;
use std::time::Duration;

use handbook_core::config::Settings;
use handbook_core::error::{Error, Result};
use handbook_core::traits::{Embedder, HybridStore};
use handbook_core::types::{CategoryFilter, HybridQuery, SearchResult, SearchType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{CacheKey, ResultCache};

/// Minimum vector similarity the store applies before fusion.
pub const SIMILARITY_THRESHOLD: f64 = 0.4;

fn check_weight(name: &str, w: f64) -> Result<()> {
    if (0.0..=1.0).contains(&w) { return Ok(()); }
    Err(Error::InvalidArgument(format!("{name} must be within [0, 1], got {w}")))
}

/// Weights for the hybrid channel. Semantic and keyword searches override them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchWeights {
    pub vector_weight: f64,
    pub bm25_weight: f64,
}

impl SearchWeights {
    pub fn new(vector_weight: f64, bm25_weight: f64) -> Result<Self> {
        check_weight("vector_weight", vector_weight)?;
        check_weight("bm25_weight", bm25_weight)?;
        Ok(Self { vector_weight, bm25_weight })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.search.vector_weight, settings.search.bm25_weight)
    }

    pub fn for_search_type(self, search_type: SearchType) -> Self {
        match search_type {
            SearchType::Semantic => Self { vector_weight: 1.0, bm25_weight: 0.0 },
            SearchType::Keyword => Self { vector_weight: 0.0, bm25_weight: 1.0 },
            SearchType::Hybrid => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridSearchRequest {
    pub query: String,
    pub limit: usize,
    #[serde(default)]
    pub category: CategoryFilter,
    pub vector_weight: f64,
    pub bm25_weight: f64,
}

impl HybridSearchRequest {
    pub fn new(query: impl Into<String>, limit: usize, category: CategoryFilter, weights: SearchWeights) -> Self {
        Self {
            query: query.into(),
            limit,
            category,
            vector_weight: weights.vector_weight,
            bm25_weight: weights.bm25_weight,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(Error::InvalidArgument("limit must be at least 1".to_string()));
        }
        check_weight("vector_weight", self.vector_weight)?;
        check_weight("bm25_weight", self.bm25_weight)
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.query, self.limit, self.category, self.vector_weight, self.bm25_weight)
    }
}

pub struct HybridSearchEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn HybridStore>,
    cache: ResultCache,
    weights: SearchWeights,
    threshold: f64,
}

impl HybridSearchEngine {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn HybridStore>, cache: ResultCache, weights: SearchWeights) -> Self {
        Self { embedder, store, cache, weights, threshold: SIMILARITY_THRESHOLD }
    }

    /// Engine with cache, weights and threshold taken from config.
    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>, store: Arc<dyn HybridStore>) -> Result<Self> {
        let cache = ResultCache::new(Duration::from_secs(settings.cache.ttl_secs)).with_max_entries(settings.cache.max_entries);
        let engine = Self::new(embedder, store, cache, SearchWeights::from_settings(settings)?)
            .with_threshold(settings.search.similarity_threshold);
        info!(embedder = engine.embedder.id(), ttl_secs = settings.cache.ttl_secs, "hybrid search engine ready");
        Ok(engine)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn weights(&self) -> SearchWeights { self.weights }

    pub fn cache(&self) -> &ResultCache { &self.cache }

    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

    /// One fused ranking for `request`. Scores and order come from the store
    /// unchanged. Failures propagate and leave the cache untouched.
    pub async fn hybrid_search(&self, request: &HybridSearchRequest) -> Result<Vec<SearchResult>> {
        request.validate()?;
        let key = request.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            debug!(query = %request.query, n = hit.len(), "cache hit");
            return Ok(hit);
        }

        let vector = self.embedder.embed(&request.query).await?;
        let query = HybridQuery {
            text: request.query.clone(),
            vector,
            threshold: self.threshold,
            bm25_weight: request.bm25_weight,
            vector_weight: request.vector_weight,
            limit: request.limit,
            category_filter: request.category.category(),
        };
        let rows = self.store.hybrid_query(&query).await?;
        let results: Vec<SearchResult> = rows.into_iter().map(SearchResult::from).collect();
        debug!(query = %request.query, n = results.len(), category = %request.category, "hybrid search");

        self.cache.put(key, results.clone());
        Ok(results)
    }

    /// Category-agnostic search with weights chosen by `search_type`.
    pub async fn search_documents(&self, query: &str, limit: usize, search_type: SearchType) -> Result<Vec<SearchResult>> {
        let request = HybridSearchRequest::new(query, limit, CategoryFilter::All, self.weights.for_search_type(search_type));
        self.hybrid_search(&request).await
    }
}
