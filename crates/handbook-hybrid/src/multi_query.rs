//! Multi-query re-ranking.
//!
//! Two stages, each with its own fallback:
//! 1. plan: alternative phrasings from a [`QueryGenerator`], or the question alone;
//! 2. fan-out: one search per phrasing at half the limit, merged by identity.
//!
//! A phrasing whose search fails is skipped. A plan without alternatives, or
//! a fan-out where every phrasing failed, resolves to a single search for the
//! original question at the full limit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use handbook_core::error::{Error, Result};
use handbook_core::traits::QueryGenerator;
use handbook_core::types::{SearchResult, SearchType};
use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::HybridSearchEngine;

pub const MAX_QUERIES: usize = 5;
const SCORE_WEIGHT: f64 = 0.7;
const COUNT_WEIGHT: f64 = 0.3;

/// The single-query path the fan-out runs through.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    async fn search_documents(&self, query: &str, limit: usize, search_type: SearchType) -> Result<Vec<SearchResult>>;
}

#[async_trait]
impl DocumentSearch for HybridSearchEngine {
    async fn search_documents(&self, query: &str, limit: usize, search_type: SearchType) -> Result<Vec<SearchResult>> {
        HybridSearchEngine::search_documents(self, query, limit, search_type).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "queries", rename_all = "snake_case")]
pub enum QueryPlan {
    Alternatives(Vec<String>),
    OriginalOnly,
}

impl QueryPlan {
    /// Keep trimmed, non-empty phrasings, at most `max`. A generator error
    /// or an empty list plans the original question alone.
    pub fn from_generated(generated: Result<Vec<String>>, max: usize) -> Self {
        let phrasings = match generated {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "query generation failed; using the original question");
                return QueryPlan::OriginalOnly;
            }
        };
        let kept: Vec<String> = phrasings
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .take(max)
            .map(str::to_string)
            .collect();
        if kept.is_empty() { QueryPlan::OriginalOnly } else { QueryPlan::Alternatives(kept) }
    }
}

/// Why the answer came from the single-query path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    NoAlternatives,
    FanOutFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    #[serde(flatten)]
    pub result: SearchResult,
    pub query_count: u32,
}

impl RankedResult {
    pub fn ranking_key(&self) -> f64 { SCORE_WEIGHT * self.result.score + COUNT_WEIGHT * f64::from(self.query_count) }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiQueryOutcome {
    pub plan: QueryPlan,
    pub fallback: Option<Fallback>,
    pub results: Vec<RankedResult>,
}

impl MultiQueryOutcome {
    pub fn into_results(self) -> Vec<SearchResult> { self.results.into_iter().map(|r| r.result).collect() }
}

#[derive(Hash, PartialEq, Eq)]
enum Identity {
    Id(String),
    Position(usize),
}

/// Merge per-query lists in order. A repeated identity bumps `query_count`
/// and keeps the highest score; results without an id never merge.
pub fn dedup(lists: Vec<Vec<SearchResult>>) -> Vec<RankedResult> {
    let mut merged: Vec<RankedResult> = Vec::new();
    let mut index: HashMap<Identity, usize> = HashMap::new();
    for (position, result) in lists.into_iter().flatten().enumerate() {
        let identity = result.identity().map_or(Identity::Position(position), |id| Identity::Id(id.to_string()));
        match index.get(&identity) {
            Some(&i) => {
                let seen = &mut merged[i];
                seen.query_count += 1;
                if result.score > seen.result.score { seen.result.score = result.score; }
            }
            None => {
                index.insert(identity, merged.len());
                merged.push(RankedResult { result, query_count: 1 });
            }
        }
    }
    merged
}

/// Stable sort on `0.7 * score + 0.3 * query_count`, then truncate.
pub fn rank(mut merged: Vec<RankedResult>, limit: usize) -> Vec<RankedResult> {
    merged.sort_by(|a, b| b.ranking_key().total_cmp(&a.ranking_key()));
    merged.truncate(limit);
    merged
}

pub struct MultiQuerySearch {
    search: Arc<dyn DocumentSearch>,
    generator: Arc<dyn QueryGenerator>,
    max_queries: usize,
}

impl MultiQuerySearch {
    pub fn new(search: Arc<dyn DocumentSearch>, generator: Arc<dyn QueryGenerator>) -> Self {
        Self { search, generator, max_queries: MAX_QUERIES }
    }

    pub fn with_max_queries(mut self, max_queries: usize) -> Self {
        self.max_queries = max_queries.max(1);
        self
    }

    pub async fn multi_query_search(&self, question: &str, limit: usize, search_type: SearchType) -> Result<Vec<SearchResult>> {
        Ok(self.run(question, limit, search_type).await?.into_results())
    }

    /// Full pipeline, reporting the plan and any fallback taken.
    pub async fn run(&self, question: &str, limit: usize, search_type: SearchType) -> Result<MultiQueryOutcome> {
        if limit == 0 {
            return Err(Error::InvalidArgument("limit must be at least 1".to_string()));
        }
        let plan = QueryPlan::from_generated(self.generator.generate_alternatives(question).await, self.max_queries);
        let QueryPlan::Alternatives(queries) = plan.clone() else {
            let results = self.single(question, limit, search_type).await?;
            return Ok(MultiQueryOutcome { plan, fallback: Some(Fallback::NoAlternatives), results });
        };

        match self.fan_out(&queries, limit.div_ceil(2), search_type).await {
            Ok(lists) => {
                let results = rank(dedup(lists), limit);
                debug!(queries = queries.len(), n = results.len(), "multi-query search");
                Ok(MultiQueryOutcome { plan, fallback: None, results })
            }
            Err(e) => {
                warn!(error = %e, "every phrasing search failed; falling back to a single query");
                let results = self.single(question, limit, search_type).await?;
                Ok(MultiQueryOutcome { plan, fallback: Some(Fallback::FanOutFailed(e.to_string())), results })
            }
        }
    }

    /// Successful per-phrasing lists in phrasing order. Errs only when every
    /// phrasing failed, with the last failure.
    async fn fan_out(&self, queries: &[String], per_query: usize, search_type: SearchType) -> Result<Vec<Vec<SearchResult>>> {
        let outcomes = join_all(queries.iter().map(|q| self.search.search_documents(q, per_query, search_type))).await;
        let mut lists = Vec::with_capacity(outcomes.len());
        let mut last_error = None;
        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(list) => lists.push(list),
                Err(e) => {
                    warn!(query = %query, error = %e, "phrasing search failed; skipping it");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if lists.is_empty() => Err(e),
            _ => Ok(lists),
        }
    }

    async fn single(&self, question: &str, limit: usize, search_type: SearchType) -> Result<Vec<RankedResult>> {
        let results = self.search.search_documents(question, limit, search_type).await?;
        Ok(results.into_iter().map(|result| RankedResult { result, query_count: 1 }).collect())
    }
}
