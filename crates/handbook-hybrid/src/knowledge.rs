//! Higher-level handbook operations built on the hybrid engine: expanded
//! search with a light re-rank, example extraction and code explanation.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use futures::future::join_all;
use handbook_core::error::Result;
use handbook_core::traits::FunctionIndex;
use handbook_core::types::{Category, CategoryFilter, FunctionDoc, SearchResult};
use handbook_text::code::{analyze_line, extract_example, extract_functions};
use handbook_text::{ComplexityFilter, Example, QueryExpander};
use tracing::debug;

use crate::engine::{HybridSearchEngine, HybridSearchRequest, SearchWeights};

const CALL_BONUS: f64 = 0.1;
const CODE_BONUS: f64 = 0.05;
const EXAMPLE_BONUS: f64 = 0.03;
const EXAMPLE_POOL: usize = 10;
const CONTEXT_RESULTS: usize = 5;
const FUNCTION_MATCHES: usize = 10;
const DOCUMENTED_FUNCTIONS: usize = 5;

pub struct KnowledgeBase {
    engine: Arc<HybridSearchEngine>,
    functions: Arc<dyn FunctionIndex>,
    expander: QueryExpander,
}

impl KnowledgeBase {
    pub fn new(engine: Arc<HybridSearchEngine>, functions: Arc<dyn FunctionIndex>, expander: QueryExpander) -> Self {
        Self { engine, functions, expander }
    }

    pub fn engine(&self) -> &Arc<HybridSearchEngine> { &self.engine }

    fn weights(&self) -> SearchWeights { self.engine.weights() }

    /// Synonym-expanded search over twice the limit, re-ranked with small
    /// bonuses for call sites of query words and for code/example chunks.
    pub async fn enhanced_search(&self, query: &str, limit: usize, category: CategoryFilter) -> Result<Vec<SearchResult>> {
        self.enhanced_search_with(query, limit, category, self.weights()).await
    }

    /// [`enhanced_search`](Self::enhanced_search) under caller-chosen weights.
    pub async fn enhanced_search_with(
        &self,
        query: &str,
        limit: usize,
        category: CategoryFilter,
        weights: SearchWeights,
    ) -> Result<Vec<SearchResult>> {
        let expanded = self.expander.expand(query);
        debug!(query, expanded = %expanded, "expanded query");
        let request = HybridSearchRequest::new(expanded, limit.saturating_mul(2), category, weights);
        let results = self.engine.hybrid_search(&request).await?;
        Ok(rerank(results, query, limit))
    }

    /// Examples around `topic` at the requested complexity.
    pub async fn get_examples(&self, topic: &str, complexity: ComplexityFilter) -> Result<Vec<Example>> {
        let request = HybridSearchRequest::new(
            format!("{topic} example code"),
            EXAMPLE_POOL,
            CategoryFilter::Only(Category::Example),
            self.weights(),
        );
        let results = self.engine.hybrid_search(&request).await?;
        Ok(results
            .iter()
            .filter_map(|r| extract_example(&r.content, &r.metadata))
            .filter(|ex| complexity.admits(ex.complexity))
            .collect())
    }

    pub async fn search_functions(&self, query: &str, limit: usize) -> Result<Vec<FunctionDoc>> {
        self.functions.search_functions(query, limit).await
    }

    /// Markdown walk-through of `code`: one line per assignment or call,
    /// documentation for the functions it uses, and related handbook pages.
    pub async fn explain_code(&self, code: &str, context: Option<&str>) -> Result<String> {
        let names = extract_functions(code);
        let lookups = join_all(names.iter().map(|name| self.functions.search_functions(name, FUNCTION_MATCHES))).await;
        let mut docs = Vec::new();
        for found in lookups { docs.extend(found?); }

        let request = HybridSearchRequest::new(
            format!("{code} {}", context.unwrap_or_default()),
            CONTEXT_RESULTS,
            CategoryFilter::Only(Category::Function),
            self.weights(),
        );
        let related = self.engine.hybrid_search(&request).await?;
        Ok(build_explanation(code, context, &docs, &related))
    }
}

/// Add the enhanced-search bonuses and sort. The sort is stable, so equal
/// adjusted scores keep store order.
pub fn rerank(results: Vec<SearchResult>, query: &str, limit: usize) -> Vec<SearchResult> {
    let words: Vec<String> = query.to_lowercase().split(' ').map(|w| format!("{w}(")).collect();
    let mut adjusted: Vec<SearchResult> = results
        .into_iter()
        .map(|mut r| {
            let calls = words.iter().filter(|w| r.content.contains(w.as_str())).count();
            let mut bonus = CALL_BONUS * calls as f64;
            if r.metadata.has_code == Some(true) { bonus += CODE_BONUS; }
            if r.metadata.has_example == Some(true) { bonus += EXAMPLE_BONUS; }
            r.score += bonus;
            r
        })
        .collect();
    adjusted.sort_by(|a, b| b.score.total_cmp(&a.score));
    adjusted.truncate(limit);
    adjusted
}

fn build_explanation(code: &str, context: Option<&str>, docs: &[FunctionDoc], related: &[SearchResult]) -> String {
    let mut out = String::from("# MAGMA Code Explanation\n\n");
    let _ = write!(out, "## Code:\n```magma\n{code}\n```\n\n");
    if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
        let _ = write!(out, "## Context:\n{ctx}\n\n");
    }

    out.push_str("## Analysis:\n");
    for line in code.lines().filter(|l| !l.trim().is_empty() && !l.trim().starts_with("//")) {
        if let Some(analysis) = analyze_line(line, docs) {
            let _ = writeln!(out, "- {analysis}");
        }
    }

    if !docs.is_empty() {
        out.push_str("\n## Function Documentation:\n");
        let mut seen = HashSet::new();
        for doc in docs.iter().filter(|d| seen.insert(d.function_name.as_str())).take(DOCUMENTED_FUNCTIONS) {
            let _ = writeln!(out, "\n### {}", doc.function_name);
            let _ = writeln!(out, "**Signature**: `{}`", doc.function_signature.as_deref().unwrap_or(&doc.function_name));
            let _ = writeln!(out, "**Description**: {}", doc.description.as_deref().unwrap_or("No description available"));
        }
    }

    if !related.is_empty() {
        out.push_str("\n## Related Handbook Sections:\n");
        for r in related {
            let _ = writeln!(out, "- {} (Page {})", r.metadata.source, r.metadata.page);
        }
    }
    out
}
