//! Markdown rendering of tool results. Rendering never reorders results or
//! touches their scores.

use std::fmt::Write as _;

use handbook_core::types::{CategoryFilter, FunctionDoc, SearchResult, SearchType};
use handbook_hybrid::benchmark::BenchmarkReport;
use handbook_hybrid::{Fallback, MultiQueryOutcome, QueryPlan};
use handbook_text::{ComplexityFilter, Example};

fn push_result(out: &mut String, index: usize, result: &SearchResult, query_count: Option<u32>) {
    let m = &result.metadata;
    let _ = writeln!(out, "## Result {}", index + 1);
    let _ = writeln!(out, "**Source**: {} (Page {})", m.source, m.page);
    let _ = writeln!(out, "**Category**: {}", m.category);
    match (result.vector_similarity, result.bm25_score) {
        (Some(v), Some(b)) => {
            let _ = writeln!(out, "**Scores**: Combined {:.3} (Vector: {v:.3}, BM25: {b:.3})", result.score);
        }
        _ => {
            let _ = writeln!(out, "**Relevance Score**: {:.3}", result.score);
        }
    }
    if let Some(n) = query_count {
        let _ = writeln!(out, "**Matched Queries**: {n}");
    }
    if m.has_code == Some(true) {
        out.push_str("**Contains Code**: ✅\n");
    }
    if m.has_example == Some(true) {
        out.push_str("**Contains Examples**: ✅\n");
    }
    let _ = write!(out, "\n{}\n\n---\n\n", result.content.trim());
}

pub fn search_results(query: &str, search_type: SearchType, category: CategoryFilter, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results found for query: \"{query}\"");
    }
    let mut out = format!("# Search Results for \"{query}\"\n\n");
    let _ = writeln!(out, "**Search Type**: {search_type}");
    let _ = writeln!(out, "**Category Filter**: {category}");
    let _ = writeln!(out, "**Found**: {} results\n", results.len());
    for (i, r) in results.iter().enumerate() {
        push_result(&mut out, i, r, None);
    }
    out
}

pub fn multi_query_results(query: &str, search_type: SearchType, outcome: &MultiQueryOutcome) -> String {
    if outcome.results.is_empty() {
        return format!("No results found for query: \"{query}\"");
    }
    let mut out = format!("# Multi-Query Search Results for \"{query}\"\n\n");
    let _ = writeln!(out, "**Search Type**: {search_type}");
    match &outcome.plan {
        QueryPlan::Alternatives(queries) => {
            let _ = writeln!(out, "**Generated Queries**: {}", queries.len());
            for q in queries {
                let _ = writeln!(out, "- {q}");
            }
        }
        QueryPlan::OriginalOnly => out.push_str("**Generated Queries**: none, original question only\n"),
    }
    if let Some(Fallback::FanOutFailed(reason)) = &outcome.fallback {
        let _ = writeln!(out, "**Fallback**: single query ({reason})");
    }
    let _ = writeln!(out, "**Found**: {} results\n", outcome.results.len());
    for (i, r) in outcome.results.iter().enumerate() {
        let count = matches!(outcome.plan, QueryPlan::Alternatives(_)) && outcome.fallback.is_none();
        push_result(&mut out, i, &r.result, count.then_some(r.query_count));
    }
    out
}

pub fn function_results(name: &str, results: &[FunctionDoc]) -> String {
    if results.is_empty() {
        return format!("No functions found matching: \"{name}\"");
    }
    let mut out = format!("# Function Search Results for \"{name}\"\n\n");
    let _ = writeln!(out, "Found {} matching functions:\n", results.len());
    for (i, f) in results.iter().enumerate() {
        let _ = writeln!(out, "## {}. {}", i + 1, f.function_name);
        if let Some(score) = f.similarity_score {
            let _ = writeln!(out, "**Similarity**: {score:.3}");
        }
        if let Some(sig) = &f.function_signature {
            let _ = writeln!(out, "**Signature**: `{sig}`");
        }
        if let Some(desc) = &f.description {
            let _ = writeln!(out, "**Description**: {desc}");
        }
        if let Some(cat) = &f.category {
            let _ = writeln!(out, "**Category**: {cat}");
        }
        out.push('\n');
    }
    out
}

pub fn examples(topic: &str, complexity: ComplexityFilter, include_code: bool, examples: &[Example]) -> String {
    let level = String::from(complexity);
    if examples.is_empty() {
        return format!("No examples found for topic: \"{topic}\" (complexity: {level})");
    }
    let mut out = format!("# MAGMA Examples for \"{topic}\"\n\n");
    let _ = writeln!(out, "**Complexity Level**: {level}");
    let _ = writeln!(out, "**Found**: {} examples\n", examples.len());
    for (i, ex) in examples.iter().enumerate() {
        let _ = writeln!(out, "## Example {}: {}", i + 1, ex.title);
        let _ = writeln!(out, "**Complexity**: {}", ex.complexity);
        let _ = writeln!(out, "**Source**: {} (Page {})\n", ex.source, ex.page);
        if include_code && !ex.code.is_empty() {
            let _ = write!(out, "```magma\n{}\n```\n\n", ex.code);
        }
        if !ex.explanation.is_empty() {
            let _ = write!(out, "**Explanation**: {}\n\n", ex.explanation);
        }
        out.push_str("---\n\n");
    }
    out
}

pub fn benchmark(report: &BenchmarkReport) -> String {
    format!("# Quality Benchmark Results\n\n```\n{}```", report.render())
}
