//! Retrieval quality benchmark over a fixed set of handbook queries.

use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use handbook_core::error::{Error, Result};
use handbook_core::traits::FunctionIndex;
use handbook_core::types::{Category, CategoryFilter, SearchResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{HybridSearchEngine, HybridSearchRequest};

const RESULTS_PER_QUERY: usize = 5;
const FUNCTION_MATCHES: usize = 3;
const TERM_WEIGHT: f64 = 0.6;
const FUNCTION_WEIGHT: f64 = 0.4;
const FAST_MS: u64 = 1_000;
const SLOW_MS: u64 = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// `all`, or one difficulty level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DifficultyFilter {
    #[default]
    All,
    Only(Difficulty),
}

impl DifficultyFilter {
    pub fn admits(self, d: Difficulty) -> bool {
        match self {
            DifficultyFilter::All => true,
            DifficultyFilter::Only(want) => want == d,
        }
    }
}

impl FromStr for DifficultyFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s == "all" { return Ok(DifficultyFilter::All); }
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .map(DifficultyFilter::Only)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown difficulty '{s}'")))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BenchmarkQuery {
    pub query: &'static str,
    pub expected_terms: &'static [&'static str],
    pub expected_category: Option<Category>,
    pub expected_functions: &'static [&'static str],
    pub description: &'static str,
    pub difficulty: Difficulty,
}

const fn q(
    query: &'static str,
    expected_terms: &'static [&'static str],
    expected_category: Option<Category>,
    expected_functions: &'static [&'static str],
    description: &'static str,
    difficulty: Difficulty,
) -> BenchmarkQuery {
    BenchmarkQuery { query, expected_terms, expected_category, expected_functions, description, difficulty }
}

use Difficulty::{Easy, Hard, Medium};

pub const QUERIES: &[BenchmarkQuery] = &[
    q("Hamming code generator matrix", &["hamming", "generator", "matrix", "code"], Some(Category::Function), &["HammingCode", "GeneratorMatrix"], "Basic coding theory - Hamming codes", Easy),
    q("Reed Solomon error correction", &["reed", "solomon", "error", "correction"], Some(Category::Algorithm), &[], "Advanced coding theory", Medium),
    q("BCH code construction polynomial", &["bch", "construction", "polynomial"], None, &[], "Complex coding theory concepts", Hard),
    q("permutation group symmetric alternating", &["permutation", "group", "symmetric", "alternating"], None, &["PermutationGroup", "SymmetricGroup", "AlternatingGroup"], "Basic group theory", Easy),
    q("Sylow subgroup computation", &["sylow", "subgroup"], None, &["SylowSubgroup"], "Intermediate group theory", Medium),
    q("group cohomology calculation", &["cohomology", "group"], None, &[], "Advanced group theory", Hard),
    q("integer factorization algorithm", &["integer", "factorization", "algorithm"], None, &["Factorization", "FactorInteger"], "Basic number theory", Easy),
    q("quadratic residue legendre symbol", &["quadratic", "residue", "legendre"], None, &[], "Intermediate number theory", Medium),
    q("L-function analytic continuation", &["function", "analytic", "continuation"], None, &[], "Advanced number theory", Hard),
    q("elliptic curve point addition", &["elliptic", "curve", "point", "addition"], None, &["EllipticCurve", "Points"], "Basic algebraic geometry", Easy),
    q("jacobian variety divisor class", &["jacobian", "variety", "divisor"], None, &[], "Intermediate algebraic geometry", Medium),
    q("motives categorical framework", &["motives", "categorical"], None, &[], "Advanced algebraic geometry", Hard),
    q("matrix eigenvalue computation", &["matrix", "eigenvalue", "computation"], None, &["Eigenvalues", "Matrix"], "Basic linear algebra", Easy),
    q("jordan normal form decomposition", &["jordan", "normal", "form"], None, &[], "Intermediate linear algebra", Medium),
    q("polynomial ring ideal computation", &["polynomial", "ring", "ideal"], None, &["PolynomialRing", "Ideal"], "Basic commutative algebra", Easy),
    q("Groebner basis algorithm", &["groebner", "basis", "algorithm"], None, &[], "Intermediate commutative algebra", Medium),
    q("GF finite field arithmetic", &["finite", "field", "arithmetic"], None, &["GF"], "Finite field construction", Easy),
    q("IsIrreducible polynomial test", &["irreducible", "polynomial"], None, &["IsIrreducible"], "Polynomial irreducibility testing", Easy),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub query: String,
    pub difficulty: Difficulty,
    pub relevance: f64,
    pub speed_ms: u64,
    pub found_terms: Vec<String>,
    pub found_functions: Vec<String>,
    pub top_score: f64,
    pub result_count: usize,
    pub category: String,
}

/// `0.6 * term ratio + 0.4 * function ratio`; the function ratio is 1 when
/// no functions are expected.
pub fn relevance(found_terms: usize, expected_terms: usize, found_functions: usize, expected_functions: usize) -> f64 {
    let ratio = |found: usize, expected: usize| if expected == 0 { 1.0 } else { found as f64 / expected as f64 };
    TERM_WEIGHT * ratio(found_terms, expected_terms) + FUNCTION_WEIGHT * ratio(found_functions, expected_functions)
}

/// Expected terms that occur, case-insensitively, anywhere in the results.
pub fn find_terms(results: &[SearchResult], expected: &[&str]) -> Vec<String> {
    let haystack = results.iter().map(|r| r.content.to_lowercase()).collect::<Vec<_>>().join(" ");
    expected.iter().filter(|t| haystack.contains(&t.to_lowercase())).map(|t| (*t).to_string()).collect()
}

pub struct QualityBenchmark {
    engine: Arc<HybridSearchEngine>,
    functions: Arc<dyn FunctionIndex>,
    queries: Vec<BenchmarkQuery>,
}

impl QualityBenchmark {
    pub fn new(engine: Arc<HybridSearchEngine>, functions: Arc<dyn FunctionIndex>) -> Self {
        Self { engine, functions, queries: QUERIES.to_vec() }
    }

    pub fn with_queries(mut self, queries: Vec<BenchmarkQuery>) -> Self {
        self.queries = queries;
        self
    }

    pub async fn run(&self, filter: DifficultyFilter) -> Result<BenchmarkReport> {
        let selected: Vec<&BenchmarkQuery> = self.queries.iter().filter(|q| filter.admits(q.difficulty)).collect();
        let mut results = Vec::with_capacity(selected.len());
        for (i, query) in selected.iter().enumerate() {
            let result = self.evaluate(query).await?;
            info!(
                n = i + 1,
                total = selected.len(),
                query = query.query,
                relevance = result.relevance,
                speed_ms = result.speed_ms,
                "benchmark query"
            );
            results.push(result);
        }
        Ok(BenchmarkReport { results })
    }

    async fn evaluate(&self, query: &BenchmarkQuery) -> Result<BenchmarkResult> {
        let category = query.expected_category.map_or(CategoryFilter::All, CategoryFilter::Only);
        let request = HybridSearchRequest::new(query.query, RESULTS_PER_QUERY, category, self.engine.weights());
        let started = Instant::now();
        let results = self.engine.hybrid_search(&request).await?;
        let speed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let found_terms = find_terms(&results, query.expected_terms);
        let mut found_functions = Vec::new();
        for name in query.expected_functions {
            if !self.functions.search_functions(name, FUNCTION_MATCHES).await?.is_empty() {
                found_functions.push((*name).to_string());
            }
        }

        Ok(BenchmarkResult {
            query: query.query.to_string(),
            difficulty: query.difficulty,
            relevance: relevance(found_terms.len(), query.expected_terms.len(), found_functions.len(), query.expected_functions.len()),
            speed_ms,
            found_terms,
            found_functions,
            top_score: results.first().map_or(0.0, |r| r.score),
            result_count: results.len(),
            category: query.expected_category.map_or_else(|| "general".to_string(), |c| c.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub results: Vec<BenchmarkResult>,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn pct(part: usize, whole: usize) -> f64 { if whole == 0 { 0.0 } else { part as f64 * 100.0 / whole as f64 } }

impl BenchmarkReport {
    pub fn average_relevance(&self) -> f64 { mean(self.results.iter().map(|r| r.relevance)) }

    pub fn average_speed_ms(&self) -> f64 { mean(self.results.iter().map(|r| r.speed_ms as f64)) }

    pub fn average_results(&self) -> f64 { mean(self.results.iter().map(|r| r.result_count as f64)) }

    /// Mean relevance and query count per difficulty that has results.
    pub fn by_difficulty(&self) -> Vec<(Difficulty, f64, usize)> {
        Difficulty::ALL
            .into_iter()
            .filter_map(|d| {
                let group: Vec<&BenchmarkResult> = self.results.iter().filter(|r| r.difficulty == d).collect();
                (!group.is_empty()).then(|| (d, mean(group.iter().map(|r| r.relevance)), group.len()))
            })
            .collect()
    }

    /// Results by descending relevance; ties keep fixture order.
    pub fn ranked(&self) -> Vec<&BenchmarkResult> {
        let mut sorted: Vec<&BenchmarkResult> = self.results.iter().collect();
        sorted.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        sorted
    }

    pub fn recommendations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.average_relevance() < 0.7 {
            out.push("Relevance below 70% - consider improving embeddings or chunking".to_string());
        }
        if self.average_speed_ms() > 2_000.0 {
            out.push("Average response time >2s - consider caching or indexing improvements".to_string());
        }
        if self.by_difficulty().iter().any(|(d, avg, _)| *d == Difficulty::Hard && *avg < 0.5) {
            out.push("Hard queries performing poorly - need advanced query processing".to_string());
        }
        let excellent = self.results.iter().filter(|r| r.relevance > 0.8).count();
        if !self.results.is_empty() && pct(excellent, self.results.len()) > 70.0 {
            out.push(format!("Excellent performance! {excellent}/{} queries above 80% relevance", self.results.len()));
        }
        out
    }

    pub fn render(&self) -> String {
        let total = self.results.len();
        let mut out = String::new();
        let _ = writeln!(out, "BENCHMARK RESULTS SUMMARY\n{}", "=".repeat(60));
        if total == 0 {
            out.push_str("No benchmark queries matched the selected difficulty.\n");
            return out;
        }

        let _ = writeln!(out, "OVERALL PERFORMANCE:");
        let _ = writeln!(out, "   Average Relevance Score: {:.1}%", self.average_relevance() * 100.0);
        let _ = writeln!(out, "   Average Response Time: {:.0}ms", self.average_speed_ms());
        let _ = writeln!(out, "   Average Results per Query: {:.1}\n", self.average_results());

        let _ = writeln!(out, "PERFORMANCE BY DIFFICULTY:");
        for (d, avg, n) in self.by_difficulty() {
            let _ = writeln!(out, "   {}: {:.1}% relevance ({n} queries)", d.as_str().to_uppercase(), avg * 100.0);
        }

        let ranked = self.ranked();
        let _ = writeln!(out, "\nTOP PERFORMING QUERIES:");
        for (i, r) in ranked.iter().take(5).enumerate() {
            let _ = writeln!(out, "   {}. \"{}\" - {:.1}%", i + 1, r.query, r.relevance * 100.0);
        }
        let _ = writeln!(out, "\nQUERIES NEEDING IMPROVEMENT:");
        for (i, r) in ranked.iter().rev().take(5).enumerate() {
            let _ = writeln!(out, "   {}. \"{}\" - {:.1}%", i + 1, r.query, r.relevance * 100.0);
        }

        let fast = self.results.iter().filter(|r| r.speed_ms < FAST_MS).count();
        let slow = self.results.iter().filter(|r| r.speed_ms > SLOW_MS).count();
        let _ = writeln!(out, "\nSPEED ANALYSIS:");
        let _ = writeln!(out, "   Fast queries (<1s): {fast}/{total} ({:.1}%)", pct(fast, total));
        let _ = writeln!(out, "   Slow queries (>3s): {slow}/{total} ({:.1}%)", pct(slow, total));

        let _ = writeln!(out, "\nRECOMMENDATIONS:");
        for rec in self.recommendations() {
            let _ = writeln!(out, "   - {rec}");
        }
        let _ = writeln!(out, "\n{}", "=".repeat(60));
        out
    }
}
