//! Command-line surface of `handbook-cli`.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use handbook_core::config::{expand_path, Config, Settings};
use handbook_core::data_processor::{ChunkingConfig, DataProcessor};
use handbook_core::types::{CategoryFilter, SearchType};
use handbook_hybrid::benchmark::{DifficultyFilter, QualityBenchmark};
use handbook_hybrid::{HybridSearchRequest, IndexStats, Indexer, SearchWeights};
use handbook_mcp::format;
use tracing::debug;

use crate::App;

#[derive(Debug, Parser)]
#[command(name = "handbook-cli")]
#[command(about = "Hybrid retrieval over the MAGMA handbook")]
#[command(version)]
pub struct Cli {
    /// Configuration file; defaults to config.toml plus the RUST_ENV overlay
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Chunk, enrich, embed and store the handbook text files
    Ingest {
        /// Directory of .txt files (defaults to data.raw_txt_dir)
        data_dir: Option<PathBuf>,

        /// Only process the first N files
        #[arg(short, long)]
        limit: Option<usize>,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run one hybrid search
    Query {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,

        /// all, syntax, function, algorithm, example, theory, general
        #[arg(short, long, default_value = "all")]
        category: CategoryFilter,

        /// hybrid, semantic (vector) or keyword (bm25)
        #[arg(short = 't', long, default_value = "hybrid", value_parser = parse_search_type)]
        search_type: SearchType,

        #[arg(long)]
        vector_weight: Option<f64>,

        #[arg(long)]
        bm25_weight: Option<f64>,

        /// Expand synonyms and re-rank for code and examples
        #[arg(short, long)]
        enhanced: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search with LLM-generated alternative phrasings
    Multi {
        question: String,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(short = 't', long, default_value = "hybrid", value_parser = parse_search_type)]
        search_type: SearchType,

        #[arg(long)]
        json: bool,
    },

    /// Look up function documentation by name
    Functions {
        name: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Run the built-in retrieval quality benchmark
    Benchmark {
        /// all, easy, medium or hard
        #[arg(short, long, default_value = "all")]
        difficulty: DifficultyFilter,
    },

    /// Print store and engine status as JSON
    Health,
}

pub fn parse_search_type(s: &str) -> Result<SearchType, String> {
    serde_json::from_value(serde_json::Value::String(s.trim().to_ascii_lowercase()))
        .map_err(|_| format!("unknown search type '{s}' (expected hybrid, semantic, keyword, vector or bm25)"))
}

impl Cli {
    pub fn load_settings(&self) -> Result<Settings> {
        let config = match &self.config {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                Config::from_figment(Figment::new().merge(Toml::file(path)).merge(Env::prefixed("APP_").split("__")))
            }
            None => Config::load()?,
        };
        debug!(env = config.env_name(), "loading settings");
        Ok(config.settings()?)
    }
}

pub async fn ingest(app: &App, data_dir: &Path, limit: Option<usize>, progress: bool) -> Result<IndexStats> {
    let chunking = ChunkingConfig {
        max_tokens: app.settings.data.chunk_max_tokens,
        overlap_percent: app.settings.data.overlap_percent,
    };
    let processor = DataProcessor::with_config(chunking);
    let chunks = match limit {
        Some(n) => processor.process_directory_limited(data_dir, n)?,
        None => processor.process_directory(data_dir)?,
    };
    let indexer = Indexer::new(app.embedder.clone(), app.backend.sink.clone(), app.backend.functions.clone())
        .with_progress(progress);
    Ok(indexer.index(&chunks).await?)
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = cli.load_settings()?;
    let app = App::new(settings)?;
    let default_limit = app.settings.search.default_limit;

    match cli.command {
        Commands::Ingest { data_dir, limit, quiet } => {
            let data_dir = data_dir.unwrap_or_else(|| expand_path(&app.settings.data.raw_txt_dir));
            println!("Handbook Indexer\n================");
            println!("Data directory: {}", data_dir.display());
            if let Some(n) = limit {
                println!("🔢 Limiting to {n} files");
            }
            let stats = ingest(&app, &data_dir, limit, !quiet).await?;
            println!("\n✅ Indexing completed successfully!");
            println!("📊 Processed {} chunks, stored {}", stats.chunks, stats.inserted);
            println!("📊 Indexed {} function definitions", stats.functions);
        }
        Commands::Query { query, limit, category, search_type, vector_weight, bm25_weight, enhanced, json } => {
            let limit = limit.unwrap_or(default_limit);
            check_limit(&app, limit)?;
            let results = if enhanced {
                app.knowledge.enhanced_search(&query, limit, category).await?
            } else {
                let defaults = app.engine.weights();
                let weights = SearchWeights::new(
                    vector_weight.unwrap_or(defaults.vector_weight),
                    bm25_weight.unwrap_or(defaults.bm25_weight),
                )?
                .for_search_type(search_type);
                app.engine.hybrid_search(&HybridSearchRequest::new(query.as_str(), limit, category, weights)).await?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("{}", format::search_results(&query, search_type, category, &results));
            }
        }
        Commands::Multi { question, limit, search_type, json } => {
            let limit = limit.unwrap_or(default_limit);
            check_limit(&app, limit)?;
            let multi = app.multi_query()?.context("multi-query search needs an [openai] section in the config")?;
            let outcome = multi.run(&question, limit, search_type).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.into_results())?);
            } else {
                println!("{}", format::multi_query_results(&question, search_type, &outcome));
            }
        }
        Commands::Functions { name, limit } => {
            let functions = app.knowledge.search_functions(&name, limit).await?;
            println!("{}", format::function_results(&name, &functions));
        }
        Commands::Benchmark { difficulty } => {
            let benchmark = QualityBenchmark::new(app.engine.clone(), Arc::clone(&app.backend.functions));
            let report = benchmark.run(difficulty).await?;
            print!("{}", report.render());
        }
        Commands::Health => {
            let health = app.tools()?.health().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }
    Ok(())
}

fn check_limit(app: &App, limit: usize) -> Result<()> {
    let max = app.settings.search.max_limit;
    if limit == 0 || limit > max {
        bail!("limit must be between 1 and {max}, got {limit}");
    }
    Ok(())
}
