//! handbook-hybrid
//!
//! Hybrid search with a TTL result cache, multi-query re-ranking, the
//! knowledge facade, ingestion and the quality benchmark.
pub mod benchmark;
pub mod cache;
pub mod engine;
pub mod generator;
pub mod indexer;
pub mod knowledge;
pub mod multi_query;

pub use cache::{CacheKey, Clock, ManualClock, ResultCache, SystemClock};
pub use engine::{HybridSearchEngine, HybridSearchRequest, SearchWeights};
pub use generator::OpenAiQueryGenerator;
pub use indexer::{IndexStats, Indexer};
pub use knowledge::KnowledgeBase;
pub use multi_query::{DocumentSearch, Fallback, MultiQueryOutcome, MultiQuerySearch, QueryPlan, RankedResult};
