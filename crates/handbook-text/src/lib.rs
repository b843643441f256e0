//! handbook-text
//!
//! Pure text heuristics over handbook content: normalization, categorization,
//! synonym expansion, metadata enrichment, and code/example extraction.
mod patterns;

pub mod categorize;
pub mod code;
pub mod enrich;
pub mod expand;
pub mod normalize;

pub use categorize::{Categorizer, CategoryRule};
pub use code::{Complexity, ComplexityFilter, Example, FunctionDefinition};
pub use enrich::{EnrichedChunk, Enricher};
pub use expand::QueryExpander;
pub use normalize::{clean_text, truncate_chars};
