//! handbook-embed
//!
//! Embedding gateway implementations: a remote OpenAI-compatible client and a
//! deterministic hashing embedder for offline runs and tests.
use std::sync::Arc;

use handbook_core::config::{EmbeddingProvider, Settings};
use handbook_core::error::{Error, Result};
use handbook_core::traits::Embedder;
use tracing::info;

mod hash;
mod openai;

pub use hash::HashEmbedder;
pub use openai::OpenAiEmbedder;

/// `APP_USE_FAKE_EMBEDDINGS=1` forces the hashing embedder regardless of config.
pub fn get_default_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    let dim = settings.embedding.dimensions;
    if use_fake || settings.embedding.provider == EmbeddingProvider::Hash {
        info!(dim, "using hash embedder");
        return Ok(Arc::new(HashEmbedder::new(dim)));
    }
    let openai = settings
        .openai
        .as_ref()
        .ok_or_else(|| Error::InvalidConfig("[openai] section required for embeddings".to_string()))?;
    let embedder = OpenAiEmbedder::new(openai, &settings.embedding)?;
    info!(id = embedder.id(), "using remote embedder");
    Ok(Arc::new(embedder))
}
