//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_SUPABASE__URL`). The typed view is
//! [`Settings`]; untyped lookups go through [`Config::get`].

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment, env_name: env_name.to_string() })
    }

    /// Wrap an already-assembled figment (tests, embedding in other apps).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment, env_name: "custom".to_string() }
    }

    pub fn env_name(&self) -> &str { &self.env_name }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Extract and validate the typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub search: SearchSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub supabase: Option<SupabaseSettings>,
    #[serde(default)]
    pub openai: Option<OpenAiSettings>,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub vocabulary: VocabularySettings,
}

/// Retrieval weights carry no built-in default: they must come from config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    pub vector_weight: f64,
    pub bm25_weight: f64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub max_entries: Option<usize>,
}

impl Default for CacheSettings {
    fn default() -> Self { Self { ttl_secs: default_ttl_secs(), max_entries: None } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Local,
    Supabase,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    /// On-disk tantivy directory for the local store; in-memory when unset.
    #[serde(default)]
    pub index_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    OpenAi,
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub provider: EmbeddingProvider,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: EmbeddingProvider::default(), model: default_embedding_model(), dimensions: default_dimensions() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseSettings {
    pub url: String,
    pub key: String,
    #[serde(default = "default_documents_table")]
    pub documents_table: String,
    #[serde(default = "default_functions_table")]
    pub functions_table: String,
    #[serde(default = "default_hybrid_function")]
    pub hybrid_function: String,
    #[serde(default = "default_function_search_function")]
    pub function_search_function: String,
    #[serde(default = "default_function_similarity_threshold")]
    pub function_similarity_threshold: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    #[serde(default = "default_raw_txt_dir")]
    pub raw_txt_dir: String,
    #[serde(default = "default_max_tokens")]
    pub chunk_max_tokens: usize,
    #[serde(default = "default_overlap_percent")]
    pub overlap_percent: f32,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { raw_txt_dir: default_raw_txt_dir(), chunk_max_tokens: default_max_tokens(), overlap_percent: default_overlap_percent() }
    }
}

/// Optional replacement for the built-in synonym table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularySettings {
    #[serde(default)]
    pub synonyms: Option<BTreeMap<String, Vec<String>>>,
}

impl Settings {
    fn validate(&self) -> Result<()> {
        for (name, w) in [("search.vector_weight", self.search.vector_weight), ("search.bm25_weight", self.search.bm25_weight)] {
            if !(0.0..=1.0).contains(&w) {
                return Err(Error::InvalidConfig(format!("{name} must be within [0, 1], got {w}")));
            }
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(Error::InvalidConfig(format!(
                "search.default_limit must be in 1..={}, got {}",
                self.search.max_limit, self.search.default_limit
            )));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::InvalidConfig("cache.ttl_secs must be positive".to_string()));
        }
        if self.store.backend == StoreBackend::Supabase && self.supabase.is_none() {
            return Err(Error::InvalidConfig("store.backend = \"supabase\" requires a [supabase] section".to_string()));
        }
        if self.embedding.provider == EmbeddingProvider::OpenAi && self.openai.is_none() {
            return Err(Error::InvalidConfig("embedding.provider = \"openai\" requires an [openai] section".to_string()));
        }
        Ok(())
    }
}

fn default_limit() -> usize { 5 }
fn default_max_limit() -> usize { 50 }
fn default_similarity_threshold() -> f64 { 0.4 }
fn default_max_queries() -> usize { 5 }
fn default_ttl_secs() -> u64 { 60 * 60 }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_dimensions() -> usize { 1536 }
fn default_documents_table() -> String { "magma_documents_v2".to_string() }
fn default_functions_table() -> String { "magma_functions".to_string() }
fn default_hybrid_function() -> String { "search_magma_hybrid".to_string() }
fn default_function_search_function() -> String { "search_magma_functions".to_string() }
fn default_function_similarity_threshold() -> f64 { 0.3 }
fn default_timeout_secs() -> u64 { 30 }
fn default_openai_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_chat_model() -> String { "gpt-4o-mini".to_string() }
fn default_raw_txt_dir() -> String { "data/txt".to_string() }
fn default_max_tokens() -> usize { 500 }
fn default_overlap_percent() -> f32 { 0.2 }

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
