//! Wiring shared by the `handbook-cli` and `handbook-mcp` binaries: settings
//! in, a ready engine, knowledge base, and tool set out.
pub mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use handbook_core::config::{expand_path, Config, Settings, StoreBackend};
use handbook_core::traits::{DocumentSink, Embedder, FunctionIndex, HybridStore, QueryGenerator};
use handbook_embed::get_default_embedder;
use handbook_hybrid::{HybridSearchEngine, KnowledgeBase, MultiQuerySearch, OpenAiQueryGenerator};
use handbook_mcp::{HandbookTools, ServiceInfo};
use handbook_store::{LocalStore, SupabaseStore};
use handbook_text::QueryExpander;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log to stderr; stdout carries command output or the MCP transport.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

/// One store seen through the three seams the engine and indexer need.
pub struct Backend {
    pub kind: &'static str,
    pub store: Arc<dyn HybridStore>,
    pub sink: Arc<dyn DocumentSink>,
    pub functions: Arc<dyn FunctionIndex>,
}

impl Backend {
    fn from_store<S>(kind: &'static str, store: S) -> Self
    where
        S: HybridStore + DocumentSink + FunctionIndex + 'static,
    {
        let store = Arc::new(store);
        Self { kind, store: store.clone(), sink: store.clone(), functions: store }
    }
}

pub fn open_backend(settings: &Settings) -> Result<Backend> {
    match settings.store.backend {
        StoreBackend::Local => {
            let store = match &settings.store.index_dir {
                Some(dir) => {
                    let path = expand_path(dir);
                    LocalStore::open(&path).with_context(|| format!("opening local store at {}", path.display()))?
                }
                None => LocalStore::in_memory()?,
            };
            Ok(Backend::from_store("local", store))
        }
        StoreBackend::Supabase => {
            let cfg = settings.supabase.as_ref().context("store.backend = \"supabase\" requires [supabase]")?;
            let store = SupabaseStore::new(cfg)?;
            Ok(Backend::from_store("supabase", store))
        }
    }
}

pub fn expander(settings: &Settings) -> QueryExpander {
    match &settings.vocabulary.synonyms {
        Some(table) => QueryExpander::new(table.iter().map(|(k, v)| (k.as_str(), v.iter().cloned()))),
        None => QueryExpander::default(),
    }
}

pub struct App {
    pub settings: Settings,
    pub embedder: Arc<dyn Embedder>,
    pub backend: Backend,
    pub engine: Arc<HybridSearchEngine>,
    pub knowledge: Arc<KnowledgeBase>,
}

impl App {
    pub fn load() -> Result<Self> {
        let settings = Config::load()?.settings().context("loading settings")?;
        Self::new(settings)
    }

    pub fn new(settings: Settings) -> Result<Self> {
        let embedder = get_default_embedder(&settings)?;
        let backend = open_backend(&settings)?;
        let engine = Arc::new(HybridSearchEngine::from_settings(&settings, embedder.clone(), backend.store.clone())?);
        let knowledge = Arc::new(KnowledgeBase::new(engine.clone(), backend.functions.clone(), expander(&settings)));
        info!(store = backend.kind, embedder = embedder.id(), "handbook ready");
        Ok(Self { settings, embedder, backend, engine, knowledge })
    }

    /// The chat-backed phrasing generator, when `[openai]` is configured.
    pub fn generator(&self) -> Result<Option<Arc<dyn QueryGenerator>>> {
        let Some(openai) = &self.settings.openai else { return Ok(None) };
        let generator = OpenAiQueryGenerator::new(openai)?.with_count(self.settings.search.max_queries);
        Ok(Some(Arc::new(generator)))
    }

    pub fn multi_query(&self) -> Result<Option<MultiQuerySearch>> {
        Ok(self.generator()?.map(|generator| {
            MultiQuerySearch::new(self.engine.clone(), generator).with_max_queries(self.settings.search.max_queries)
        }))
    }

    pub fn tools(&self) -> Result<HandbookTools> {
        let info = ServiceInfo {
            store: self.backend.kind.to_string(),
            chat_model: self.settings.openai.as_ref().map(|o| o.chat_model.clone()),
        };
        let tools = HandbookTools::new(self.knowledge.clone(), self.backend.functions.clone(), self.backend.sink.clone())
            .with_info(info)
            .with_max_limit(self.settings.search.max_limit);
        Ok(match self.multi_query()? {
            Some(multi) => tools.with_multi_query(multi),
            None => tools,
        })
    }
}
