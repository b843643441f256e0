//! TTL cache of hybrid search results.
//!
//! Expiry is lazy: a stale entry is ignored by `get` and overwritten by the
//! next `put` for its key. Without a bound nothing runs in the background.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use handbook_core::types::{CategoryFilter, SearchResult};
use moka::sync::Cache;
use tracing::debug;

/// Every parameter that changes a hybrid ranking. Weights compare by bit
/// pattern so the key can be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    limit: usize,
    category: CategoryFilter,
    vector_weight: u64,
    bm25_weight: u64,
}

impl CacheKey {
    pub fn new(query: &str, limit: usize, category: CategoryFilter, vector_weight: f64, bm25_weight: f64) -> Self {
        Self {
            query: query.to_string(),
            limit,
            category,
            vector_weight: vector_weight.to_bits(),
            bm25_weight: bm25_weight.to_bits(),
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant { Instant::now() }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self { Self { start: Instant::now(), offset: Mutex::new(Duration::ZERO) } }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() { *offset += by; }
    }
}

impl Default for ManualClock {
    fn default() -> Self { Self::new() }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|o| *o).unwrap_or_default();
        self.start + offset
    }
}

#[derive(Clone)]
struct Entry {
    results: Vec<SearchResult>,
    stored_at: Instant,
}

/// Unbounded keys live in a plain map. A bound hands storage and eviction
/// to moka, which also drops entries idle past the TTL in real time.
enum Storage {
    Unbounded(Mutex<HashMap<CacheKey, Entry>>),
    Bounded(Cache<CacheKey, Entry>),
}

pub struct ResultCache {
    storage: Storage,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self { Self::with_clock(ttl, Arc::new(SystemClock)) }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { storage: Storage::Unbounded(Mutex::new(HashMap::new())), ttl, clock }
    }

    /// Bound the number of keys. `None` leaves the cache unbounded.
    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.storage = match max_entries.filter(|n| *n > 0) {
            Some(max) => {
                debug!(max, "bounded result cache");
                let mut builder = Cache::builder().max_capacity(max as u64);
                if !self.ttl.is_zero() {
                    builder = builder.time_to_live(self.ttl);
                }
                Storage::Bounded(builder.build())
            }
            None => Storage::Unbounded(Mutex::new(HashMap::new())),
        };
        self
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn is_bounded(&self) -> bool { matches!(self.storage, Storage::Bounded(_)) }

    /// Entry for `key` if it was stored less than one TTL ago on the cache's clock.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<SearchResult>> {
        let now = self.clock.now();
        let entry = match &self.storage {
            Storage::Unbounded(entries) => entries.lock().ok()?.get(key)?.clone(),
            Storage::Bounded(cache) => cache.get(key)?,
        };
        (now.saturating_duration_since(entry.stored_at) < self.ttl).then_some(entry.results)
    }

    pub fn put(&self, key: CacheKey, results: Vec<SearchResult>) {
        let entry = Entry { results, stored_at: self.clock.now() };
        match &self.storage {
            Storage::Unbounded(entries) => {
                if let Ok(mut entries) = entries.lock() { entries.insert(key, entry); }
            }
            Storage::Bounded(cache) => cache.insert(key, entry),
        }
    }

    /// Number of stored keys, stale ones included.
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Unbounded(entries) => entries.lock().map(|e| e.len()).unwrap_or(0),
            Storage::Bounded(cache) => {
                cache.run_pending_tasks();
                usize::try_from(cache.entry_count()).unwrap_or(usize::MAX)
            }
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn clear(&self) {
        match &self.storage {
            Storage::Unbounded(entries) => {
                if let Ok(mut entries) = entries.lock() { entries.clear(); }
            }
            Storage::Bounded(cache) => {
                cache.invalidate_all();
                cache.run_pending_tasks();
            }
        }
    }
}
