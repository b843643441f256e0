mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{engine, result, row, ScriptedStore, HOUR};
use handbook_core::error::Error;
use handbook_core::types::{Category, CategoryFilter, SearchType};
use handbook_hybrid::{CacheKey, HybridSearchRequest, ManualClock, ResultCache, SearchWeights};

fn request(query: &str, limit: usize) -> HybridSearchRequest {
    HybridSearchRequest::new(query, limit, CategoryFilter::All, SearchWeights::new(0.6, 0.4).expect("weights"))
}

#[tokio::test]
async fn hamming_code_returns_store_rows_verbatim() {
    let store = ScriptedStore::new(vec![row("a", 0.91), row("b", 0.72), row("c", 0.95)]);
    let (engine, _) = engine(store.clone(), Arc::new(ManualClock::new()));

    let results = engine.hybrid_search(&request("Hamming code", 5)).await.expect("search");
    assert_eq!(results.len(), 3);
    let ids: Vec<_> = results.iter().map(|r| r.identity().unwrap_or_default().to_string()).collect();
    assert_eq!(ids, vec!["a", "b", "c"], "store order is kept");
    let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![0.91, 0.72, 0.95]);
    assert_eq!(results[0].vector_similarity, Some(0.91 / 2.0));
    assert_eq!(results[0].bm25_score, Some(0.91 / 3.0));

    let queries = store.queries();
    let sent = &queries[0];
    assert_eq!(sent.text, "Hamming code");
    assert_eq!(sent.threshold, 0.4);
    assert_eq!((sent.vector_weight, sent.bm25_weight), (0.6, 0.4));
    assert_eq!(sent.limit, 5);
    assert_eq!(sent.category_filter, None);
    assert_eq!(sent.vector, vec![12.0, 1.0]);
}

#[tokio::test]
async fn identical_requests_within_ttl_hit_the_cache() {
    let store = ScriptedStore::new(vec![row("a", 0.9), row("b", 0.8)]);
    let clock = Arc::new(ManualClock::new());
    let (engine, embedder) = engine(store.clone(), clock.clone());

    let first = engine.hybrid_search(&request("Sylow subgroup", 5)).await.expect("first");
    clock.advance(HOUR - Duration::from_secs(1));
    let second = engine.hybrid_search(&request("Sylow subgroup", 5)).await.expect("second");

    assert_eq!(first, second);
    assert_eq!(store.calls(), 1);
    assert_eq!(embedder.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_entries_are_recomputed() {
    let store = ScriptedStore::new(vec![row("a", 0.9)]);
    let clock = Arc::new(ManualClock::new());
    let (engine, _) = engine(store.clone(), clock.clone());

    engine.hybrid_search(&request("finite fields", 5)).await.expect("first");
    engine.hybrid_search(&request("finite fields", 5)).await.expect("second");
    assert_eq!(store.calls(), 1);

    clock.advance(HOUR);
    engine.hybrid_search(&request("finite fields", 5)).await.expect("third");
    assert_eq!(store.calls(), 2);
    assert_eq!(engine.cache().len(), 1, "the refresh overwrites in place");
}

#[tokio::test]
async fn every_parameter_is_part_of_the_key() {
    let store = ScriptedStore::new(vec![row("a", 0.9)]);
    let (engine, _) = engine(store.clone(), Arc::new(ManualClock::new()));
    let base = request("group cohomology", 5);

    let mut variants = vec![base.clone()];
    variants.push(HybridSearchRequest { limit: 4, ..base.clone() });
    variants.push(HybridSearchRequest { category: CategoryFilter::Only(Category::Theory), ..base.clone() });
    variants.push(HybridSearchRequest { vector_weight: 0.7, ..base.clone() });
    variants.push(HybridSearchRequest { bm25_weight: 0.3, ..base.clone() });
    variants.push(HybridSearchRequest { query: "group cohomology ".into(), ..base.clone() });
    for v in &variants {
        engine.hybrid_search(v).await.expect("search");
    }
    assert_eq!(store.calls(), variants.len());
    assert_eq!(store.queries()[2].category_filter, Some(Category::Theory));
}

#[tokio::test]
async fn failures_propagate_and_are_not_cached() {
    let store = ScriptedStore::new(vec![row("a", 0.9)]);
    let (engine, _) = engine(store.clone(), Arc::new(ManualClock::new()));

    store.set_failing(true);
    let err = engine.hybrid_search(&request("Reed Solomon", 5)).await.expect_err("store down");
    assert!(matches!(err, Error::Query(_)));
    assert!(engine.cache().is_empty());

    store.set_failing(false);
    let ok = engine.hybrid_search(&request("Reed Solomon", 5)).await.expect("recovered");
    assert_eq!(ok.len(), 1);
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn empty_store_answer_is_a_valid_result() {
    let store = ScriptedStore::new(Vec::new());
    let (engine, _) = engine(store.clone(), Arc::new(ManualClock::new()));
    assert!(engine.hybrid_search(&request("motives", 5)).await.expect("empty").is_empty());
    assert!(engine.hybrid_search(&request("motives", 5)).await.expect("cached").is_empty());
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn invalid_arguments_are_rejected_before_any_call() {
    let store = ScriptedStore::new(vec![row("a", 0.9)]);
    let (engine, _) = engine(store.clone(), Arc::new(ManualClock::new()));

    let zero = engine.hybrid_search(&request("x", 0)).await;
    assert!(matches!(zero, Err(Error::InvalidArgument(_))));
    let heavy = HybridSearchRequest { vector_weight: 1.5, ..request("x", 5) };
    assert!(matches!(engine.hybrid_search(&heavy).await, Err(Error::InvalidArgument(_))));
    let negative = HybridSearchRequest { bm25_weight: -0.1, ..request("x", 5) };
    assert!(matches!(engine.hybrid_search(&negative).await, Err(Error::InvalidArgument(_))));
    assert_eq!(store.calls(), 0);

    assert!(SearchWeights::new(0.5, 1.01).is_err());
    let unnormalised = SearchWeights::new(1.0, 1.0).expect("weights need not sum to 1");
    assert_eq!(unnormalised.bm25_weight, 1.0);
}

#[tokio::test]
async fn search_type_selects_weights() {
    let store = ScriptedStore::new(vec![row("a", 0.9)]);
    let (engine, _) = engine(store.clone(), Arc::new(ManualClock::new()));

    engine.search_documents("q", 3, SearchType::Semantic).await.expect("semantic");
    engine.search_documents("q", 3, SearchType::Keyword).await.expect("keyword");
    engine.search_documents("q", 3, SearchType::Hybrid).await.expect("hybrid");

    let weights: Vec<(f64, f64)> = store.queries().iter().map(|q| (q.vector_weight, q.bm25_weight)).collect();
    assert_eq!(weights, vec![(1.0, 0.0), (0.0, 1.0), (0.6, 0.4)]);
    assert!(store.queries().iter().all(|q| q.category_filter.is_none() && q.limit == 3));
}

#[test]
fn bounded_cache_stays_within_its_capacity() {
    let clock = Arc::new(ManualClock::new());
    let cache = ResultCache::with_clock(HOUR, clock.clone()).with_max_entries(Some(2));
    let key = |q: String| CacheKey::new(&q, 5, CategoryFilter::All, 0.6, 0.4);
    assert!(cache.is_bounded());

    cache.put(key("one".into()), vec![result(Some("1"), 0.1)]);
    assert_eq!(cache.get(&key("one".into())), Some(vec![result(Some("1"), 0.1)]));

    for i in 0..50 {
        cache.put(key(format!("query {i}")), Vec::new());
    }
    assert!(cache.len() <= 2, "len {}", cache.len());

    cache.clear();
    assert!(cache.get(&key("query 49".into())).is_none());
    assert!(cache.is_empty());
}

#[test]
fn bounded_cache_expires_on_the_injected_clock() {
    let clock = Arc::new(ManualClock::new());
    let cache = ResultCache::with_clock(HOUR, clock.clone()).with_max_entries(Some(8));
    let key = CacheKey::new("galois", 5, CategoryFilter::All, 0.6, 0.4);

    cache.put(key.clone(), vec![result(Some("g"), 0.4)]);
    clock.advance(HOUR - Duration::from_secs(1));
    assert!(cache.get(&key).is_some());
    clock.advance(Duration::from_secs(1));
    assert!(cache.get(&key).is_none(), "stale at exactly one TTL");

    cache.put(key.clone(), Vec::new());
    assert_eq!(cache.get(&key), Some(Vec::new()), "a put refreshes the entry");
    assert_eq!(cache.len(), 1);
}

#[test]
fn zero_capacity_means_unbounded() {
    let cache = ResultCache::new(HOUR).with_max_entries(Some(0));
    assert!(!cache.is_bounded());
    for i in 0..10 {
        cache.put(CacheKey::new(&format!("q{i}"), 5, CategoryFilter::All, 0.6, 0.4), Vec::new());
    }
    assert_eq!(cache.len(), 10);
}

#[test]
fn cache_keys_compare_weights_exactly() {
    let a = CacheKey::new("q", 5, CategoryFilter::All, 0.6, 0.4);
    let b = CacheKey::new("q", 5, CategoryFilter::All, 0.6, 0.4);
    let c = CacheKey::new("q", 5, CategoryFilter::All, 0.6 + 1e-12, 0.4);
    assert_eq!(a, b);
    assert_ne!(a, c);
}
