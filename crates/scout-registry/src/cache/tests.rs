//! Unit tests for the result cache

use super::*;
use crate::clock::ManualClock;
use serde_json::json;

fn create_test_payload() -> Value {
    json!({
        "name": "serde",
        "platform": "Cargo",
        "latest_release_number": "1.0.200"
    })
}

fn manual_cache(capacity: usize, ttl_secs: u64) -> (Arc<ManualClock>, ResultCache) {
    let clock = Arc::new(ManualClock::new());
    let cache = ResultCache::with_clock(
        NonZeroUsize::new(capacity).unwrap(),
        Duration::from_secs(ttl_secs),
        clock.clone(),
    );
    (clock, cache)
}

#[test]
fn test_cache_entry_freshness() {
    let clock = ManualClock::new();
    let entry = CacheEntry::new(create_test_payload(), clock.now(), Duration::from_secs(300));

    assert!(entry.is_fresh_at(clock.now()));
    clock.advance(Duration::from_secs(299));
    assert!(entry.is_fresh_at(clock.now()));
    assert_eq!(entry.age_at(clock.now()), Duration::from_secs(299));

    // Exactly at ttl the entry is stale
    clock.advance(Duration::from_secs(1));
    assert!(!entry.is_fresh_at(clock.now()));
}

#[test]
fn test_result_cache_insert_and_get() {
    let (_clock, cache) = manual_cache(16, 300);
    cache.insert("serde".to_string(), create_test_payload());

    let retrieved = cache.get("serde");
    assert_eq!(retrieved.unwrap()["name"], "serde");
}

#[test]
fn test_result_cache_get_nonexistent() {
    let (_clock, cache) = manual_cache(16, 300);
    assert!(cache.get("missing").is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn test_set_then_expire() {
    let (clock, cache) = manual_cache(16, 300);
    cache.set("k".to_string(), json!("v"), Duration::from_secs(10));

    assert_eq!(cache.get("k"), Some(json!("v")));

    clock.advance(Duration::from_secs(10));
    assert!(cache.get("k").is_none());
    // Lazily removed on lookup
    assert_eq!(cache.len(), 0);
}

#[test]
fn test_zero_ttl_is_not_stored() {
    let (_clock, cache) = manual_cache(16, 300);
    cache.set("k".to_string(), json!(1), Duration::ZERO);

    assert!(cache.is_empty());
    assert!(cache.get("k").is_none());
}

#[test]
fn test_overwrite_refreshes_entry() {
    let (clock, cache) = manual_cache(16, 60);
    cache.insert("k".to_string(), json!(1));
    clock.advance(Duration::from_secs(50));
    cache.insert("k".to_string(), json!(2));
    clock.advance(Duration::from_secs(50));

    assert_eq!(cache.get("k"), Some(json!(2)));
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_lru_eviction_at_capacity() {
    let (_clock, cache) = manual_cache(2, 300);
    cache.insert("a".to_string(), json!("a"));
    cache.insert("b".to_string(), json!("b"));

    // Touch "a" so "b" becomes least recently used
    assert!(cache.get("a").is_some());
    cache.insert("c".to_string(), json!("c"));

    assert_eq!(cache.len(), 2);
    assert!(cache.get("b").is_none());
    assert!(cache.get("a").is_some());
    assert!(cache.get("c").is_some());
    assert_eq!(cache.stats().evictions, 1);
    assert_eq!(cache.capacity(), 2);
}

#[test]
fn test_contains_fresh() {
    let (clock, cache) = manual_cache(4, 30);
    cache.insert("k".to_string(), json!(true));

    assert!(cache.contains_fresh("k"));
    assert!(!cache.contains_fresh("other"));

    clock.advance(Duration::from_secs(31));
    assert!(!cache.contains_fresh("k"));
    // contains_fresh does not evict
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_stats() {
    let (clock, cache) = manual_cache(8, 300);
    cache.set("short".to_string(), json!(1), Duration::from_secs(5));
    cache.insert("long".to_string(), json!(2));
    clock.advance(Duration::from_secs(10));

    cache.get("long");
    let stats = cache.stats();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.fresh_entries, 1);
    assert_eq!(stats.stale_entries, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
}

#[test]
fn test_cache_clear_and_remove() {
    let (_clock, cache) = manual_cache(8, 300);
    cache.insert("a".to_string(), json!(1));
    cache.insert("b".to_string(), json!(2));

    assert_eq!(cache.remove("a"), Some(json!(1)));
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_purge_expired() {
    let (clock, cache) = manual_cache(8, 300);
    cache.set("a".to_string(), json!(1), Duration::from_secs(5));
    cache.set("b".to_string(), json!(2), Duration::from_secs(5));
    cache.insert("c".to_string(), json!(3));
    clock.advance(Duration::from_secs(6));

    assert_eq!(cache.purge_expired(), 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains_fresh("c"));
}

#[tokio::test(start_paused = true)]
async fn test_default_clock_expiry() {
    let cache = ResultCache::new(NonZeroUsize::new(4).unwrap(), Duration::from_secs(2));
    cache.insert("k".to_string(), json!("v"));
    assert_eq!(cache.default_ttl(), Duration::from_secs(2));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(cache.get("k").is_none());
}
