//! Result caching with TTL and a capacity bound

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

use crate::clock::{Clock, TokioClock};

/// Cache entry with TTL
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cached payload
    pub value: Value,
    /// When the entry was stored
    pub stored_at: Instant,
    /// Time-to-live duration
    pub ttl: Duration,
}

impl CacheEntry {
    /// Create cache entry stored at `now`
    pub fn new(value: Value, stored_at: Instant, ttl: Duration) -> Self {
        Self { value, stored_at, ttl }
    }

    /// Check if cache entry is still fresh at `now`
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }

    /// Get age of cache entry at `now`
    pub fn age_at(&self, now: Instant) -> Duration {
        now.duration_since(self.stored_at)
    }
}

/// In-memory result cache.
///
/// Expired entries are removed lazily on lookup (or by an explicit
/// `purge_expired`); when full, the least recently used entry is evicted.
#[derive(Debug)]
pub struct ResultCache {
    state: Mutex<CacheState>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

#[derive(Debug)]
struct CacheState {
    entries: LruCache<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ResultCache {
    /// Create result cache driven by the tokio timer
    pub fn new(capacity: NonZeroUsize, default_ttl: Duration) -> Self {
        Self::with_clock(capacity, default_ttl, Arc::new(TokioClock))
    }

    /// Create result cache with an explicit clock
    pub fn with_clock(capacity: NonZeroUsize, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            default_ttl,
            clock,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().entries.cap().get()
    }
}

impl ResultCache {
    /// Get cached value if fresh
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let lookup = state
            .entries
            .get(key)
            .map(|entry| entry.is_fresh_at(now).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                state.hits += 1;
                Some(value)
            }
            Some(None) => {
                // Remove stale entry
                state.entries.pop(key);
                state.misses += 1;
                None
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Store value with default TTL
    pub fn insert(&self, key: String, value: Value) {
        self.set(key, value, self.default_ttl);
    }

    /// Store value with custom TTL; a zero TTL stores nothing
    pub fn set(&self, key: String, value: Value, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let entry = CacheEntry::new(value, self.clock.now(), ttl);
        let mut state = self.state.lock();
        if let Some((evicted, _)) = state.entries.push(key.clone(), entry) {
            if evicted != key {
                state.evictions += 1;
            }
        }
    }

    /// Check if key is cached and fresh without touching recency or stats
    pub fn contains_fresh(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.state
            .lock()
            .entries
            .peek(key)
            .map(|entry| entry.is_fresh_at(now))
            .unwrap_or(false)
    }

    /// Drop one entry
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.state.lock().entries.pop(key).map(|entry| entry.value)
    }

    /// Number of stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let state = self.state.lock();

        let fresh_entries = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_fresh_at(now))
            .count();

        CacheStats {
            total_entries: state.entries.len(),
            fresh_entries,
            stale_entries: state.entries.len() - fresh_entries,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Remove stale entries
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let stale: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            state.entries.pop(key);
        }
        stale.len()
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Number of fresh entries
    pub fresh_entries: usize,
    /// Number of stale entries
    pub stale_entries: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Entries dropped to respect the capacity bound
    pub evictions: u64,
}

#[cfg(test)]
mod tests;
