//! Short-lived cache for rendered metalink responses
//!
//! Entries expire after a fixed TTL. When the cache is full, expired entries
//! are dropped first and then the oldest entries are evicted.

use crate::models::CountryCode;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Clone)]
struct CacheEntry {
    body: Bytes,
    stored_at: Instant,
    expires_at: Instant,
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Cache of rendered documents keyed by request
pub struct ResponseCache {
    storage: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create a new ResponseCache
    ///
    /// # Arguments
    /// * `ttl` - How long a response may be served from cache
    /// * `max_entries` - Maximum number of cached responses
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        ResponseCache {
            storage: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate the cache key for a request
    ///
    /// The full query string identifies the request. The resolved client
    /// origin is part of the key because it may come from a header rather
    /// than the query, and it changes the ordering of the document.
    pub fn generate_cache_key(&self, query: &str, origin: Option<&CountryCode>) -> String {
        // Format: {query}|origin:{country or -}
        format!(
            "{}|origin:{}",
            query,
            origin.map(CountryCode::as_str).unwrap_or("-")
        )
    }

    /// Get statistics about the cache
    pub fn get_stats(&self) -> CacheStats {
        let storage = self.storage.read().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            total_entries: storage.len(),
            total_bytes: storage.values().map(|e| e.body.len()).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Look up a cached response
    ///
    /// # Returns
    /// * `Some(Bytes)` if a fresh entry exists
    /// * `None` if the key is missing or its entry has expired
    pub fn lookup(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        let found = {
            let storage = self.storage.read().unwrap_or_else(|e| e.into_inner());
            match storage.get(key) {
                Some(entry) if entry.expires_at > now => Some(entry.body.clone()),
                Some(_) => {
                    debug!("Cache entry expired: key={}", key);
                    None
                }
                None => None,
            }
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit: key={}", key);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache miss: key={}", key);
        }
        found
    }

    /// Store a response
    pub fn store(&self, key: &str, body: Bytes) {
        let now = Instant::now();
        let mut storage = self.storage.write().unwrap_or_else(|e| e.into_inner());

        if !storage.contains_key(key) && storage.len() >= self.max_entries {
            storage.retain(|_, entry| entry.expires_at > now);

            while storage.len() >= self.max_entries {
                let oldest = storage
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(oldest) => {
                        debug!("Evicting oldest cache entry: key={}", oldest);
                        storage.remove(&oldest);
                    }
                    None => break,
                }
            }
        }

        debug!("Caching response: key={}, size={}", key, body.len());
        storage.insert(
            key.to_string(),
            CacheEntry {
                body,
                stored_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut storage = self.storage.write().unwrap_or_else(|e| e.into_inner());
        let before = storage.len();
        storage.retain(|_, entry| entry.expires_at > now);
        before - storage.len()
    }
}
