//! In-Memory Signal Cache
//!
//! Thread-safe cache of successful adapter results, keyed by
//! (source, lowercase address). Uses DashMap for concurrent access
//! without lock contention.
//!
//! - TTL-based expiration
//! - Only OK records are stored
//! - HIT/MISS counters for `/v1/stats`

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::SignalRecord;

#[derive(Clone, Debug)]
struct CacheEntry {
    record: SignalRecord,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

#[derive(Clone)]
pub struct SignalCache {
    store: Arc<DashMap<(String, String), CacheEntry>>,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl SignalCache {
    pub fn with_ttl(ttl_secs: u64) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    fn key(source: &str, address: &str) -> (String, String) {
        (source.to_string(), address.to_lowercase())
    }

    /// Some(record) on a fresh HIT
    pub fn get(&self, source: &str, address: &str) -> Option<SignalRecord> {
        let key = Self::key(source, address);

        if let Some(entry) = self.store.get(&key) {
            if entry.is_expired(self.ttl) {
                drop(entry); // Release read lock
                self.store.remove(&key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 CACHE MISS (expired): {}/{}", key.0, key.1);
                None
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("✅ CACHE HIT: {}/{}", key.0, key.1);
                Some(entry.record.clone())
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Failed records are ignored
    pub fn set(&self, address: &str, record: &SignalRecord) {
        if !record.is_ok() {
            return;
        }
        let key = Self::key(&record.source_name, address);
        self.store.insert(
            key,
            CacheEntry {
                record: record.clone(),
                created_at: Instant::now(),
            },
        );
    }

    pub fn cleanup_expired(&self) -> usize {
        let before = self.store.len();
        let ttl = self.ttl;
        self.store.retain(|_, entry| !entry.is_expired(ttl));
        // Concurrent inserts can leave the map larger than before
        before.saturating_sub(self.store.len())
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}
