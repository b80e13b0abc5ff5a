//! LRU cache of decode results.
//!
//! Keys hash only the first [`PREFIX_LEN`] bytes plus the total length, so
//! two inputs that share both collide. That trade keeps lookups O(1 KiB)
//! regardless of envelope size.

use std::num::NonZeroUsize;

use fastdog_codec::{DecodeOptions, DecodeResult};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

pub const PREFIX_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    prefix_hash: u64,
    len: usize,
    zero_copy: bool,
    options: String,
}

impl CacheKey {
    pub fn new(data: &[u8], zero_copy: bool, options: &DecodeOptions) -> Self {
        let prefix = &data[..data.len().min(PREFIX_LEN)];
        Self {
            prefix_hash: rolling_hash(prefix),
            len: data.len(),
            zero_copy,
            options: serde_json::to_string(options).unwrap_or_default(),
        }
    }
}

fn rolling_hash(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |h, &b| h.wrapping_mul(31).wrapping_add(u64::from(b)))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to decode.
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
    /// Entries currently held.
    pub size: usize,
    /// Maximum number of entries, 0 when caching is disabled.
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

struct Inner {
    entries: Option<LruCache<CacheKey, DecodeResult>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Mutex-guarded so a cache can be shared across threads; a capacity of
/// zero turns every operation into a no-op.
pub struct DecodeCache {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for DecodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("DecodeCache")
            .field("size", &stats.size)
            .field("capacity", &stats.capacity)
            .finish_non_exhaustive()
    }
}

impl DecodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: NonZeroUsize::new(capacity).map(LruCache::new),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().entries.is_some()
    }

    pub fn get(&self, key: &CacheKey) -> Option<DecodeResult> {
        let mut inner = self.inner.lock();
        let found = inner.entries.as_mut()?.get(key).cloned();
        match found {
            Some(_) => inner.hits += 1,
            None => inner.misses += 1,
        }
        found
    }

    pub fn insert(&self, key: CacheKey, result: DecodeResult) {
        let mut inner = self.inner.lock();
        let Some(entries) = inner.entries.as_mut() else {
            return;
        };
        let evicts = entries.len() == entries.cap().get() && !entries.contains(&key);
        entries.put(key, result);
        if evicts {
            inner.evictions += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(entries) = self.inner.lock().entries.as_mut() {
            entries.clear();
        }
    }

    pub fn reset_stats(&self) {
        let mut inner = self.inner.lock();
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size: inner.entries.as_ref().map_or(0, LruCache::len),
            capacity: inner.entries.as_ref().map_or(0, |e| e.cap().get()),
        }
    }
}
