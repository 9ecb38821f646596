//! In-memory payload cache.
//!
//! Reconstruction reads every reference of a container in order, so popular
//! chunks are fetched many times. The cache keeps recently used payloads in
//! memory under a byte budget and evicts the least recently used entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use sabd_core::ChunkId;
use tracing::trace;

/// Default cache budget in bytes.
pub const DEFAULT_CACHE_BYTES: u64 = 64 * 1024 * 1024;

/// Cache entry with metadata.
struct CacheEntry {
    /// Chunk payload
    data: Vec<u8>,
    /// Last access time (monotonic counter)
    last_access: u64,
}

/// LRU memory cache for chunk payloads.
pub struct ChunkCache {
    max_bytes: u64,
    /// Cached entries
    entries: RwLock<HashMap<ChunkId, CacheEntry>>,
    /// Current cache size in bytes
    current_size: AtomicU64,
    /// Access counter for LRU
    access_counter: AtomicU64,
    /// Statistics
    stats: RwLock<CacheStats>,
}

/// Cache statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Cache hits
    pub hits: u64,
    /// Cache misses
    pub misses: u64,
    /// Evictions
    pub evictions: u64,
    /// Total bytes inserted
    pub bytes_cached: u64,
}

impl CacheStats {
    /// Fraction of lookups served from memory.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

impl ChunkCache {
    /// Creates a cache holding at most `max_bytes` of payload.
    ///
    /// A budget of zero disables caching.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            entries: RwLock::new(HashMap::new()),
            current_size: AtomicU64::new(0),
            access_counter: AtomicU64::new(0),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Creates a cache with the default budget.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CACHE_BYTES)
    }

    /// Returns the configured budget.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Gets a payload from the cache.
    pub fn get(&self, id: ChunkId) -> Option<Vec<u8>> {
        let mut entries = self.entries.write();

        if let Some(entry) = entries.get_mut(&id) {
            entry.last_access = self.access_counter.fetch_add(1, Ordering::Relaxed);
            self.stats.write().hits += 1;
            Some(entry.data.clone())
        } else {
            self.stats.write().misses += 1;
            None
        }
    }

    /// Puts a payload into the cache.
    ///
    /// Payloads larger than the whole budget are not cached.
    pub fn put(&self, id: ChunkId, data: Vec<u8>) {
        let size = data.len() as u64;
        if size > self.max_bytes {
            return;
        }

        let mut entries = self.entries.write();
        if let Some(old) = entries.remove(&id) {
            self.current_size
                .fetch_sub(old.data.len() as u64, Ordering::Relaxed);
        }

        while self.current_size.load(Ordering::Relaxed) + size > self.max_bytes {
            if !self.evict_one(&mut entries) {
                break;
            }
        }

        let entry = CacheEntry {
            data,
            last_access: self.access_counter.fetch_add(1, Ordering::Relaxed),
        };
        entries.insert(id, entry);
        self.current_size.fetch_add(size, Ordering::Relaxed);
        self.stats.write().bytes_cached += size;
    }

    /// Removes an entry from the cache.
    pub fn remove(&self, id: ChunkId) -> Option<Vec<u8>> {
        let mut entries = self.entries.write();
        let entry = entries.remove(&id)?;
        self.current_size
            .fetch_sub(entry.data.len() as u64, Ordering::Relaxed);
        Some(entry.data)
    }

    /// Returns the current cache size in bytes.
    pub fn size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clears the cache.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.current_size.store(0, Ordering::Relaxed);
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }

    /// Evicts the least recently used entry.
    fn evict_one(&self, entries: &mut HashMap<ChunkId, CacheEntry>) -> bool {
        let lru_key = entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(k, _)| *k);

        let Some(key) = lru_key else {
            return false;
        };
        match entries.remove(&key) {
            Some(entry) => {
                self.current_size
                    .fetch_sub(entry.data.len() as u64, Ordering::Relaxed);
                self.stats.write().evictions += 1;
                trace!(id = %key, "Evicted cached chunk");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic() {
        let cache = ChunkCache::new(1024);

        let data = vec![0xAA; 100];
        cache.put(ChunkId(7), data.clone());
        assert_eq!(cache.get(ChunkId(7)), Some(data));
        assert_eq!(cache.size(), 100);
    }

    #[test]
    fn test_cache_eviction_is_lru() {
        let cache = ChunkCache::new(200);

        cache.put(ChunkId(1), vec![1; 100]);
        cache.put(ChunkId(2), vec![2; 100]);
        // Touch 1 so 2 becomes the eviction candidate
        assert!(cache.get(ChunkId(1)).is_some());
        cache.put(ChunkId(3), vec![3; 100]);

        assert!(cache.size() <= 200);
        assert!(cache.get(ChunkId(1)).is_some());
        assert!(cache.get(ChunkId(2)).is_none());
        assert!(cache.get(ChunkId(3)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_cache_replace_same_id() {
        let cache = ChunkCache::new(1024);
        cache.put(ChunkId(1), vec![0; 100]);
        cache.put(ChunkId(1), vec![1; 50]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size(), 50);
    }

    #[test]
    fn test_cache_oversized_and_disabled() {
        let cache = ChunkCache::new(10);
        cache.put(ChunkId(1), vec![0; 11]);
        assert!(cache.is_empty());

        let disabled = ChunkCache::new(0);
        disabled.put(ChunkId(1), vec![0; 1]);
        assert!(disabled.get(ChunkId(1)).is_none());
    }

    #[test]
    fn test_cache_remove() {
        let cache = ChunkCache::with_defaults();

        let data = vec![0xAA; 100];
        cache.put(ChunkId(42), data.clone());
        assert_eq!(cache.remove(ChunkId(42)), Some(data));
        assert!(cache.get(ChunkId(42)).is_none());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_cache_stats() {
        let cache = ChunkCache::with_defaults();
        cache.put(ChunkId(1), vec![0xAA; 100]);

        cache.get(ChunkId(1));
        cache.get(ChunkId(2));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
