//! Set-associative, write-through, no-write-allocate data cache.
//!
//! The cache is metadata-only: no data bytes are modelled, because
//! write-through keeps the backing store authoritative and there is no
//! coherence protocol to simulate. `probe_latency` is a pure function used
//! by the engine to size an execution's countdown *before* the access
//! happens; `load`/`store` perform the access itself and do not return
//! timing.

use crate::error::EngineError;
use crate::memory::BackingStore;

/// Cache geometry and timing, validated once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
    /// Total cache capacity in bytes.
    pub cache_size: u32,
    /// Bytes per cache block.
    pub block_size: u32,
    /// Number of ways per set.
    pub associativity: u32,
    /// Cycles charged on a hit.
    pub hit_latency: u64,
    /// Additional cycles charged on a miss (on top of `hit_latency`).
    pub miss_penalty: u64,
}

impl CacheConfig {
    /// Derive the number of sets, or fail if the geometry does not divide
    /// evenly.
    fn num_sets(&self) -> Result<u32, EngineError> {
        if self.cache_size == 0 || self.block_size == 0 || self.associativity == 0 {
            return Err(EngineError::BadConfig {
                reason: "cache_size, block_size, and associativity must all be positive".into(),
            });
        }
        let set_bytes = self.block_size.checked_mul(self.associativity).ok_or_else(|| {
            EngineError::BadConfig {
                reason: "block_size * associativity overflowed".into(),
            }
        })?;
        if set_bytes == 0 || self.cache_size % set_bytes != 0 {
            return Err(EngineError::BadConfig {
                reason: format!(
                    "cache_size {} is not an exact multiple of block_size * associativity ({})",
                    self.cache_size, set_bytes
                ),
            });
        }
        Ok(self.cache_size / set_bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Line {
    valid: bool,
    tag: u64,
    lru: u64,
}

/// Hit/miss counters, exposed read-only for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    /// Number of accesses that found a valid, matching line.
    pub hits: u64,
    /// Number of accesses that missed.
    pub misses: u64,
}

/// A single cache way's observable metadata: valid, tag, LRU counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WayMetadata {
    /// Whether this way currently holds a valid line.
    pub valid: bool,
    /// The tag stored in this way, meaningful only if `valid`.
    pub tag: u64,
    /// The LRU timestamp of this way, meaningful only if `valid`.
    pub lru: u64,
}

/// Set-associative, write-through, no-write-allocate, LRU-replacement cache.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cache {
    config: CacheConfig,
    num_sets: u32,
    // sets[set_index][way]
    sets: Vec<Vec<Line>>,
    access_counter: u64,
    stats: CacheStats,
}

impl Cache {
    /// Build a new cache from the given configuration.
    pub fn new(config: CacheConfig) -> Result<Self, EngineError> {
        let num_sets = config.num_sets()?;
        let sets = vec![vec![Line::default(); config.associativity as usize]; num_sets as usize];
        Ok(Self {
            config,
            num_sets,
            sets,
            access_counter: 0,
            stats: CacheStats::default(),
        })
    }

    /// The configuration this cache was built from.
    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Current hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Per-set, per-way metadata for observability (valid/tag/LRU).
    #[must_use]
    pub fn metadata(&self) -> Vec<Vec<WayMetadata>> {
        self.sets
            .iter()
            .map(|set| {
                set.iter()
                    .map(|line| WayMetadata {
                        valid: line.valid,
                        tag: line.tag,
                        lru: line.lru,
                    })
                    .collect()
            })
            .collect()
    }

    fn decompose(&self, addr: u64) -> (u64, usize, u64) {
        let block = addr / u64::from(self.config.block_size);
        let set_index = block % u64::from(self.num_sets);
        let tag = block / u64::from(self.num_sets);
        (block, set_index as usize, tag)
    }

    fn find_way(&self, set_index: usize, tag: u64) -> Option<usize> {
        self.sets[set_index]
            .iter()
            .position(|line| line.valid && line.tag == tag)
    }

    /// The latency a load/store to `addr` would incur, without mutating any
    /// state. Used by the engine to size an execution's countdown *before*
    /// starting it.
    #[must_use]
    pub fn probe_latency(&self, addr: u64) -> u64 {
        let (_, set_index, tag) = self.decompose(addr);
        if self.find_way(set_index, tag).is_some() {
            self.config.hit_latency
        } else {
            self.config.hit_latency + self.config.miss_penalty
        }
    }

    /// Choose a replacement way: first invalid way, else the least recently
    /// used way.
    fn replacement_way(&self, set_index: usize) -> usize {
        let set = &self.sets[set_index];
        if let Some(pos) = set.iter().position(|line| !line.valid) {
            return pos;
        }
        set.iter()
            .enumerate()
            .min_by_key(|(_, line)| line.lru)
            .map(|(pos, _)| pos)
            .expect("associativity is always >= 1")
    }

    fn touch(&mut self, set_index: usize, way: usize, tag: u64) {
        self.access_counter += 1;
        let line = &mut self.sets[set_index][way];
        line.valid = true;
        line.tag = tag;
        line.lru = self.access_counter;
    }

    /// Perform a load access: updates LRU on hit, installs a line with LRU
    /// replacement on miss, records hit/miss, and returns the value read
    /// from the backing store (which write-through keeps authoritative).
    pub fn load(
        &mut self,
        store: &BackingStore,
        addr: u64,
        is_double: bool,
    ) -> Result<i64, EngineError> {
        let (_, set_index, tag) = self.decompose(addr);
        match self.find_way(set_index, tag) {
            Some(way) => {
                self.stats.hits += 1;
                self.touch(set_index, way, tag);
            }
            None => {
                self.stats.misses += 1;
                let way = self.replacement_way(set_index);
                self.touch(set_index, way, tag);
            }
        }
        store.load(addr, is_double)
    }

    /// Perform a store access: on hit, updates LRU and writes through; on
    /// miss, writes through only (no-write-allocate) and counts the miss.
    pub fn store(
        &mut self,
        backing: &mut BackingStore,
        addr: u64,
        value: i64,
        is_double: bool,
    ) -> Result<(), EngineError> {
        let (_, set_index, tag) = self.decompose(addr);
        match self.find_way(set_index, tag) {
            Some(way) => {
                self.stats.hits += 1;
                self.touch(set_index, way, tag);
            }
            None => {
                self.stats.misses += 1;
            }
        }
        backing.store(addr, value, is_double)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache() -> Cache {
        // 4 sets, 1 way each, 16-byte blocks => cache_size = 64
        Cache::new(CacheConfig {
            cache_size: 64,
            block_size: 16,
            associativity: 1,
            hit_latency: 1,
            miss_penalty: 10,
        })
        .unwrap()
    }

    #[test]
    fn bad_config_rejected() {
        let err = Cache::new(CacheConfig {
            cache_size: 10,
            block_size: 16,
            associativity: 1,
            hit_latency: 1,
            miss_penalty: 10,
        });
        assert!(matches!(err, Err(EngineError::BadConfig { .. })));
    }

    #[test]
    fn zero_parameter_rejected() {
        let err = Cache::new(CacheConfig {
            cache_size: 0,
            block_size: 16,
            associativity: 1,
            hit_latency: 1,
            miss_penalty: 10,
        });
        assert!(matches!(err, Err(EngineError::BadConfig { .. })));
    }

    #[test]
    fn probe_latency_does_not_mutate() {
        let cache = small_cache();
        let before = cache.stats();
        let _ = cache.probe_latency(0);
        let _ = cache.probe_latency(0);
        assert_eq!(cache.stats(), before);
    }

    #[test]
    fn cold_miss_then_hit() {
        let mut cache = small_cache();
        let backing = BackingStore::new(64);
        assert_eq!(cache.probe_latency(0), 11); // 1 + 10, cold
        cache.load(&backing, 0, true).unwrap();
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.probe_latency(0), 1); // now resident
        cache.load(&backing, 8, true).unwrap(); // same block as addr 0
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn different_block_misses_again() {
        let mut cache = small_cache();
        let backing = BackingStore::new(4096);
        cache.load(&backing, 0, true).unwrap();
        cache.load(&backing, 100, true).unwrap();
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn lru_replacement_evicts_oldest() {
        // 1 set, 2 ways, 16-byte blocks => cache_size = 32
        let mut cache = Cache::new(CacheConfig {
            cache_size: 32,
            block_size: 16,
            associativity: 2,
            hit_latency: 1,
            miss_penalty: 10,
        })
        .unwrap();
        let backing = BackingStore::new(4096);
        cache.load(&backing, 0, true).unwrap(); // block 0 -> way 0
        cache.load(&backing, 16, true).unwrap(); // block 1 -> way 1
        cache.load(&backing, 0, true).unwrap(); // hit, block 0 becomes MRU
        cache.load(&backing, 32, true).unwrap(); // block 2, evicts block 1 (LRU)
        assert_eq!(cache.stats().misses, 3);
        assert_eq!(cache.probe_latency(16), 11); // block 1 evicted, miss again
        assert_eq!(cache.probe_latency(0), 1); // block 0 still resident
    }

    #[test]
    fn store_no_write_allocate_on_miss() {
        let mut cache = small_cache();
        let mut backing = BackingStore::new(64);
        cache.store(&mut backing, 0, 99, true).unwrap();
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(backing.load_double(0).unwrap(), 99);
        // still a miss next probe: no-write-allocate means the line wasn't installed
        assert_eq!(cache.probe_latency(0), 11);
    }
}
