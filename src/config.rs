//! Engine construction configuration.
//!
//! Everything the embedder must supply to build an `Engine` is grouped
//! into this one value type with a single `validate` step, which is the
//! sole source of `EngineError::BadConfig`.

use crate::cache::CacheConfig;
use crate::error::EngineError;
use crate::memory::DEFAULT_SIZE;

/// Per-category station/buffer counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationCounts {
    /// Number of FP-add reservation stations.
    pub fp_add: u8,
    /// Number of FP-mul reservation stations.
    pub fp_mul: u8,
    /// Number of integer-ALU reservation stations.
    pub int_alu: u8,
    /// Number of load buffers.
    pub load: u8,
    /// Number of store buffers.
    pub store: u8,
}

/// Functional-unit latencies, in cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Latencies {
    /// FP add/subtract latency.
    pub fp_add: u64,
    /// FP multiply latency.
    pub fp_mul: u64,
    /// FP divide latency.
    pub fp_div: u64,
    /// Integer ALU latency (`ADDI`/`SUBI`/branches).
    pub int_alu: u64,
    /// Base load latency, before the cache's probed latency is added.
    pub load_base: u64,
    /// Base store latency, before the cache's probed latency is added.
    pub store_base: u64,
}

/// Everything needed to construct an `Engine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Reservation-station and load/store-buffer counts.
    pub stations: StationCounts,
    /// Functional-unit latencies.
    pub latencies: Latencies,
    /// Data cache geometry and timing.
    pub cache: CacheConfig,
    /// Backing store size in bytes.
    pub memory_size: usize,
}

impl EngineConfig {
    /// Validate every field, returning the first violation found.
    ///
    /// This is the sole place `EngineError::BadConfig` originates for
    /// non-cache parameters; cache geometry validation is delegated to
    /// `CacheConfig`/`Cache::new` and surfaces through the same variant.
    pub fn validate(&self) -> Result<(), EngineError> {
        let counts = &self.stations;
        if counts.fp_add == 0 && counts.fp_mul == 0 && counts.int_alu == 0 {
            return Err(EngineError::BadConfig {
                reason: "at least one reservation-station category must have a non-zero count".into(),
            });
        }
        if counts.load == 0 {
            return Err(EngineError::BadConfig {
                reason: "load buffer count must be positive".into(),
            });
        }
        if counts.store == 0 {
            return Err(EngineError::BadConfig {
                reason: "store buffer count must be positive".into(),
            });
        }

        let lat = &self.latencies;
        for (name, value) in [
            ("fp_add", lat.fp_add),
            ("fp_mul", lat.fp_mul),
            ("fp_div", lat.fp_div),
            ("int_alu", lat.int_alu),
            ("load_base", lat.load_base),
            ("store_base", lat.store_base),
        ] {
            if value == 0 {
                return Err(EngineError::BadConfig {
                    reason: format!("latency '{name}' must be positive"),
                });
            }
        }

        if self.memory_size == 0 {
            return Err(EngineError::BadConfig {
                reason: "memory_size must be positive".into(),
            });
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    /// A small but workable default configuration, useful for tests and
    /// quick experimentation.
    fn default() -> Self {
        Self {
            stations: StationCounts {
                fp_add: 3,
                fp_mul: 2,
                int_alu: 3,
                load: 3,
                store: 3,
            },
            latencies: Latencies {
                fp_add: 2,
                fp_mul: 10,
                fp_div: 40,
                int_alu: 1,
                load_base: 2,
                store_base: 2,
            },
            cache: CacheConfig {
                cache_size: 256,
                block_size: 16,
                associativity: 2,
                hit_latency: 1,
                miss_penalty: 10,
            },
            memory_size: DEFAULT_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_latency_rejected() {
        let mut config = EngineConfig::default();
        config.latencies.int_alu = 0;
        assert!(matches!(config.validate(), Err(EngineError::BadConfig { .. })));
    }

    #[test]
    fn zero_station_counts_rejected() {
        let mut config = EngineConfig::default();
        config.stations = StationCounts {
            fp_add: 0,
            fp_mul: 0,
            int_alu: 0,
            load: 1,
            store: 1,
        };
        assert!(matches!(config.validate(), Err(EngineError::BadConfig { .. })));
    }

    #[test]
    fn zero_load_buffers_rejected() {
        let mut config = EngineConfig::default();
        config.stations.load = 0;
        assert!(matches!(config.validate(), Err(EngineError::BadConfig { .. })));
    }
}
