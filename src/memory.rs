//! Byte-addressable backing store.
//!
//! The backing store is the authoritative copy of memory: the cache is
//! write-through and metadata-only, so every value the engine ever reads
//! ultimately comes from here.

use crate::error::EngineError;

/// Default backing store size (4 KiB) if the embedder does not override it.
pub const DEFAULT_SIZE: usize = 4096;

/// Fixed-size byte-addressable memory with big-endian word/double accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackingStore {
    bytes: Vec<u8>,
}

impl BackingStore {
    /// Create a zero-filled backing store of the given size.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size],
        }
    }

    /// Total addressable size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the backing store has zero capacity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn check_bounds(&self, addr: u64, size: u8) -> Result<usize, EngineError> {
        let start = usize::try_from(addr).map_err(|_| EngineError::OutOfBounds { address: addr, size })?;
        let end = start
            .checked_add(size as usize)
            .ok_or(EngineError::OutOfBounds { address: addr, size })?;
        if end > self.bytes.len() {
            return Err(EngineError::OutOfBounds { address: addr, size });
        }
        Ok(start)
    }

    /// Load a 32-bit word, sign-extended to `i64`, big-endian.
    pub fn load_word(&self, addr: u64) -> Result<i64, EngineError> {
        let start = self.check_bounds(addr, 4)?;
        let bytes: [u8; 4] = self.bytes[start..start + 4].try_into().expect("bounds checked above");
        Ok(i64::from(i32::from_be_bytes(bytes)))
    }

    /// Load a 64-bit doubleword, big-endian.
    pub fn load_double(&self, addr: u64) -> Result<i64, EngineError> {
        let start = self.check_bounds(addr, 8)?;
        let bytes: [u8; 8] = self.bytes[start..start + 8].try_into().expect("bounds checked above");
        Ok(i64::from_be_bytes(bytes))
    }

    /// Store a 32-bit word, truncating `value` to 32 bits, big-endian.
    pub fn store_word(&mut self, addr: u64, value: i64) -> Result<(), EngineError> {
        let start = self.check_bounds(addr, 4)?;
        let bytes = (value as i32).to_be_bytes();
        self.bytes[start..start + 4].copy_from_slice(&bytes);
        Ok(())
    }

    /// Store a 64-bit doubleword, big-endian.
    pub fn store_double(&mut self, addr: u64, value: i64) -> Result<(), EngineError> {
        let start = self.check_bounds(addr, 8)?;
        let bytes = value.to_be_bytes();
        self.bytes[start..start + 8].copy_from_slice(&bytes);
        Ok(())
    }

    /// Load a word or double depending on `is_double`.
    pub fn load(&self, addr: u64, is_double: bool) -> Result<i64, EngineError> {
        if is_double {
            self.load_double(addr)
        } else {
            self.load_word(addr)
        }
    }

    /// Store a word or double depending on `is_double`.
    pub fn store(&mut self, addr: u64, value: i64, is_double: bool) -> Result<(), EngineError> {
        if is_double {
            self.store_double(addr, value)
        } else {
            self.store_word(addr, value)
        }
    }
}

impl Default for BackingStore {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_round_trip() {
        let mut store = BackingStore::new(64);
        store.store_word(0, -1).unwrap();
        assert_eq!(store.load_word(0).unwrap(), -1);
    }

    #[test]
    fn double_round_trip() {
        let mut store = BackingStore::new(64);
        store.store_double(8, 0x0102_0304_0506_0708).unwrap();
        assert_eq!(store.load_double(8).unwrap(), 0x0102_0304_0506_0708);
        // big-endian: first byte is the high byte
        assert_eq!(store.load_word(8).unwrap(), 0x0102_0304);
    }

    #[test]
    fn out_of_bounds_word() {
        let store = BackingStore::new(4);
        assert!(matches!(
            store.load_word(2),
            Err(EngineError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn out_of_bounds_double_at_edge() {
        let store = BackingStore::new(8);
        assert!(store.load_double(0).is_ok());
        assert!(matches!(
            store.load_double(1),
            Err(EngineError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn same_block_double_loads_agree() {
        let mut store = BackingStore::new(32);
        store.store(0, 42, true).unwrap();
        assert_eq!(store.load(0, true).unwrap(), 42);
        store.store(16, 7, false).unwrap();
        assert_eq!(store.load(16, false).unwrap(), 7);
    }
}
