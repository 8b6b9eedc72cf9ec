//! Crate-wide error type.
//!
//! Construction-time misconfiguration and runtime memory faults are the only
//! failure modes the engine surfaces as `Err`; structural hazards (a full
//! station, a CDB collision) are absorbed as stalls and never appear here.

use thiserror::Error;

/// Everything that can go wrong building or driving the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Invalid latency, station count, or cache geometry at construction.
    #[error("bad engine configuration: {reason}")]
    BadConfig {
        /// Human-readable explanation of which parameter was invalid.
        reason: String,
    },

    /// An `Instruction` the embedder supplied cannot be placed or decoded.
    ///
    /// The textual assembler that would normally guarantee well-formed
    /// instructions is out of scope for this crate (see the crate docs);
    /// this variant exists for the embedder that hands the engine a
    /// malformed decode directly.
    #[error("bad program: {reason}")]
    BadProgram {
        /// Human-readable explanation of the malformed instruction.
        reason: String,
    },

    /// A memory or cache access fell outside the configured backing store.
    #[error("out of bounds access at address {address:#x} (size {size})")]
    OutOfBounds {
        /// The address that was accessed.
        address: u64,
        /// The access size in bytes (4 for word, 8 for double).
        size: u8,
    },

    /// `previous_cycle` was called with no prior cycle to restore.
    #[error("no history to step back into")]
    NoHistory,
}
