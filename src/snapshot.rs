//! Per-cycle observable state and the reverse-stepping history.
//!
//! A `Snapshot` is a deep, by-value copy of everything the engine exposes
//! for inspection: it is also the engine's *entire* internal state.
//! `previous_cycle` works by popping the history and cloning the new tail
//! back into place — simpler than copy-on-write for a single-threaded
//! engine of this size.

use crate::cache::Cache;
use crate::instruction::Instruction;
use crate::memory::BackingStore;
use crate::registers::{RegisterFile, RegisterStatus};
use crate::station::{LoadBuffer, ReservationStation, StoreBuffer};

/// A complete, immutable copy of engine state taken at the end of a cycle.
///
/// Station/buffer slots reference their instruction by index into
/// `program` rather than embedding a copy; `program` is therefore part of
/// the snapshot too, since it is the sole owner of each instruction's
/// cycle stamps. Restoring `program` alongside the slots is what makes the
/// reverse-step round trip hold bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// The cycle counter at the end of this cycle.
    pub cycle: u64,
    /// The program counter (index into the instruction stream).
    pub pc: usize,
    /// True if issue is stalled awaiting a branch's write-back.
    pub fetch_stall: bool,
    /// The decoded program, with each instruction's current cycle stamps.
    pub program: Vec<Instruction>,
    /// FP-add reservation stations.
    pub fp_add: Vec<ReservationStation>,
    /// FP-mul reservation stations.
    pub fp_mul: Vec<ReservationStation>,
    /// Integer-ALU reservation stations.
    pub int_alu: Vec<ReservationStation>,
    /// Load buffers.
    pub loads: Vec<LoadBuffer>,
    /// Store buffers.
    pub stores: Vec<StoreBuffer>,
    /// Integer and FP register contents.
    pub registers: RegisterFile,
    /// Register ownership (renaming) table.
    pub status: RegisterStatus,
    /// Cache metadata and hit/miss counters.
    pub cache: Cache,
    /// The backing store.
    pub memory: BackingStore,
}

/// An append-only record of per-cycle snapshots, used to step backwards.
///
/// Unbounded by default: a ring buffer or delta compression would bound
/// memory use, but nothing in this design requires it yet.
#[derive(Debug, Clone, Default)]
pub struct History {
    snapshots: Vec<Snapshot>,
}

impl History {
    /// An empty history.
    #[must_use]
    pub fn new() -> Self {
        Self { snapshots: Vec::new() }
    }

    /// Append a new snapshot (taken at the end of a cycle).
    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    /// Pop and discard the most recent snapshot, returning the one now at
    /// the tail (the state to restore), or `None` if there is nothing
    /// before the popped entry.
    pub fn pop(&mut self) -> Option<Snapshot> {
        self.snapshots.pop();
        self.snapshots.last().cloned()
    }

    /// The most recent snapshot, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Number of snapshots retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// True if no snapshot has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
