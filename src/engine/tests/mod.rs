//! Pipeline engine tests.
//!
//! Organized into:
//! - `scenarios.rs`: the concrete cycle-by-cycle timing scenarios
//! - `invariants.rs`: per-cycle structural invariants checked across a
//!   handful of representative programs
//!
//! Programs are built directly as `Vec<Instruction>` rather than through a
//! textual assembler (out of scope for this core, see crate docs).

use super::*;
use crate::instruction::{Instruction, Opcode};
use crate::registers::Bank;
use crate::station::SlotState;

mod invariants;

/// Run `engine` until a cycle makes no progress, or `max_cycles` is
/// reached (a safety net against a test program that never terminates).
fn run_to_quiescence(engine: &mut Engine, max_cycles: u64) -> CycleReport {
    let mut last = engine.advance_cycle().expect("cycle should not fault");
    let mut n = 1;
    while !last.no_progress() {
        last = engine.advance_cycle().expect("cycle should not fault");
        n += 1;
        assert!(n < max_cycles, "program did not quiesce within {max_cycles} cycles");
    }
    last
}

/// `EngineConfig::default()` with the cache geometry swapped for the one
/// S2 specifies: 4 sets of 1 way, 16-byte blocks, hit=1/miss=10, load base 2.
fn cache_timing_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.cache = crate::cache::CacheConfig {
        cache_size: 64,
        block_size: 16,
        associativity: 1,
        hit_latency: 1,
        miss_penalty: 10,
    };
    config.latencies.load_base = 2;
    config.memory_size = 4096;
    config
}

fn all_busy_executing_ends(engine: &Engine) -> Vec<u64> {
    let cycle = engine.cycle();
    let mut ends = Vec::new();
    for s in engine
        .int_alu_stations()
        .iter()
        .chain(engine.fp_add_stations())
        .chain(engine.fp_mul_stations())
    {
        if s.state == SlotState::Executing {
            ends.push(cycle + s.remaining - 1);
        }
    }
    for l in engine.load_buffers() {
        if l.state == SlotState::Executing {
            ends.push(cycle + l.remaining - 1);
        }
    }
    for st in engine.store_buffers() {
        if st.state == SlotState::Executing {
            ends.push(cycle + st.remaining - 1);
        }
    }
    ends
}

/// A register's owner tag is set iff some busy station/buffer carries
/// that identifier as its destination.
fn assert_owner_invariant(engine: &Engine) {
    let busy_tags: std::collections::HashSet<_> = engine
        .int_alu_stations()
        .iter()
        .chain(engine.fp_add_stations())
        .chain(engine.fp_mul_stations())
        .filter(|s| s.is_busy())
        .map(|s| s.tag)
        .chain(engine.load_buffers().iter().filter(|l| l.is_busy()).map(|l| l.tag))
        .chain(engine.store_buffers().iter().filter(|s| s.is_busy()).map(|s| s.tag))
        .collect();

    for i in 0..crate::registers::NUM_REGS as u8 {
        for bank in [Bank::Int, Bank::Fp] {
            if let Some(owner) = engine.status().owner(bank, i) {
                assert!(
                    busy_tags.contains(&owner),
                    "register status names {owner} as owner of {bank:?}{i} but no busy station carries that tag"
                );
            }
        }
    }
}

/// At most one CDB transaction per cycle, i.e. no two currently-executing
/// units share a predicted end cycle.
fn assert_single_cdb_invariant(engine: &Engine) {
    let ends = all_busy_executing_ends(engine);
    let unique: std::collections::HashSet<_> = ends.iter().copied().collect();
    assert_eq!(ends.len(), unique.len(), "two executing units share a predicted end cycle: {ends:?}");
}
