//! Cycle-accurate Tomasulo dynamic-scheduling engine.
//!
//! This crate simulates an out-of-order execution pipeline built around
//! Tomasulo's algorithm: reservation stations, load/store buffers,
//! register renaming via owner tags, and a single common data bus (CDB)
//! for broadcasting results. A configurable set-associative data cache
//! sits in front of a flat backing store.
//!
//! # Architecture
//!
//! - `instruction`: the static program representation and per-instruction
//!   cycle stamps (issue, exec-start, exec-end, write-back)
//! - `tag`: producer identifiers (`Tag`) used for register renaming and
//!   CDB matching
//! - `station`: reservation stations and load/store buffers
//! - `registers`: the integer/FP register file and the ownership table
//!   that implements renaming
//! - `cache`: a set-associative, write-through, no-write-allocate cache
//! - `memory`: the flat byte-addressable backing store
//! - `config`: engine configuration (station counts, latencies, cache
//!   geometry) and its validation
//! - `snapshot`: per-cycle state capture and the reverse-stepping history
//! - `engine`: the `Engine` itself and its per-cycle state machine
//! - `error`: the crate's error type
//!
//! # Cycle model
//!
//! Each call to [`Engine::advance_cycle`] performs, in order: commit
//! finished stores, arbitrate and perform one CDB write-back, start any
//! newly-ready executions, decrement in-flight countdowns, and issue at
//! most one instruction. [`Engine::previous_cycle`] rewinds to the state
//! as of the end of the prior cycle.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod instruction;
pub mod memory;
pub mod registers;
pub mod snapshot;
pub mod station;
pub mod tag;

pub use config::EngineConfig;
pub use engine::{CycleReport, Engine};
pub use error::EngineError;
pub use instruction::{Dest, Instruction, Opcode};
pub use tag::Tag;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    #[test]
    fn engine_builds_with_default_config() {
        let program = vec![Instruction::int_immediate(crate::instruction::Opcode::Addi, 1, 0, 5)];
        let engine = Engine::new(program, EngineConfig::default()).unwrap();
        assert_eq!(engine.cycle(), 0);
        assert_eq!(engine.pc(), 0);
    }

    #[test]
    fn engine_rejects_bad_config() {
        let mut config = EngineConfig::default();
        config.memory_size = 0;
        let err = Engine::new(Vec::new(), config).unwrap_err();
        assert!(matches!(err, EngineError::BadConfig { .. }));
    }

    #[test]
    fn engine_rejects_branch_past_program_end() {
        let program = vec![Instruction::branch(crate::instruction::Opcode::Beq, 0, 0, 99)];
        let err = Engine::new(program, EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::BadProgram { .. }));
    }

    #[test]
    fn single_immediate_completes_and_is_observable_via_no_progress() {
        let program = vec![Instruction::int_immediate(crate::instruction::Opcode::Addi, 1, 0, 7)];
        let mut engine = Engine::new(program, EngineConfig::default()).unwrap();

        let mut progressed = true;
        while progressed {
            let report = engine.advance_cycle().unwrap();
            progressed = !report.no_progress();
        }

        assert_eq!(engine.registers().read(crate::registers::Bank::Int, 1), 7);
    }
}
