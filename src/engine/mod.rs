//! The pipeline engine: the per-cycle state machine.
//!
//! `Engine::advance_cycle` performs the fixed micro-step sequence —
//! commit-stores, write-back, start-execution, decrement-executing,
//! issue-one, snapshot — in that exact order. The ordering is load-bearing:
//! it is what gives single-cycle operand forwarding and what makes a
//! latency-1 unit finish the same cycle it starts.

mod execute;
mod issue;
#[cfg(test)]
mod tests;
mod writeback;

use crate::cache::Cache;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::instruction::Instruction;
use crate::memory::BackingStore;
use crate::registers::{RegisterFile, RegisterStatus};
use crate::snapshot::{History, Snapshot};
use crate::station::{LoadBuffer, ReservationStation, StoreBuffer};
use crate::tag::{Category, Tag};

/// What happened during one call to [`Engine::advance_cycle`].
///
/// `NoProgress` is intentionally not an error: it is informational,
/// detectable by the caller, and signals the program has terminated or is
/// deadlocked, not that anything went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// The cycle number that was just completed.
    pub cycle: u64,
    /// True if a store committed this cycle.
    pub store_committed: bool,
    /// The producer that won CDB arbitration this cycle, if any.
    pub wrote_back: Option<Tag>,
    /// True if a unit began execution this cycle.
    pub started_execution: bool,
    /// True if a unit's countdown reached zero this cycle.
    pub finished_execution: bool,
    /// True if an instruction issued this cycle.
    pub issued: bool,
    /// True if any station or buffer is still mid-countdown as of the end
    /// of this cycle.
    pub units_executing: bool,
}

impl CycleReport {
    /// No store committed, no CDB transaction, no unit started or
    /// finished, nothing issued, and no unit still counting down — the
    /// program has terminated or is deadlocked. A long-latency operation
    /// that is merely mid-flight (counting down with nothing else
    /// happening this cycle) must not be mistaken for quiescence, so
    /// `units_executing` is checked alongside the per-cycle events.
    #[must_use]
    pub fn no_progress(&self) -> bool {
        !self.store_committed
            && self.wrote_back.is_none()
            && !self.started_execution
            && !self.finished_execution
            && !self.issued
            && !self.units_executing
    }
}

/// The Tomasulo pipeline engine.
pub struct Engine {
    config: EngineConfig,
    program: Vec<Instruction>,

    cycle: u64,
    pc: usize,
    fetch_stall: bool,
    fp_add: Vec<ReservationStation>,
    fp_mul: Vec<ReservationStation>,
    int_alu: Vec<ReservationStation>,
    loads: Vec<LoadBuffer>,
    stores: Vec<StoreBuffer>,
    registers: RegisterFile,
    status: RegisterStatus,
    cache: Cache,
    memory: BackingStore,

    history: History,
}

impl Engine {
    /// Build a new engine for `program`, validating `config` first.
    pub fn new(program: Vec<Instruction>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        crate::instruction::validate_program(&program)?;
        let cache = Cache::new(config.cache)?;
        let memory = BackingStore::new(config.memory_size);

        let fp_add = (0..config.stations.fp_add)
            .map(|i| ReservationStation::new(Tag::Station(Category::FpAdd, i)))
            .collect();
        let fp_mul = (0..config.stations.fp_mul)
            .map(|i| ReservationStation::new(Tag::Station(Category::FpMul, i)))
            .collect();
        let int_alu = (0..config.stations.int_alu)
            .map(|i| ReservationStation::new(Tag::Station(Category::IntAlu, i)))
            .collect();
        let loads = (0..config.stations.load).map(|i| LoadBuffer::new(Tag::Load(i))).collect();
        let stores = (0..config.stations.store).map(|i| StoreBuffer::new(Tag::Store(i))).collect();

        let mut engine = Self {
            config,
            program,
            cycle: 0,
            pc: 0,
            fetch_stall: false,
            fp_add,
            fp_mul,
            int_alu,
            loads,
            stores,
            registers: RegisterFile::new(),
            status: RegisterStatus::new(),
            cache,
            memory,
            history: History::new(),
        };
        // Seed the history with the construction-time state so that
        // rewinding all the way back from any number of `advance_cycle`
        // calls lands on the initial state rather than erroring one cycle
        // short of it.
        let initial = engine.snapshot();
        engine.history.push(initial);
        Ok(engine)
    }

    /// The configuration this engine was built from.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The decoded program, with each instruction's current cycle stamps.
    #[must_use]
    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// The current cycle counter.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// The current program counter.
    #[must_use]
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// True if issue is stalled awaiting a branch's write-back.
    #[must_use]
    pub fn fetch_stall(&self) -> bool {
        self.fetch_stall
    }

    /// The integer and FP register file.
    #[must_use]
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// The register ownership table.
    #[must_use]
    pub fn status(&self) -> &RegisterStatus {
        &self.status
    }

    /// The data cache.
    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// FP-add reservation stations.
    #[must_use]
    pub fn fp_add_stations(&self) -> &[ReservationStation] {
        &self.fp_add
    }

    /// FP-mul reservation stations.
    #[must_use]
    pub fn fp_mul_stations(&self) -> &[ReservationStation] {
        &self.fp_mul
    }

    /// Integer-ALU reservation stations.
    #[must_use]
    pub fn int_alu_stations(&self) -> &[ReservationStation] {
        &self.int_alu
    }

    /// Load buffers.
    #[must_use]
    pub fn load_buffers(&self) -> &[LoadBuffer] {
        &self.loads
    }

    /// Store buffers.
    #[must_use]
    pub fn store_buffers(&self) -> &[StoreBuffer] {
        &self.stores
    }

    /// How many cycles of history are retained.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            cycle: self.cycle,
            pc: self.pc,
            fetch_stall: self.fetch_stall,
            program: self.program.clone(),
            fp_add: self.fp_add.clone(),
            fp_mul: self.fp_mul.clone(),
            int_alu: self.int_alu.clone(),
            loads: self.loads.clone(),
            stores: self.stores.clone(),
            registers: self.registers.clone(),
            status: self.status.clone(),
            cache: self.cache.clone(),
            memory: self.memory.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.cycle = snapshot.cycle;
        self.pc = snapshot.pc;
        self.fetch_stall = snapshot.fetch_stall;
        self.program = snapshot.program;
        self.fp_add = snapshot.fp_add;
        self.fp_mul = snapshot.fp_mul;
        self.int_alu = snapshot.int_alu;
        self.loads = snapshot.loads;
        self.stores = snapshot.stores;
        self.registers = snapshot.registers;
        self.status = snapshot.status;
        self.cache = snapshot.cache;
        self.memory = snapshot.memory;
    }

    /// Advance the machine by exactly one clock cycle, performing the
    /// fixed micro-step sequence in order.
    pub fn advance_cycle(&mut self) -> Result<CycleReport, EngineError> {
        self.cycle += 1;

        let store_committed = self.commit_stores()?;
        let wrote_back = self.writeback_cdb()?;
        let started_execution = self.start_ready_executions();
        let finished_execution = self.decrement_executing();
        let issued = self.issue_one()?;
        let units_executing = self.any_executing();

        let report = CycleReport {
            cycle: self.cycle,
            store_committed,
            wrote_back,
            started_execution,
            finished_execution,
            issued,
            units_executing,
        };
        if report.no_progress() {
            log::debug!("cycle {}: no progress", self.cycle);
        }

        self.history.push(self.snapshot());
        Ok(report)
    }

    /// Step back to the state as of the end of the previous cycle.
    ///
    /// Returns [`EngineError::NoHistory`] if there is nothing to roll back
    /// to.
    pub fn previous_cycle(&mut self) -> Result<(), EngineError> {
        let prior = self.history.pop().ok_or(EngineError::NoHistory)?;
        self.restore(prior);
        Ok(())
    }

    /// A deep copy of the current observable state, independent of the
    /// history ring.
    #[must_use]
    pub fn current_snapshot(&self) -> Snapshot {
        self.snapshot()
    }
}
