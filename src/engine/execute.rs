//! Steps 3 and 4: starting ready executions and decrementing countdowns.
//! The structural-hazard rule here is what models the single CDB: a unit
//! may not start if its predicted end cycle collides with any
//! already-reserved end.

use std::collections::HashSet;

use crate::instruction::Opcode;
use crate::station::SlotState;

use super::Engine;

impl Engine {
    /// The end cycle a currently-executing slot is predicted to reach,
    /// given its remaining countdown as of the start of this cycle.
    fn predicted_end(current_cycle: u64, remaining: u64) -> u64 {
        current_cycle + remaining - 1
    }

    fn reserved_ends(&self) -> HashSet<u64> {
        let mut ends = HashSet::new();
        for s in self.fp_add.iter().chain(&self.fp_mul).chain(&self.int_alu) {
            if s.state == SlotState::Executing {
                ends.insert(Self::predicted_end(self.cycle, s.remaining));
            }
        }
        for l in &self.loads {
            if l.state == SlotState::Executing {
                ends.insert(Self::predicted_end(self.cycle, l.remaining));
            }
        }
        for st in &self.stores {
            if st.state == SlotState::Executing {
                ends.insert(Self::predicted_end(self.cycle, st.remaining));
            }
        }
        ends
    }

    /// Memory accesses share a single in-order port: a load or store may
    /// not begin execution while an older (lower issue cycle) load or
    /// store is still occupying a buffer. This keeps cache state changes
    /// visible in program order — a later access's `probe_latency` call
    /// always sees whatever an older access already installed — and as a
    /// side effect also gives loads the address-based disambiguation
    /// against older stores that memory ordering requires.
    fn older_memory_op_in_flight(&self, issue: u64) -> bool {
        let older = |instruction: Option<usize>| -> bool {
            let Some(idx) = instruction else { return false };
            matches!(self.program[idx].stamps.issue, Some(other) if other < issue)
        };
        self.loads.iter().any(|l| older(l.instruction)) || self.stores.iter().any(|s| older(s.instruction))
    }

    /// True if any station or buffer is still mid-countdown. Used to tell
    /// a cycle with a long-latency operation quietly ticking down apart
    /// from one in which the machine is genuinely idle.
    pub(super) fn any_executing(&self) -> bool {
        self.fp_add.iter().any(|s| s.state == SlotState::Executing)
            || self.fp_mul.iter().any(|s| s.state == SlotState::Executing)
            || self.int_alu.iter().any(|s| s.state == SlotState::Executing)
            || self.loads.iter().any(|l| l.state == SlotState::Executing)
            || self.stores.iter().any(|s| s.state == SlotState::Executing)
    }

    /// Step 3: start every idle, busy, ready station/buffer that doesn't
    /// collide on the shared result bus. Returns true if anything started.
    pub(super) fn start_ready_executions(&mut self) -> bool {
        let mut reserved = self.reserved_ends();
        let mut started = false;
        let cycle = self.cycle;

        let fp_add_latency = self.config.latencies.fp_add;
        for i in 0..self.fp_add.len() {
            if self.fp_add[i].state != SlotState::Issued || !self.fp_add[i].operands_ready() {
                continue;
            }
            let end = Self::predicted_end(cycle, fp_add_latency);
            if reserved.contains(&end) {
                log::trace!("cycle {cycle}: structural stall for {}", self.fp_add[i].tag);
                continue;
            }
            reserved.insert(end);
            let idx = self.fp_add[i].instruction.expect("issued station carries an instruction index");
            self.fp_add[i].remaining = fp_add_latency;
            self.fp_add[i].state = SlotState::Executing;
            if self.program[idx].stamps.exec_start.is_none() {
                self.program[idx].stamps.exec_start = Some(cycle);
            }
            started = true;
        }

        let (fp_mul_latency, fp_div_latency) = (self.config.latencies.fp_mul, self.config.latencies.fp_div);
        for i in 0..self.fp_mul.len() {
            if self.fp_mul[i].state != SlotState::Issued || !self.fp_mul[i].operands_ready() {
                continue;
            }
            let idx = self.fp_mul[i].instruction.expect("issued station carries an instruction index");
            let latency = if self.program[idx].opcode == Opcode::FpDiv { fp_div_latency } else { fp_mul_latency };
            let end = Self::predicted_end(cycle, latency);
            if reserved.contains(&end) {
                log::trace!("cycle {cycle}: structural stall for {}", self.fp_mul[i].tag);
                continue;
            }
            reserved.insert(end);
            self.fp_mul[i].remaining = latency;
            self.fp_mul[i].state = SlotState::Executing;
            if self.program[idx].stamps.exec_start.is_none() {
                self.program[idx].stamps.exec_start = Some(cycle);
            }
            started = true;
        }

        let int_alu_latency = self.config.latencies.int_alu;
        for i in 0..self.int_alu.len() {
            if self.int_alu[i].state != SlotState::Issued || !self.int_alu[i].operands_ready() {
                continue;
            }
            let end = Self::predicted_end(cycle, int_alu_latency);
            if reserved.contains(&end) {
                log::trace!("cycle {cycle}: structural stall for {}", self.int_alu[i].tag);
                continue;
            }
            reserved.insert(end);
            let idx = self.int_alu[i].instruction.expect("issued station carries an instruction index");
            self.int_alu[i].remaining = int_alu_latency;
            self.int_alu[i].state = SlotState::Executing;
            if self.program[idx].stamps.exec_start.is_none() {
                self.program[idx].stamps.exec_start = Some(cycle);
            }
            started = true;
        }

        let load_base = self.config.latencies.load_base;
        for i in 0..self.loads.len() {
            let (state, address_ready) = (self.loads[i].state, self.loads[i].address_ready());
            if state != SlotState::Issued || !address_ready {
                continue;
            }
            let addr = self.loads[i].address.value();
            let idx = self.loads[i].instruction.expect("issued load carries an instruction index");
            let issue = self.program[idx].stamps.issue.expect("issued instruction has an issue stamp");
            if self.older_memory_op_in_flight(issue) {
                log::trace!("cycle {cycle}: load {} waiting on the memory port", self.loads[i].tag);
                continue;
            }
            let latency = load_base + self.cache.probe_latency(addr as u64);
            let end = Self::predicted_end(cycle, latency);
            if reserved.contains(&end) {
                log::trace!("cycle {cycle}: structural stall for {}", self.loads[i].tag);
                continue;
            }
            reserved.insert(end);
            self.loads[i].remaining = latency;
            self.loads[i].state = SlotState::Executing;
            if self.program[idx].stamps.exec_start.is_none() {
                self.program[idx].stamps.exec_start = Some(cycle);
            }
            started = true;
        }

        let store_base = self.config.latencies.store_base;
        for i in 0..self.stores.len() {
            let (state, ready) = (self.stores[i].state, self.stores[i].ready());
            if state != SlotState::Issued || !ready {
                continue;
            }
            let addr = self.stores[i].address.value();
            let idx = self.stores[i].instruction.expect("issued store carries an instruction index");
            let issue = self.program[idx].stamps.issue.expect("issued instruction has an issue stamp");
            if self.older_memory_op_in_flight(issue) {
                log::trace!("cycle {cycle}: store {} waiting on the memory port", self.stores[i].tag);
                continue;
            }
            let latency = store_base + self.cache.probe_latency(addr as u64);
            let end = Self::predicted_end(cycle, latency);
            if reserved.contains(&end) {
                log::trace!("cycle {cycle}: structural stall for {}", self.stores[i].tag);
                continue;
            }
            reserved.insert(end);
            self.stores[i].remaining = latency;
            self.stores[i].state = SlotState::Executing;
            if self.program[idx].stamps.exec_start.is_none() {
                self.program[idx].stamps.exec_start = Some(cycle);
            }
            started = true;
        }

        started
    }

    /// Step 4: decrement every executing unit's countdown, stamping
    /// `exec_end` for any that reach zero. Returns true if anything
    /// finished this cycle.
    pub(super) fn decrement_executing(&mut self) -> bool {
        let cycle = self.cycle;
        let mut finished = false;

        for i in 0..self.fp_add.len() {
            if self.fp_add[i].state != SlotState::Executing {
                continue;
            }
            self.fp_add[i].remaining -= 1;
            if self.fp_add[i].remaining == 0 {
                self.fp_add[i].state = SlotState::Finished;
                if let Some(idx) = self.fp_add[i].instruction {
                    self.program[idx].stamps.exec_end = Some(cycle);
                }
                finished = true;
            }
        }
        for i in 0..self.fp_mul.len() {
            if self.fp_mul[i].state != SlotState::Executing {
                continue;
            }
            self.fp_mul[i].remaining -= 1;
            if self.fp_mul[i].remaining == 0 {
                self.fp_mul[i].state = SlotState::Finished;
                if let Some(idx) = self.fp_mul[i].instruction {
                    self.program[idx].stamps.exec_end = Some(cycle);
                }
                finished = true;
            }
        }
        for i in 0..self.int_alu.len() {
            if self.int_alu[i].state != SlotState::Executing {
                continue;
            }
            self.int_alu[i].remaining -= 1;
            if self.int_alu[i].remaining == 0 {
                self.int_alu[i].state = SlotState::Finished;
                if let Some(idx) = self.int_alu[i].instruction {
                    self.program[idx].stamps.exec_end = Some(cycle);
                }
                finished = true;
            }
        }
        for i in 0..self.loads.len() {
            if self.loads[i].state != SlotState::Executing {
                continue;
            }
            self.loads[i].remaining -= 1;
            if self.loads[i].remaining == 0 {
                self.loads[i].state = SlotState::Finished;
                if let Some(idx) = self.loads[i].instruction {
                    self.program[idx].stamps.exec_end = Some(cycle);
                }
                finished = true;
            }
        }
        for i in 0..self.stores.len() {
            if self.stores[i].state != SlotState::Executing {
                continue;
            }
            self.stores[i].remaining -= 1;
            if self.stores[i].remaining == 0 {
                self.stores[i].state = SlotState::Finished;
                if let Some(idx) = self.stores[i].instruction {
                    self.program[idx].stamps.exec_end = Some(cycle);
                }
                finished = true;
            }
        }

        finished
    }
}
