//! Steps 1 and 2: committing finished stores and arbitrating the single
//! CDB write-back.

use crate::error::EngineError;
use crate::instruction::{Dest, Opcode};
use crate::registers::Bank;
use crate::station::{Operand, SlotState};
use crate::tag::{Category, Tag};

use super::Engine;

/// A unit eligible to compete for the CDB this cycle: its tag, how many
/// other slots are waiting on it, and its timing for the tie-break.
struct Candidate {
    tag: Tag,
    dependents: usize,
    exec_start: u64,
    issue: u64,
}

impl Engine {
    /// Step 1: commit every store buffer whose execution finished in a
    /// strictly earlier cycle and that hasn't committed yet. Returns true
    /// if anything committed.
    pub(super) fn commit_stores(&mut self) -> Result<bool, EngineError> {
        let cycle = self.cycle;
        let mut committed = false;
        for i in 0..self.stores.len() {
            if self.stores[i].state != SlotState::Finished {
                continue;
            }
            let Some(idx) = self.stores[i].instruction else { continue };
            let stamps = self.program[idx].stamps;
            let eligible = matches!(stamps.exec_end, Some(end) if end < cycle) && stamps.write_back.is_none();
            if !eligible {
                continue;
            }
            let addr = self.stores[i].address.value() as u64;
            let value = self.stores[i].value.value();
            let is_double = self.program[idx].is_double;
            log::trace!("cycle {cycle}: committing store {} addr={addr:#x}", self.stores[i].tag);
            self.cache.store(&mut self.memory, addr, value, is_double)?;
            self.program[idx].stamps.write_back = Some(cycle);
            self.stores[i].release();
            committed = true;
        }
        Ok(committed)
    }

    fn dependent_count(&self, tag: Tag) -> usize {
        let mut count = 0;
        for s in self.fp_add.iter().chain(&self.fp_mul).chain(&self.int_alu) {
            if s.is_busy() {
                if s.vj == Operand::Waiting(tag) {
                    count += 1;
                }
                if s.vk == Operand::Waiting(tag) {
                    count += 1;
                }
            }
        }
        for l in &self.loads {
            if l.is_busy() && l.address == Operand::Waiting(tag) {
                count += 1;
            }
        }
        for s in &self.stores {
            if s.is_busy() {
                if s.address == Operand::Waiting(tag) {
                    count += 1;
                }
                if s.value == Operand::Waiting(tag) {
                    count += 1;
                }
            }
        }
        count
    }

    fn finished_candidates(&self) -> Vec<Candidate> {
        let cycle = self.cycle;
        let mut candidates = Vec::new();
        for s in self.fp_add.iter().chain(&self.fp_mul).chain(&self.int_alu) {
            if s.state != SlotState::Finished {
                continue;
            }
            let Some(idx) = s.instruction else { continue };
            let stamps = self.program[idx].stamps;
            if matches!(stamps.exec_end, Some(end) if end < cycle) && stamps.write_back.is_none() {
                candidates.push(Candidate {
                    tag: s.tag,
                    dependents: self.dependent_count(s.tag),
                    exec_start: stamps.exec_start.unwrap_or(u64::MAX),
                    issue: stamps.issue.unwrap_or(u64::MAX),
                });
            }
        }
        for l in &self.loads {
            if l.state != SlotState::Finished {
                continue;
            }
            let Some(idx) = l.instruction else { continue };
            let stamps = self.program[idx].stamps;
            if matches!(stamps.exec_end, Some(end) if end < cycle) && stamps.write_back.is_none() {
                candidates.push(Candidate {
                    tag: l.tag,
                    dependents: self.dependent_count(l.tag),
                    exec_start: stamps.exec_start.unwrap_or(u64::MAX),
                    issue: stamps.issue.unwrap_or(u64::MAX),
                });
            }
        }
        candidates
    }

    fn broadcast(&mut self, tag: Tag, value: i64) {
        for s in self.fp_add.iter_mut().chain(&mut self.fp_mul).chain(&mut self.int_alu) {
            s.vj.resolve(tag, value);
            s.vk.resolve(tag, value);
        }
        for l in self.loads.iter_mut() {
            l.resolve_address(tag, value);
        }
        for s in self.stores.iter_mut() {
            s.resolve_address(tag, value);
            s.value.resolve(tag, value);
        }
    }

    fn compute_alu_result(opcode: Opcode, vj: i64, vk: i64, a: i64) -> i64 {
        match opcode {
            Opcode::Addi => vj.wrapping_add(a),
            Opcode::Subi => vj.wrapping_sub(a),
            Opcode::FpAdd => vj.wrapping_add(vk),
            Opcode::FpSub => vj.wrapping_sub(vk),
            Opcode::FpMul => vj.wrapping_mul(vk),
            Opcode::FpDiv => {
                if vk == 0 {
                    // Division by zero yields 0, a documented concession, not a trap.
                    0
                } else {
                    vj.wrapping_div(vk)
                }
            }
            Opcode::Beq | Opcode::Bne | Opcode::Load | Opcode::Store => {
                unreachable!("compute_alu_result is only called for ALU/FP opcodes")
            }
        }
    }

    /// Step 2: arbitrate the single CDB among finished stations/load
    /// buffers, perform the winner's write-back and broadcast, and release
    /// it. Returns the winning tag, if any.
    pub(super) fn writeback_cdb(&mut self) -> Result<Option<Tag>, EngineError> {
        let candidates = self.finished_candidates();
        if candidates.is_empty() {
            return Ok(None);
        }
        let winner = candidates
            .into_iter()
            .min_by_key(|c| (std::cmp::Reverse(c.dependents), c.exec_start, c.issue))
            .expect("non-empty");
        let tag = winner.tag;
        let cycle = self.cycle;

        match tag {
            Tag::Station(..) => self.writeback_station(tag, cycle)?,
            Tag::Load(index) => self.writeback_load(index, cycle)?,
            Tag::Store(_) => unreachable!("store buffers never win CDB arbitration"),
        }

        log::debug!("cycle {cycle}: {tag} won the CDB ({} dependents)", winner.dependents);
        Ok(Some(tag))
    }

    fn station_index(&self, category: Category) -> &[crate::station::ReservationStation] {
        match category {
            Category::FpAdd => &self.fp_add,
            Category::FpMul => &self.fp_mul,
            Category::IntAlu => &self.int_alu,
        }
    }

    fn writeback_station(&mut self, tag: Tag, cycle: u64) -> Result<(), EngineError> {
        let Tag::Station(category, slot) = tag else { unreachable!() };
        let slot = slot as usize;

        let idx = self.station_index(category)[slot].instruction.expect("finished station carries an instruction index");
        let opcode = self.program[idx].opcode;
        let dest = self.program[idx].dest;
        let (vj, vk, a) = {
            let station = &self.station_index(category)[slot];
            (station.vj.value(), station.vk.value(), station.a)
        };

        if opcode.is_branch() {
            let taken = match opcode {
                Opcode::Beq => vj == vk,
                Opcode::Bne => vj != vk,
                _ => unreachable!(),
            };
            if taken {
                self.pc = a as usize;
            }
            self.fetch_stall = false;
            self.program[idx].stamps.write_back = Some(cycle);
            self.release_station(category, slot);
            return Ok(());
        }

        let value = Self::compute_alu_result(opcode, vj, vk, a);
        self.commit_register_write(dest, tag, value);
        self.program[idx].stamps.write_back = Some(cycle);
        self.release_station(category, slot);
        self.broadcast(tag, value);
        Ok(())
    }

    fn release_station(&mut self, category: Category, slot: usize) {
        match category {
            Category::FpAdd => self.fp_add[slot].release(),
            Category::FpMul => self.fp_mul[slot].release(),
            Category::IntAlu => self.int_alu[slot].release(),
        }
    }

    fn writeback_load(&mut self, index: u8, cycle: u64) -> Result<(), EngineError> {
        let slot = index as usize;
        let idx = self.loads[slot].instruction.expect("finished load carries an instruction index");
        let dest = self.program[idx].dest;
        let is_double = self.program[idx].is_double;
        let addr = self.loads[slot].address.value() as u64;

        let value = self.cache.load(&self.memory, addr, is_double)?;

        self.commit_register_write(dest, Tag::Load(index), value);
        self.program[idx].stamps.write_back = Some(cycle);
        self.loads[slot].release();
        self.broadcast(Tag::Load(index), value);
        Ok(())
    }

    /// Write `value` into the destination register named by `dest` only if
    /// its owner tag still equals `tag`: a later instruction may already
    /// have reclaimed the register.
    fn commit_register_write(&mut self, dest: Dest, tag: Tag, value: i64) {
        let (bank, index) = match dest {
            Dest::IntReg(i) => (Bank::Int, i),
            Dest::FpReg(i) => (Bank::Fp, i),
            Dest::None => return,
        };
        if self.status.owner(bank, index) == Some(tag) {
            self.registers.write(bank, index, value);
            self.status.clear_owner_if(bank, index, tag);
        }
    }
}
