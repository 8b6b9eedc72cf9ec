//! Step 5: issue at most one instruction per cycle.

use crate::error::EngineError;
use crate::instruction::{Dest, Instruction};
use crate::registers::Bank;
use crate::station::{Operand, SlotState};
use crate::tag::{Category, Tag};

use super::Engine;

fn operand_of(engine: &Engine, bank: Bank, index: u8) -> Operand {
    match engine.status.owner(bank, index) {
        Some(tag) => Operand::Waiting(tag),
        None => Operand::Ready(engine.registers.read(bank, index)),
    }
}

impl Engine {
    /// Attempt to issue the instruction at the current PC into a free
    /// station/buffer of the appropriate class. Returns `Ok(true)` if
    /// something issued, `Ok(false)` if issue was a no-op this cycle
    /// (program exhausted, fetch stalled, or no free slot).
    pub(super) fn issue_one(&mut self) -> Result<bool, EngineError> {
        if self.fetch_stall {
            return Ok(false);
        }
        let pc = self.pc;
        let Some(instr) = self.program.get(pc).copied() else {
            return Ok(false);
        };

        let opcode = instr.opcode;
        let placed = if opcode.is_int_alu() {
            self.issue_alu(&instr, Bank::Int, Category::IntAlu)
        } else if opcode.is_fp_add() {
            self.issue_alu(&instr, Bank::Fp, Category::FpAdd)
        } else if opcode.is_fp_mul() {
            self.issue_alu(&instr, Bank::Fp, Category::FpMul)
        } else if opcode == crate::instruction::Opcode::Load {
            self.issue_load(&instr)
        } else {
            debug_assert_eq!(opcode, crate::instruction::Opcode::Store);
            self.issue_store(&instr)
        };

        let Some(tag) = placed else {
            log::trace!("cycle {}: issue stalled, no free slot for {:?}", self.cycle, opcode);
            return Ok(false);
        };

        // A loop revisits the same program index on a later pass; reset
        // the prior pass's stamps rather than leaving them stale for the
        // `exec_start.is_none()` check in `start_ready_executions`.
        self.program[pc].stamps = crate::instruction::Stamps::default();
        self.program[pc].stamps.issue = Some(self.cycle);
        if let Dest::IntReg(i) | Dest::FpReg(i) = instr.dest {
            let bank = if matches!(instr.dest, Dest::IntReg(_)) { Bank::Int } else { Bank::Fp };
            self.status.set_owner(bank, i, tag);
        }

        self.pc += 1;
        if opcode.is_branch() {
            self.fetch_stall = true;
        }
        log::trace!("cycle {}: issued {:?} into {}", self.cycle, opcode, tag);
        Ok(true)
    }

    fn station_slots(&mut self, category: Category) -> &mut Vec<crate::station::ReservationStation> {
        match category {
            Category::FpAdd => &mut self.fp_add,
            Category::FpMul => &mut self.fp_mul,
            Category::IntAlu => &mut self.int_alu,
        }
    }

    fn issue_alu(&mut self, instr: &Instruction, bank: Bank, category: Category) -> Option<Tag> {
        let vj = operand_of(self, bank, instr.src1);
        let vk = if instr.opcode.is_branch() || instr.opcode.is_fp_add() || instr.opcode.is_fp_mul() {
            operand_of(self, bank, instr.src2)
        } else {
            // ADDI/SUBI: the immediate doubles as Vk.
            Operand::Ready(instr.immediate)
        };
        let a = instr.immediate;

        let pc = self.pc;
        let slots = self.station_slots(category);
        let index = slots.iter().position(|s| s.state == SlotState::Free)?;
        let station = &mut slots[index];
        station.state = SlotState::Issued;
        station.instruction = Some(pc);
        station.vj = vj;
        station.vk = vk;
        station.a = a;
        station.remaining = 0;
        Some(station.tag)
    }

    fn issue_load(&mut self, instr: &Instruction) -> Option<Tag> {
        let base = operand_of(self, Bank::Int, instr.src1);
        let pc = self.pc;
        let index = self.loads.iter().position(|l| l.state == SlotState::Free)?;
        let buffer = &mut self.loads[index];
        buffer.state = SlotState::Issued;
        buffer.instruction = Some(pc);
        buffer.offset = instr.immediate;
        buffer.address = match base {
            Operand::Ready(value) => Operand::Ready(value + instr.immediate),
            Operand::Waiting(tag) => Operand::Waiting(tag),
        };
        buffer.remaining = 0;
        Some(buffer.tag)
    }

    fn issue_store(&mut self, instr: &Instruction) -> Option<Tag> {
        let base = operand_of(self, Bank::Int, instr.src1);
        let value_bank = if instr.is_fp_memory { Bank::Fp } else { Bank::Int };
        let value = operand_of(self, value_bank, instr.src2);

        let pc = self.pc;
        let index = self.stores.iter().position(|s| s.state == SlotState::Free)?;
        let buffer = &mut self.stores[index];
        buffer.state = SlotState::Issued;
        buffer.instruction = Some(pc);
        buffer.offset = instr.immediate;
        buffer.address = match base {
            Operand::Ready(v) => Operand::Ready(v + instr.immediate),
            Operand::Waiting(tag) => Operand::Waiting(tag),
        };
        buffer.value = value;
        buffer.remaining = 0;
        Some(buffer.tag)
    }
}
