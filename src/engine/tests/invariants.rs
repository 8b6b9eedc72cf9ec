//! Structural invariants, checked after every cycle across a handful of
//! representative programs rather than just at the end.

use super::*;

fn run_checking_invariants(engine: &mut Engine, max_cycles: u64) {
    for _ in 0..max_cycles {
        let report = engine.advance_cycle().expect("cycle should not fault");
        assert_owner_invariant(engine);
        assert_single_cdb_invariant(engine);
        if report.no_progress() {
            return;
        }
    }
    panic!("program did not quiesce within {max_cycles} cycles");
}

#[test]
fn invariants_hold_across_alu_chain() {
    let program = vec![
        Instruction::int_immediate(Opcode::Addi, 1, 0, 24),
        Instruction::int_immediate(Opcode::Subi, 2, 1, 8),
        Instruction::int_immediate(Opcode::Addi, 3, 2, 1),
    ];
    let mut engine = Engine::new(program, EngineConfig::default()).unwrap();
    run_checking_invariants(&mut engine, 1_000);
}

#[test]
fn invariants_hold_across_mixed_fp_and_memory_program() {
    use crate::instruction::Dest;

    let program = vec![
        // F0 = 0 (via an integer store/load round trip is overkill; seed
        // directly through an FP add of two zero registers is trivial, so
        // exercise FP mul/div and a load/store pair instead).
        Instruction::fp_op(Opcode::FpMul, 0, 1, 1), // F0 = F1 * F1 = 0
        Instruction::store(0, true, 0, 0, true),    // SD F0, 0(R0)
        Instruction::load(Dest::FpReg(2), 0, 0, true), // LD F2, 0(R0)
        Instruction::fp_op(Opcode::FpDiv, 3, 2, 0), // F3 = F2 / F0 (div by zero concession)
        Instruction::int_immediate(Opcode::Addi, 1, 0, 10),
        Instruction::int_immediate(Opcode::Subi, 1, 1, 3),
    ];
    let mut engine = Engine::new(program, EngineConfig::default()).unwrap();
    run_checking_invariants(&mut engine, 1_000);

    assert_eq!(engine.registers().read(Bank::Fp, 3), 0, "division by zero is a documented concession, not a trap");
}

#[test]
fn invariants_hold_with_loop() {
    let program = vec![
        Instruction::int_immediate(Opcode::Addi, 1, 0, 40),
        Instruction::int_immediate(Opcode::Subi, 1, 1, 8),
        Instruction::branch(Opcode::Bne, 1, 0, 1),
    ];
    let mut engine = Engine::new(program, EngineConfig::default()).unwrap();
    run_checking_invariants(&mut engine, 1_000);
    assert_eq!(engine.registers().read(Bank::Int, 1), 0);
}
