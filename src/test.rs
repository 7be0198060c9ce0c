//! End-to-end programs run against the pipeline with hand-encoded words.

use std::io::Cursor;

use crate::instr::encoding::encode;
use crate::instr::{enum_to_word, Funct, InstrKind, Instruction, Opcode};
use crate::console::Console;
use crate::constants::MEM_USER_START;
use crate::instr::set::InstructionSet;
use crate::memory::Memory;
use crate::pipeline::{Fault, Processor, RunStats};
use crate::{Byte, Half, Word};

fn r_word(funct: Funct, rd: Byte, rs: Byte, rt: Byte, shamt: Byte) -> Word {
    let mut instr = Instruction::new(InstrKind::R);
    assert!(instr.set_opcode(enum_to_word(Opcode::RType)));
    assert!(instr.set_funct(enum_to_word(funct)));
    assert!(instr.set_rd(rd.into()));
    assert!(instr.set_rs(rs.into()));
    assert!(instr.set_rt(rt.into()));
    assert!(instr.set_shamt(shamt.into()));
    encode(&instr).unwrap()
}

fn i_word(opcode: Opcode, rs: Byte, rt: Byte, immediate: Half) -> Word {
    let mut instr = Instruction::new(InstrKind::I);
    assert!(instr.set_opcode(enum_to_word(opcode)));
    assert!(instr.set_rs(rs.into()));
    assert!(instr.set_rt(rt.into()));
    assert!(instr.set_immediate(immediate.into()));
    encode(&instr).unwrap()
}

fn load_program(words: &[Word]) -> Memory {
    let mut memory = Memory::default();
    let mut addr = MEM_USER_START;
    for &word in words {
        memory.write_word(addr, word).unwrap();
        addr += 4;
    }
    memory
}

fn run_program(words: &[Word], input: &str) -> (Processor, RunStats, String) {
    let set = InstructionSet::mips().unwrap();
    let mut memory = load_program(words);
    let mut console = Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
    let mut processor = Processor::new();

    let stats = processor.run(&set, &mut memory, &mut console).unwrap();

    let (_, output) = console.into_inner();
    (processor, stats, String::from_utf8(output).unwrap())
}

fn run_for_fault(words: &[Word]) -> Fault {
    let set = InstructionSet::mips().unwrap();
    let mut memory = load_program(words);
    let mut console = Console::new(Cursor::new(Vec::new()), Vec::new());
    let mut processor = Processor::new();

    match processor.run(&set, &mut memory, &mut console) {
        Err(fault) => fault,
        Ok(stats) => panic!("program terminated normally: {:?}", stats),
    }
}

// li expands to ori $rt, $0, imm; encode it directly here.
fn li_word(rt: Byte, immediate: Half) -> Word {
    i_word(Opcode::Ori, 0, rt, immediate)
}

#[test]
fn minimal_exit_costs_two_instructions_plus_three_drain_cycles() {
    let program = [li_word(2, 10), r_word(Funct::Syscall, 0, 0, 0, 0)];
    let (_, stats, output) = run_program(&program, "");

    assert!(output.is_empty());
    assert_eq!(stats.cycles, 5);
    assert_eq!(stats.instructions, 2);
    assert_eq!(stats.nops, 3);
}

#[test]
fn forwarded_add_chain_produces_thirteen() {
    let program = [
        i_word(Opcode::Addi, 0, 8, 5),  // addi $t0, $0, 5
        i_word(Opcode::Addi, 8, 9, 3),  // addi $t1, $t0, 3
        r_word(Funct::Add, 10, 8, 9, 0), // add $t2, $t0, $t1
        li_word(2, 10),
        r_word(Funct::Syscall, 0, 0, 0, 0),
    ];
    let (processor, _, _) = run_program(&program, "");

    assert_eq!(processor.register(8), 5);
    assert_eq!(processor.register(9), 8);
    assert_eq!(processor.register(10), 13);
}

#[test]
fn backward_branch_loops_until_the_counter_drains() {
    let program = [
        i_word(Opcode::Addi, 0, 8, 3),                // addi $t0, $0, 3
        i_word(Opcode::Addi, 8, 8, (-1i16) as u16),   // subi $t0, $t0, 1
        i_word(Opcode::Bne, 0, 8, (-8i16) as u16),    // bne $t0, $0, loop
        li_word(2, 10),
        r_word(Funct::Syscall, 0, 0, 0, 0),
    ];
    let (processor, stats, _) = run_program(&program, "");

    assert_eq!(processor.register(8), 0);
    // Three decrements plus the surrounding instructions; the loop finished.
    assert!(stats.instructions >= 9);
}

#[test]
fn slt_and_sll_feed_write_back() {
    let program = [
        i_word(Opcode::Addi, 0, 8, 2),     // $t0 = 2
        i_word(Opcode::Addi, 0, 9, 5),     // $t1 = 5
        r_word(Funct::Slt, 10, 8, 9, 0),   // $t2 = ($t0 < $t1) = 1
        r_word(Funct::Sll, 11, 0, 9, 3),   // $t3 = $t1 << 3 = 40
        li_word(2, 10),
        r_word(Funct::Syscall, 0, 0, 0, 0),
    ];
    let (processor, _, _) = run_program(&program, "");

    assert_eq!(processor.register(10), 1);
    assert_eq!(processor.register(11), 40);
}

#[test]
fn lui_ori_pair_builds_a_full_word() {
    let program = [
        i_word(Opcode::Lui, 0, 8, 0x1234),  // lui $t0, 0x1234
        i_word(Opcode::Ori, 8, 8, 0x5678),  // ori $t0, $t0, 0x5678
        li_word(2, 10),
        r_word(Funct::Syscall, 0, 0, 0, 0),
    ];
    let (processor, _, _) = run_program(&program, "");

    assert_eq!(processor.register(8), 0x1234_5678);
}

#[test]
fn print_string_syscall_reaches_stdout() {
    let data = 0x2000u16; // data segment base with the default sizes
    let program = [
        li_word(2, 4),            // $v0 = print_string
        li_word(4, data),         // $a0 = message address
        r_word(Funct::Syscall, 0, 0, 0, 0),
        li_word(2, 10),
        r_word(Funct::Syscall, 0, 0, 0, 0),
    ];

    let set = InstructionSet::mips().unwrap();
    let mut memory = load_program(&program);
    memory.write_string(0x2000, "hi").unwrap();

    let mut console = Console::new(Cursor::new(Vec::new()), Vec::new());
    let mut processor = Processor::new();
    processor.run(&set, &mut memory, &mut console).unwrap();

    let (_, output) = console.into_inner();
    assert_eq!(output, b"hi");
}

#[test]
fn read_string_syscall_stores_a_truncated_line() {
    let program = [
        li_word(2, 8),       // $v0 = read_string
        li_word(4, 0x2000),  // $a0 = buffer
        li_word(5, 6),       // $a1 = max bytes
        r_word(Funct::Syscall, 0, 0, 0, 0),
        li_word(2, 4),       // print it back
        r_word(Funct::Syscall, 0, 0, 0, 0),
        li_word(2, 10),
        r_word(Funct::Syscall, 0, 0, 0, 0),
    ];
    let (_, _, output) = run_program(&program, "hello world\n");

    assert_eq!(output, "hello");
}

#[test]
fn lb_reads_bytes_through_the_memory_stage() {
    let program = [
        li_word(4, 0x2000),                      // $a0 = data address
        i_word(Opcode::Lb, 4, 8, 0),             // lb $t0, 0($a0)
        i_word(Opcode::Lb, 4, 9, 1),             // lb $t1, 1($a0)
        li_word(2, 10),
        r_word(Funct::Syscall, 0, 0, 0, 0),
    ];

    let set = InstructionSet::mips().unwrap();
    let mut memory = load_program(&program);
    memory.write_byte(0x2000, 0x41).unwrap();
    memory.write_byte(0x2001, 0xFF).unwrap();

    let mut console = Console::new(Cursor::new(Vec::new()), Vec::new());
    let mut processor = Processor::new();
    processor.run(&set, &mut memory, &mut console).unwrap();

    assert_eq!(processor.register(8), 0x41);
    assert_eq!(processor.register(9), 0xFF);
}

#[test]
fn load_outside_memory_faults_with_a_segfault() {
    let program = [
        i_word(Opcode::Lb, 0, 8, 0), // lb $t0, 0($0)
        li_word(2, 10),
        r_word(Funct::Syscall, 0, 0, 0, 0),
    ];
    match run_for_fault(&program) {
        Fault::Segfault(addr) => assert_eq!(addr, 0),
        other => panic!("expected a segfault, got {:?}", other),
    }
}

#[test]
fn unknown_opcode_faults_as_illegal_instruction() {
    // Opcode 20 (lhu) is never registered.
    let word = 20u32;
    let program = [word, li_word(2, 10), r_word(Funct::Syscall, 0, 0, 0, 0)];
    match run_for_fault(&program) {
        Fault::IllegalInstruction(w) => assert_eq!(w, word),
        other => panic!("expected an illegal instruction, got {:?}", other),
    }
}

#[test]
fn unknown_syscall_faults() {
    let program = [li_word(2, 77), r_word(Funct::Syscall, 0, 0, 0, 0)];
    match run_for_fault(&program) {
        Fault::BadSyscall(code) => assert_eq!(code, 77),
        other => panic!("expected a bad syscall, got {:?}", other),
    }
}

#[test]
fn misaligned_branch_target_faults_on_fetch() {
    // beq $0, $0, offset 2 lands the PC off the word grid.
    let program = [i_word(Opcode::Beq, 0, 0, 2)];
    match run_for_fault(&program) {
        Fault::Misaligned(addr) => assert_eq!(addr % 4, 2),
        other => panic!("expected a misaligned fetch, got {:?}", other),
    }
}

#[test]
fn running_off_the_text_segment_faults() {
    // A single wild branch drives the PC below the text base.
    let program = [i_word(Opcode::Beq, 0, 0, (-32i16) as u16)];
    match run_for_fault(&program) {
        Fault::Segfault(_) => {}
        other => panic!("expected a segfault, got {:?}", other),
    }
}

#[test]
fn register_zero_stays_zero_through_write_back() {
    let program = [
        i_word(Opcode::Addi, 0, 0, 41), // addi $zero, $0, 41
        li_word(2, 10),
        r_word(Funct::Syscall, 0, 0, 0, 0),
    ];
    let (processor, _, _) = run_program(&program, "");
    assert_eq!(processor.register(0), 0);
}
