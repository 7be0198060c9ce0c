pub mod buffers;

use std::io::{BufRead, Write};

use log::trace;
use thiserror::Error;

use self::buffers::{DecodeBuffer, ExecuteBuffer, FetchBuffer, MemoryBuffer};
use crate::console::Console;
use crate::constants::{MEM_USER_START, OPCODE_MASK, WORD_BYTES};
use crate::instr::encoding::decode;
use crate::instr::set::InstructionSet;
use crate::instr::{InstrKind, Instruction};
use crate::memory::Memory;
use crate::register::RegisterBank;
use crate::{Address, Byte, Word};

/// A fatal execution fault. Every variant terminates the run; the caller
/// logs the fault and exits with a failure code.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("SIGSEGV: access outside the mapped region at {0:#010x}")]
    Segfault(Address),
    #[error("SIGBUS: misaligned instruction fetch at {0:#010x}")]
    Misaligned(Address),
    #[error("SIGILL: illegal instruction word {0:#010x}")]
    IllegalInstruction(Word),
    #[error("SIGSYS: bad syscall number {0}")]
    BadSyscall(Word),
    #[error("console I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters reported when a program terminates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub instructions: u64,
    pub nops: u64,
}

/// The five-stage pipeline engine.
///
/// Each iteration of the run loop advances every stage by one cycle. The
/// stages are evaluated so that each one consumes the buffer its predecessor
/// produced in the *previous* cycle: MEM and WB run first (completing the
/// instruction issued two cycles ago), then ID and EX (the instruction
/// issued last cycle), and fetch runs last. Running fetch after decode is
/// what gives a branch its PC-relative base of "branch address + 4" and
/// lets a taken branch steer the very next fetch, with no wrong-path word
/// ever entering the pipe.
///
/// Operand forwarding happens at the start of EX: a source that matches the
/// previous EX destination takes that ALU output; failing that, a match
/// against this cycle's MEM output (the same instruction one stage later)
/// takes the memory result. Register 0 is never forwarded.
pub struct Processor {
    registers: RegisterBank,
    pc: Address,
}

impl Processor {
    pub fn new() -> Processor {
        Processor {
            registers: RegisterBank::new(),
            pc: MEM_USER_START,
        }
    }

    /// Inspection hook used by the end-to-end tests.
    pub fn register(&self, num: Byte) -> Word {
        self.registers.read(num)
    }

    /// Runs the program in `memory` until the exit syscall raises the exit
    /// flag, then drains the pipe for two further cycles so every issued
    /// instruction completes write-back.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        set: &InstructionSet,
        memory: &mut Memory,
        console: &mut Console<R, W>,
    ) -> Result<RunStats, Fault> {
        self.pc = MEM_USER_START;

        let mut stats = RunStats::default();
        let mut old_fetch = FetchBuffer::default();
        let mut old_execute = ExecuteBuffer::default();
        let mut exited = false;
        let mut drained = 0u32;

        loop {
            // MEM: complete the instruction that executed last cycle. The
            // result is available to EX below as the second forwarding
            // source before write-back happens.
            let memory_handler = set
                .handler(old_execute.opcode, old_execute.funct)
                .ok_or_else(|| Fault::IllegalInstruction(Word::from(old_execute.opcode)))?;
            let memory_buffer = MemoryBuffer {
                opcode: old_execute.opcode,
                funct: old_execute.funct,
                output: memory_handler.on_memory(&old_execute, memory)?,
                dest: old_execute.dest,
            };

            // WB: register 0 silently discards the write.
            if let Some(dest) = memory_buffer.dest {
                self.registers.write(dest, memory_buffer.output);
            }

            // ID: decode the word fetched last cycle.
            let word = old_fetch.instruction;
            if word == 0 {
                stats.nops += 1;
            } else {
                stats.instructions += 1;
            }

            let opcode = (word & OPCODE_MASK) as Byte;
            let kind = set.kind_of_opcode(opcode);
            let record = match kind {
                InstrKind::R | InstrKind::I | InstrKind::J => decode(word, kind)
                    .map_err(|_| Fault::IllegalInstruction(word))?,
                _ => return Err(Fault::IllegalInstruction(word)),
            };

            let funct = record.funct();
            let decode_handler = set
                .handler(opcode, funct)
                .ok_or_else(|| Fault::IllegalInstruction(word))?;

            let mut decode_buffer = populate(kind, &record, &self.registers);
            if let Some(replacement) = decode_handler.on_decode(
                &decode_buffer,
                &self.registers,
                memory,
                &mut self.pc,
                console,
            )? {
                decode_buffer = replacement;
            }
            if decode_buffer.exit {
                exited = true;
            }

            // EX: forward, then compute. A rewrite above may have turned the
            // slot into a NOP, so the handler is looked up again.
            forward(&mut decode_buffer, &old_execute, &memory_buffer);
            let execute_handler = set
                .handler(decode_buffer.opcode, decode_buffer.funct)
                .ok_or_else(|| Fault::IllegalInstruction(word))?;
            let new_execute = ExecuteBuffer {
                opcode: decode_buffer.opcode,
                funct: decode_buffer.funct,
                output: execute_handler.on_execute(&decode_buffer),
                dest: decode_buffer.dest,
                rt_value: decode_buffer.val_src2,
            };

            // IF: suppressed once the exit flag is up; the pipe drains on
            // all-zero NOP words.
            let new_fetch = if exited {
                FetchBuffer::default()
            } else {
                let text_end = MEM_USER_START + memory.text_size() as Address;
                if self.pc < MEM_USER_START || self.pc >= text_end {
                    return Err(Fault::Segfault(self.pc));
                }
                if self.pc % WORD_BYTES != 0 {
                    return Err(Fault::Misaligned(self.pc));
                }
                let instruction = memory
                    .read_word(self.pc)
                    .map_err(|_| Fault::Segfault(self.pc))?;
                self.pc += WORD_BYTES;
                FetchBuffer { instruction }
            };

            stats.cycles += 1;
            trace!(
                "cycle {}: pc={:#010x} if={:#010x} id=op{}/f{} ex={:#010x} mem={:#010x}",
                stats.cycles,
                self.pc,
                new_fetch.instruction,
                decode_buffer.opcode,
                decode_buffer.funct,
                new_execute.output,
                memory_buffer.output,
            );

            old_fetch = new_fetch;
            old_execute = new_execute;

            if exited {
                drained += 1;
                if drained > 2 {
                    break;
                }
            }
        }

        Ok(stats)
    }
}

impl Default for Processor {
    fn default() -> Processor {
        Processor::new()
    }
}

/// Builds the decode buffer for one instruction record, reading source
/// registers from the bank.
fn populate(kind: InstrKind, record: &Instruction, registers: &RegisterBank) -> DecodeBuffer {
    match kind {
        InstrKind::R => DecodeBuffer {
            opcode: record.opcode(),
            funct: record.funct(),
            immediate: Word::from(record.shamt()),
            dest: Some(record.rd()),
            src1: Some(record.rs()),
            src2: Some(record.rt()),
            val_src1: registers.read(record.rs()),
            val_src2: registers.read(record.rt()),
            exit: false,
        },
        InstrKind::I => DecodeBuffer {
            opcode: record.opcode(),
            funct: 0,
            immediate: Word::from(record.immediate()),
            dest: Some(record.rt()),
            src1: Some(record.rs()),
            src2: None,
            val_src1: registers.read(record.rs()),
            val_src2: 0,
            exit: false,
        },
        _ => DecodeBuffer {
            opcode: record.opcode(),
            funct: 0,
            immediate: record.address(),
            dest: None,
            src1: None,
            src2: None,
            val_src1: 0,
            val_src2: 0,
            exit: false,
        },
    }
}

/// Operand forwarding at the head of EX. The previous EX output has first
/// priority, this cycle's MEM output second; register 0 stays hardwired.
fn forward(buffer: &mut DecodeBuffer, execute: &ExecuteBuffer, memory: &MemoryBuffer) {
    if let Some(src) = buffer.src1 {
        if src != 0 {
            if execute.dest == Some(src) {
                buffer.val_src1 = execute.output;
            } else if memory.dest == Some(src) {
                buffer.val_src1 = memory.output;
            }
        }
    }
    if let Some(src) = buffer.src2 {
        if src != 0 {
            if execute.dest == Some(src) {
                buffer.val_src2 = execute.output;
            } else if memory.dest == Some(src) {
                buffer.val_src2 = memory.output;
            }
        }
    }
}
