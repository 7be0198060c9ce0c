use std::io::{BufRead, Write};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::console::Console;
use crate::memory::Memory;
use crate::pipeline::buffers::{DecodeBuffer, ExecuteBuffer};
use crate::pipeline::Fault;
use crate::register::{RegisterBank, REG_A0, REG_A1, REG_V0};
use crate::{Address, Word};

/// Syscall numbers dispatched on `$v0`.
#[derive(FromPrimitive)]
enum SyscallCode {
    PrintString = 4,
    ReadString = 8,
    Exit = 10,
}

#[inline]
fn sign_extend_16(value: Word) -> Word {
    (value as u16) as i16 as i32 as Word
}

/// One handler per real instruction. Each defines the three per-cycle hooks:
///
/// * `on_decode` runs at the end of the ID stage. Branches adjust the PC
///   here and syscalls execute immediately; both return a replacement
///   all-zero buffer that turns the slot into a NOP for the later stages.
/// * `on_execute` is the ALU or address computation.
/// * `on_memory` produces the value handed to write-back; loads touch memory
///   here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handler {
    Add,
    Sll,
    Slt,
    Syscall,
    Addi,
    Beq,
    Bne,
    Lb,
    Lui,
    Ori,
}

impl Handler {
    pub fn on_decode<R: BufRead, W: Write>(
        &self,
        buffer: &DecodeBuffer,
        registers: &RegisterBank,
        memory: &mut Memory,
        pc: &mut Address,
        console: &mut Console<R, W>,
    ) -> Result<Option<DecodeBuffer>, Fault> {
        match self {
            Handler::Beq | Handler::Bne => {
                // The first operand travels in the destination slot; its
                // value is read fresh from the bank, the second operand's
                // value was captured while the buffer was populated.
                let dest_value = buffer.dest.map(|reg| registers.read(reg)).unwrap_or(0);
                let taken = match self {
                    Handler::Beq => dest_value == buffer.val_src1,
                    _ => dest_value != buffer.val_src1,
                };
                if taken {
                    *pc = pc.wrapping_add(sign_extend_16(buffer.immediate));
                }
                Ok(Some(DecodeBuffer::default()))
            }
            Handler::Syscall => self.system_call(registers, memory, console),
            _ => Ok(None),
        }
    }

    pub fn on_execute(&self, buffer: &DecodeBuffer) -> Word {
        match self {
            Handler::Add => buffer.val_src1.wrapping_add(buffer.val_src2),
            Handler::Sll => buffer.val_src2.wrapping_shl(buffer.immediate),
            Handler::Slt => {
                if (buffer.val_src1 as i32) < (buffer.val_src2 as i32) {
                    1
                } else {
                    0
                }
            }
            Handler::Addi => buffer.val_src1.wrapping_add(sign_extend_16(buffer.immediate)),
            Handler::Lb => buffer.val_src1.wrapping_add(sign_extend_16(buffer.immediate)),
            Handler::Lui => buffer.immediate << 16,
            Handler::Ori => buffer.val_src1 | (buffer.immediate & 0xFFFF),
            Handler::Syscall | Handler::Beq | Handler::Bne => 0,
        }
    }

    pub fn on_memory(&self, buffer: &ExecuteBuffer, memory: &Memory) -> Result<Word, Fault> {
        match self {
            Handler::Lb => memory
                .read_byte(buffer.output)
                .map(Word::from)
                .map_err(|_| Fault::Segfault(buffer.output)),
            Handler::Add | Handler::Sll | Handler::Slt | Handler::Addi | Handler::Lui
            | Handler::Ori => Ok(buffer.output),
            Handler::Syscall | Handler::Beq | Handler::Bne => Ok(0),
        }
    }

    fn system_call<R: BufRead, W: Write>(
        &self,
        registers: &RegisterBank,
        memory: &mut Memory,
        console: &mut Console<R, W>,
    ) -> Result<Option<DecodeBuffer>, Fault> {
        let code = registers.read(REG_V0);

        match SyscallCode::from_u32(code) {
            Some(SyscallCode::PrintString) => {
                let addr = registers.read(REG_A0);
                let text = memory.read_string(addr).map_err(|_| Fault::Segfault(addr))?;
                console.print(&text)?;
                Ok(Some(DecodeBuffer::default()))
            }
            Some(SyscallCode::ReadString) => {
                let addr = registers.read(REG_A0);
                let max = registers.read(REG_A1);

                if max > 0 {
                    let line = console.read_line()?;
                    let mut bytes = line.into_bytes();
                    bytes.truncate(max as usize - 1);

                    for (i, &byte) in bytes.iter().enumerate() {
                        let target = addr.wrapping_add(i as Word);
                        memory
                            .write_byte(target, byte)
                            .map_err(|_| Fault::Segfault(target))?;
                    }
                    let terminator = addr.wrapping_add(bytes.len() as Word);
                    memory
                        .write_byte(terminator, 0)
                        .map_err(|_| Fault::Segfault(terminator))?;
                }
                Ok(Some(DecodeBuffer::default()))
            }
            Some(SyscallCode::Exit) => {
                let mut replacement = DecodeBuffer::default();
                replacement.exit = true;
                Ok(Some(replacement))
            }
            None => Err(Fault::BadSyscall(code)),
        }
    }
}
