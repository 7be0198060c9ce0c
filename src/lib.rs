//! Core library for a pipelined MIPS-I simulator.
//!
//! The crate models the processor side of the system: byte-addressable
//! [`Memory`] split into text and data segments, the [`RegisterBank`], the
//! [`Instruction`] record with its bit-exact [`encode`]/[`decode`] pair, the
//! [`InstructionSet`] registry that maps mnemonics and `(opcode, funct)` pairs
//! to parsers and handlers, and the five-stage [`Processor`] pipeline with
//! operand forwarding.
//!
//! Assembling source text into a memory image is the job of the `masm` crate,
//! which drives the per-mnemonic parsers registered here.

pub mod console;
pub mod constants;
pub mod instr;
pub mod memory;
pub mod pipeline;
pub mod register;

#[cfg(test)]
mod test;

/// One unsigned machine word.
pub type Word = u32;
/// One signed machine word.
pub type SWord = i32;
/// Half of a machine word.
pub type Half = u16;
/// A single byte.
pub type Byte = u8;
/// A byte address in user space.
pub type Address = u32;

/// Byte order used for every multi-byte memory access.
pub type Endian = byteorder::LittleEndian;

pub use crate::console::Console;
pub use crate::instr::encoding::{decode, encode, EncodeError};
pub use crate::instr::handlers::Handler;
pub use crate::instr::parsers::{Parser, SyntaxError};
pub use crate::instr::set::{InstructionSet, RegistryError};
pub use crate::instr::{Funct, InstrKind, Instruction, Opcode};
pub use crate::memory::{Memory, MemoryError};
pub use crate::pipeline::{Fault, Processor, RunStats};
pub use crate::register::RegisterBank;
