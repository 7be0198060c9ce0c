use thiserror::Error;

use super::{InstrKind, Instruction};
use crate::constants::*;
use crate::Word;

/// Error type for [`encode`] and [`decode`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// Only R, I and J records have a binary representation.
    #[error("instructions of kind {0} have no binary encoding")]
    IllegalEncode(InstrKind),
}

/// Packs an instruction record into its 32-bit word.
pub fn encode(instr: &Instruction) -> Result<Word, EncodeError> {
    let opcode = (Word::from(instr.opcode()) << OPCODE_OFFSET) & OPCODE_MASK;

    match instr.kind() {
        InstrKind::R => Ok(opcode
            | ((Word::from(instr.rs()) << RS_OFFSET) & RS_MASK)
            | ((Word::from(instr.rt()) << RT_OFFSET) & RT_MASK)
            | ((Word::from(instr.rd()) << RD_OFFSET) & RD_MASK)
            | ((Word::from(instr.shamt()) << SHAMT_OFFSET) & SHAMT_MASK)
            | ((Word::from(instr.funct()) << FUNCT_OFFSET) & FUNCT_MASK)),
        InstrKind::I => Ok(opcode
            | ((Word::from(instr.rs()) << RS_OFFSET) & RS_MASK)
            | ((Word::from(instr.rt()) << RT_OFFSET) & RT_MASK)
            | ((Word::from(instr.immediate()) << IMMEDIATE_OFFSET) & IMMEDIATE_MASK)),
        InstrKind::J => Ok(opcode | ((instr.address() << ADDRESS_OFFSET) & ADDRESS_MASK)),
        kind => Err(EncodeError::IllegalEncode(kind)),
    }
}

/// Unpacks a 32-bit word into an instruction record of the given kind.
///
/// The kind is supplied by the caller (the pipeline resolves it through the
/// instruction set); it is never re-inferred from the opcode bits.
pub fn decode(word: Word, kind: InstrKind) -> Result<Instruction, EncodeError> {
    let mut instr = Instruction::new(kind);
    instr.set_opcode((word & OPCODE_MASK) >> OPCODE_OFFSET);

    match kind {
        InstrKind::R => {
            instr.set_rs((word & RS_MASK) >> RS_OFFSET);
            instr.set_rt((word & RT_MASK) >> RT_OFFSET);
            instr.set_rd((word & RD_MASK) >> RD_OFFSET);
            instr.set_shamt((word & SHAMT_MASK) >> SHAMT_OFFSET);
            instr.set_funct((word & FUNCT_MASK) >> FUNCT_OFFSET);
        }
        InstrKind::I => {
            instr.set_rs((word & RS_MASK) >> RS_OFFSET);
            instr.set_rt((word & RT_MASK) >> RT_OFFSET);
            instr.set_immediate((word & IMMEDIATE_MASK) >> IMMEDIATE_OFFSET);
        }
        InstrKind::J => {
            instr.set_address((word & ADDRESS_MASK) >> ADDRESS_OFFSET);
        }
        kind => return Err(EncodeError::IllegalEncode(kind)),
    }

    Ok(instr)
}
