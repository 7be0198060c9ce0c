use std::collections::HashMap;

use thiserror::Error;

use super::handlers::Handler;
use super::parsers::Parser;
use super::{enum_to_word, Funct, InstrKind, Opcode};
use crate::constants::{FUNCT_LIMIT, OPCODE_LIMIT};
use crate::{Byte, Word};

/// Error type for the registration methods of [`InstructionSet`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("mnemonic is empty")]
    EmptyMnemonic,
    #[error("mnemonic '{0}' contains whitespace")]
    MalformedMnemonic(String),
    #[error("mnemonic '{0}' is already registered")]
    DuplicateMnemonic(String),
    #[error("opcode {opcode} is out of range")]
    OpcodeOutOfRange { opcode: Word },
    #[error("funct {funct} is out of range")]
    FunctOutOfRange { funct: Word },
    #[error("opcode {opcode} is already registered with kind {kind}")]
    OpcodeKindConflict { opcode: Byte, kind: InstrKind },
    #[error("opcode {opcode} / funct {funct} is already registered")]
    DuplicateFunct { opcode: Byte, funct: Byte },
}

/// Everything the system knows about one mnemonic.
pub struct InstructionMetadata {
    mnemonic: String,
    kind: InstrKind,
    opcode: Byte,
    funct: Byte,
    parser: Parser,
    handler: Option<Handler>,
}

impl InstructionMetadata {
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn kind(&self) -> InstrKind {
        self.kind
    }
}

/// The instruction-set registry.
///
/// One vector owns the metadata; the mnemonic map and the `(opcode, funct)`
/// map hold indices into it, so the same entry is reachable both from the
/// assembler (by name) and from the pipeline (by decoded bits). Pseudo
/// instructions only exist on the mnemonic side.
#[derive(Default)]
pub struct InstructionSet {
    entries: Vec<InstructionMetadata>,
    by_mnemonic: HashMap<String, usize>,
    by_id: HashMap<u16, usize>,
    kind_by_opcode: HashMap<Byte, InstrKind>,
}

/// The 12-bit registry id combining funct and opcode.
#[inline]
fn instr_id(opcode: Byte, funct: Byte) -> u16 {
    (u16::from(funct) << 6) | u16::from(opcode)
}

impl InstructionSet {
    pub fn new() -> InstructionSet {
        Default::default()
    }

    /// Builds the registry holding the complete supported instruction set.
    pub fn mips() -> Result<InstructionSet, RegistryError> {
        let mut set = InstructionSet::new();
        let r_type = enum_to_word(Opcode::RType);

        set.register_r("add", r_type, enum_to_word(Funct::Add), Parser::Add, Handler::Add)?;
        set.register_r("sll", r_type, enum_to_word(Funct::Sll), Parser::Sll, Handler::Sll)?;
        set.register_r("slt", r_type, enum_to_word(Funct::Slt), Parser::Slt, Handler::Slt)?;
        set.register_r(
            "syscall",
            r_type,
            enum_to_word(Funct::Syscall),
            Parser::Syscall,
            Handler::Syscall,
        )?;

        set.register_i("addi", enum_to_word(Opcode::Addi), Parser::Addi, Handler::Addi)?;
        set.register_i("beq", enum_to_word(Opcode::Beq), Parser::Beq, Handler::Beq)?;
        set.register_i("bne", enum_to_word(Opcode::Bne), Parser::Bne, Handler::Bne)?;
        set.register_i("lb", enum_to_word(Opcode::Lb), Parser::Lb, Handler::Lb)?;
        set.register_i("lui", enum_to_word(Opcode::Lui), Parser::Lui, Handler::Lui)?;
        set.register_i("ori", enum_to_word(Opcode::Ori), Parser::Ori, Handler::Ori)?;

        set.register_pseudo("b", Parser::B)?;
        set.register_pseudo("beqz", Parser::Beqz)?;
        set.register_pseudo("bge", Parser::Bge)?;
        set.register_pseudo("la", Parser::La)?;
        set.register_pseudo("li", Parser::Li)?;
        set.register_pseudo("nop", Parser::Nop)?;
        set.register_pseudo("subi", Parser::Subi)?;

        Ok(set)
    }

    pub fn register_r(
        &mut self,
        mnemonic: &str,
        opcode: Word,
        funct: Word,
        parser: Parser,
        handler: Handler,
    ) -> Result<(), RegistryError> {
        self.register_real(mnemonic, InstrKind::R, opcode, funct, parser, handler)
    }

    pub fn register_i(
        &mut self,
        mnemonic: &str,
        opcode: Word,
        parser: Parser,
        handler: Handler,
    ) -> Result<(), RegistryError> {
        self.register_real(mnemonic, InstrKind::I, opcode, 0, parser, handler)
    }

    pub fn register_j(
        &mut self,
        mnemonic: &str,
        opcode: Word,
        parser: Parser,
        handler: Handler,
    ) -> Result<(), RegistryError> {
        self.register_real(mnemonic, InstrKind::J, opcode, 0, parser, handler)
    }

    pub fn register_pseudo(&mut self, mnemonic: &str, parser: Parser) -> Result<(), RegistryError> {
        let mnemonic = self.check_mnemonic(mnemonic)?;

        self.entries.push(InstructionMetadata {
            mnemonic: mnemonic.clone(),
            kind: InstrKind::Pseudo,
            opcode: 0,
            funct: 0,
            parser,
            handler: None,
        });
        self.by_mnemonic.insert(mnemonic, self.entries.len() - 1);
        Ok(())
    }

    // All checks run before the first mutation, so a failed registration
    // leaves the registry exactly as it was.
    fn register_real(
        &mut self,
        mnemonic: &str,
        kind: InstrKind,
        opcode: Word,
        funct: Word,
        parser: Parser,
        handler: Handler,
    ) -> Result<(), RegistryError> {
        let mnemonic = self.check_mnemonic(mnemonic)?;

        if opcode > OPCODE_LIMIT {
            return Err(RegistryError::OpcodeOutOfRange { opcode });
        }
        if funct > FUNCT_LIMIT {
            return Err(RegistryError::FunctOutOfRange { funct });
        }

        let opcode = opcode as Byte;
        let funct = funct as Byte;

        if let Some(&registered) = self.kind_by_opcode.get(&opcode) {
            if registered != kind {
                return Err(RegistryError::OpcodeKindConflict {
                    opcode,
                    kind: registered,
                });
            }
        }

        let id = instr_id(opcode, funct);
        if self.by_id.contains_key(&id) {
            return Err(RegistryError::DuplicateFunct { opcode, funct });
        }

        self.entries.push(InstructionMetadata {
            mnemonic: mnemonic.clone(),
            kind,
            opcode,
            funct,
            parser,
            handler: Some(handler),
        });
        let index = self.entries.len() - 1;
        self.by_mnemonic.insert(mnemonic, index);
        self.by_id.insert(id, index);
        self.kind_by_opcode.insert(opcode, kind);
        Ok(())
    }

    fn check_mnemonic(&self, mnemonic: &str) -> Result<String, RegistryError> {
        let normalized = mnemonic.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(RegistryError::EmptyMnemonic);
        }
        if normalized.contains(char::is_whitespace) {
            return Err(RegistryError::MalformedMnemonic(normalized));
        }
        if self.by_mnemonic.contains_key(&normalized) {
            return Err(RegistryError::DuplicateMnemonic(normalized));
        }
        Ok(normalized)
    }

    /// Looks up the parser for a mnemonic (real or pseudo).
    pub fn parser(&self, mnemonic: &str) -> Option<&Parser> {
        let normalized = mnemonic.trim().to_lowercase();
        self.by_mnemonic
            .get(&normalized)
            .map(|&index| &self.entries[index].parser)
    }

    /// Looks up the handler registered for an `(opcode, funct)` pair. Pass
    /// funct 0 for non-R opcodes.
    pub fn handler(&self, opcode: Byte, funct: Byte) -> Option<&Handler> {
        self.by_id
            .get(&instr_id(opcode, funct))
            .and_then(|&index| self.entries[index].handler.as_ref())
    }

    pub fn kind_of_opcode(&self, opcode: Byte) -> InstrKind {
        self.kind_by_opcode
            .get(&opcode)
            .copied()
            .unwrap_or(InstrKind::Unknown)
    }

    pub fn kind_of_mnemonic(&self, mnemonic: &str) -> InstrKind {
        let normalized = mnemonic.trim().to_lowercase();
        self.by_mnemonic
            .get(&normalized)
            .map(|&index| self.entries[index].kind)
            .unwrap_or(InstrKind::Unknown)
    }
}
