use crate::{Byte, Word};

/// Carries the fetched word from IF to ID.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchBuffer {
    pub instruction: Word,
}

/// Carries the decoded instruction from ID to EX.
///
/// `dest` is the write-back register (`rd` for R-form, `rt` for I-form);
/// `None` means the instruction produces no register result. For R-form
/// instructions the shift amount travels in the `immediate` slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeBuffer {
    pub opcode: Byte,
    pub funct: Byte,
    pub immediate: Word,
    pub dest: Option<Byte>,
    pub src1: Option<Byte>,
    pub src2: Option<Byte>,
    pub val_src1: Word,
    pub val_src2: Word,
    pub exit: bool,
}

/// Carries the ALU result from EX to MEM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecuteBuffer {
    pub opcode: Byte,
    pub funct: Byte,
    pub output: Word,
    pub dest: Option<Byte>,
    pub rt_value: Word,
}

/// Carries the stage output from MEM to WB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryBuffer {
    pub opcode: Byte,
    pub funct: Byte,
    pub output: Word,
    pub dest: Option<Byte>,
}
