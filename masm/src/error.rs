use thiserror::Error;

use mcpu::{EncodeError, MemoryError, SyntaxError};

/// Everything that can stop an assembly run. All variants are raised before
/// the program starts executing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("duplicate label '{label}'")]
    DuplicateLabel { label: String },

    #[error("malformed label '{label}'")]
    BadLabel { label: String },

    #[error("unknown label '{label}'")]
    UnknownLabel { label: String },

    #[error("unknown instruction: '{line}'")]
    UnknownInstruction { line: String },

    #[error("unknown directive: '{line}'")]
    UnknownDirective { line: String },

    #[error("malformed directive operand: '{line}'")]
    BadOperand { line: String },

    #[error("branch to '{label}' is out of signed 16-bit range")]
    BranchOutOfRange { label: String },

    #[error("text segment exhausted")]
    TextOverflow,

    #[error("data segment exhausted")]
    DataOverflow,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
