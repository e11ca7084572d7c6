//! Load-time and runtime VM errors. Static (assembler) errors live in the `hoil`
//! crate instead, next to the code that raises them.

use crate::heap::HeapError;
use crate::record::DecodeError;
use std::fmt;

/// A load-time error: something wrong with the record stream itself, discovered
/// before any instruction executes.
#[derive(Debug)]
pub enum LoadError {
    Decode(DecodeError),
    /// Two `LABEL` records defined the same label id during pass 1.
    DuplicateLabel(u16),
}

impl From<DecodeError> for LoadError {
    fn from(err: DecodeError) -> LoadError {
        LoadError::Decode(err)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Decode(err) => write!(f, "{}", err),
            LoadError::DuplicateLabel(id) => write!(f, "duplicate label id {} in pass 1", id),
        }
    }
}

impl std::error::Error for LoadError {}

/// A runtime error: all are fatal and halt the VM with a nonzero host status.
#[derive(Debug)]
pub enum RuntimeError {
    /// A static-memory access fell outside `[0, STATIC_MEMORY_SIZE)`.
    StaticOutOfBounds { address: u32, len: u32 },
    /// `PUSH` ran past the end of the data stack.
    StackOverflow,
    /// `POP` ran past the start of the data stack.
    StackUnderflow,
    /// `CALL` ran past the end of the call stack.
    CallStackOverflow,
    /// `RET` was executed with an empty call stack.
    CallStackUnderflow,
    /// A heap allocation or free failed; see [`HeapError`] for the reason.
    Heap(HeapError),
    /// `DIV`/`MOD` (or their bitwise analogues) by zero.
    DivisionByZero,
    /// `SYSCALL`'s immediate did not name a supported syscall number.
    UnsupportedSyscall(u16),
    /// A record's opcode field did not match any known [`crate::record::Opcode`].
    UnknownOpcode(u16),
    /// `JMP`/`JCOND`/`CALL` referenced a label id with no recorded definition.
    UndefinedLabel(u16),
    /// A `SYSCALL_ARGS` record (opcode `0xFFFF`) appeared without a preceding
    /// `SYSCALL` to consume it.
    StraySyscallArgs,
}

impl From<HeapError> for RuntimeError {
    fn from(err: HeapError) -> RuntimeError {
        RuntimeError::Heap(err)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuntimeError::StaticOutOfBounds { address, len } => write!(
                f,
                "static memory access out of bounds: address {} length {}",
                address, len
            ),
            RuntimeError::StackOverflow => write!(f, "data stack overflow"),
            RuntimeError::StackUnderflow => write!(f, "data stack underflow"),
            RuntimeError::CallStackOverflow => write!(f, "call stack overflow"),
            RuntimeError::CallStackUnderflow => write!(f, "call stack underflow"),
            RuntimeError::Heap(err) => write!(f, "{}", err),
            RuntimeError::DivisionByZero => write!(f, "division or modulo by zero"),
            RuntimeError::UnsupportedSyscall(num) => write!(f, "unsupported syscall {}", num),
            RuntimeError::UnknownOpcode(op) => write!(f, "unknown opcode 0x{:04X}", op),
            RuntimeError::UndefinedLabel(id) => write!(f, "undefined label id {}", id),
            RuntimeError::StraySyscallArgs => {
                write!(f, "syscall argument record with no preceding SYSCALL")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}
