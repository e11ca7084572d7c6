//! COIL: the binary instruction format, heap allocator and virtual machine that
//! execute what the `hoil` assembler produces.

pub mod constants;
pub mod error;
pub mod heap;
pub mod record;
pub mod types;
pub mod vm;
