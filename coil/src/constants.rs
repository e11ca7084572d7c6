//! Fixed capacities and wire-format sentinel bytes shared by the assembler and the VM.
//!
//! These are compile-time constants by design: exhausting any of them is a fatal
//! error rather than a silent reallocation.

/// Static memory region size, in bytes. Variable addresses are `u16` offsets into this.
pub const STATIC_MEMORY_SIZE: usize = 4096;

/// Heap region size, in bytes, managed by the first-fit allocator in [`crate::heap`].
pub const HEAP_SIZE: usize = 65536;

/// Data stack size, in bytes, used by `PUSH`/`POP`.
pub const STACK_SIZE: usize = 4096;

/// Call stack depth, in entries, used by `CALL`/`RET`.
pub const CALL_STACK_SIZE: usize = 256;

/// Maximum number of symbols the assembler's symbol table can hold.
pub const MAX_SYMBOLS: usize = 512;

/// Maximum number of labels the assembler's (and VM's) label table can hold.
pub const MAX_LABELS: usize = 256;

/// Maximum visible characters in a symbol or label name.
pub const MAX_NAME_LEN: usize = 63;

/// Maximum tokens a single HOIL line can be split into.
pub const MAX_TOKENS: usize = 16;

/// Maximum characters read for a single HOIL source line.
pub const MAX_LINE_LEN: usize = 256;

/// Marks the first byte of every encoded record.
pub const MARKER_INSTRUCTION: u8 = 0xC0;
/// Precedes the `type` field.
pub const MARKER_TYPE: u8 = 0xC1;
/// Precedes the `variable-address` field.
pub const MARKER_VARIABLE: u8 = 0xC2;
/// Precedes the `immediate-value` field.
pub const MARKER_IMMEDIATE: u8 = 0xC3;
/// Marks the last byte of every encoded record.
pub const MARKER_END: u8 = 0xCF;
