//! The encoding layer: the 18-byte binary instruction record and the opcode space
//! shared verbatim between the assembler and the VM.
//!
//! The record's fields are laid out as five marker bytes framing four payload
//! fields. [`RECORD_SIZE`] is derived from the field sizes rather than hardcoded,
//! so the assembler and VM can never disagree about it.

use byteorder::{ByteOrder, ReadBytesExt, WriteBytesExt};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive as _;
use std::io::{self, Read, Write};
use util::Endian;

use crate::constants::{MARKER_END, MARKER_IMMEDIATE, MARKER_INSTRUCTION, MARKER_TYPE, MARKER_VARIABLE};

/// Size, in bytes, of one encoded [`Record`] on the wire.
pub const RECORD_SIZE: usize =
    1 /* start marker   */ +
    2 /* opcode          */ +
    1 /* type marker     */ +
    1 /* type            */ +
    1 /* variable marker */ +
    2 /* variable addr   */ +
    1 /* immediate marker*/ +
    8 /* immediate value */ +
    1 /* end marker      */;

/// One instruction's worth of the COIL binary format.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Record {
    pub opcode: u16,
    pub ty: u8,
    pub var: u16,
    pub imm: u64,
}

impl Record {
    pub fn new(opcode: u16, ty: u8, var: u16, imm: u64) -> Record {
        Record { opcode, ty, var, imm }
    }

    /// Writes this record's 18-byte wire encoding.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(MARKER_INSTRUCTION)?;
        w.write_u16::<Endian>(self.opcode)?;
        w.write_u8(MARKER_TYPE)?;
        w.write_u8(self.ty)?;
        w.write_u8(MARKER_VARIABLE)?;
        w.write_u16::<Endian>(self.var)?;
        w.write_u8(MARKER_IMMEDIATE)?;
        w.write_u64::<Endian>(self.imm)?;
        w.write_u8(MARKER_END)?;
        Ok(())
    }

    /// Reads and validates one record's wire encoding, checking every marker byte.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream (zero bytes read before the start
    /// marker); any other short read or a marker mismatch is a [`DecodeError`].
    pub fn decode<R: Read>(r: &mut R) -> Result<Option<Record>, DecodeError> {
        let mut start = [0u8; 1];
        let n = read_fill(r, &mut start)?;
        if n == 0 {
            return Ok(None);
        }
        check_marker(start[0], MARKER_INSTRUCTION)?;

        let opcode = r.read_u16::<Endian>().map_err(DecodeError::Io)?;

        let mut type_marker = [0u8; 1];
        read_exact(r, &mut type_marker)?;
        check_marker(type_marker[0], MARKER_TYPE)?;
        let ty = r.read_u8().map_err(DecodeError::Io)?;

        let mut var_marker = [0u8; 1];
        read_exact(r, &mut var_marker)?;
        check_marker(var_marker[0], MARKER_VARIABLE)?;
        let var = r.read_u16::<Endian>().map_err(DecodeError::Io)?;

        let mut imm_marker = [0u8; 1];
        read_exact(r, &mut imm_marker)?;
        check_marker(imm_marker[0], MARKER_IMMEDIATE)?;
        let imm = r.read_u64::<Endian>().map_err(DecodeError::Io)?;

        let mut end = [0u8; 1];
        read_exact(r, &mut end)?;
        check_marker(end[0], MARKER_END)?;

        Ok(Some(Record::new(opcode, ty, var, imm)))
    }

    /// Decodes every record in `bytes`, materializing them into memory (the VM
    /// prefers the in-memory form over seeking the input file).
    pub fn decode_all(mut bytes: &[u8]) -> Result<Vec<Record>, DecodeError> {
        let mut records = Vec::new();
        while let Some(record) = Record::decode(&mut bytes)? {
            records.push(record);
        }
        Ok(records)
    }

    /// Formats this record the way the textual COIL output mode does: one
    /// `<op> <type> <var> <imm>` line in hex, with no markers. A diagnostic
    /// format, not a re-parseable one.
    pub fn to_hex_line(&self) -> String {
        format!("{:04X} {:02X} {:04X} {:016X}", self.opcode, self.ty, self.var, self.imm)
    }
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), DecodeError> {
    r.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => DecodeError::Truncated,
        _ => DecodeError::Io(err),
    })
}

/// Reads into `buf`, returning the number of bytes actually read before EOF (used
/// only for the very first byte, to distinguish "clean EOF" from "truncated record").
fn read_fill<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize, DecodeError> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(DecodeError::Io(err)),
        }
    }
    Ok(total)
}

fn check_marker(found: u8, expected: u8) -> Result<(), DecodeError> {
    if found == expected {
        Ok(())
    } else {
        Err(DecodeError::MarkerMismatch { expected, found })
    }
}

/// A load-time error: the record stream does not obey the wire contract.
#[derive(Debug)]
pub enum DecodeError {
    MarkerMismatch { expected: u8, found: u8 },
    Truncated,
    Io(io::Error),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DecodeError::MarkerMismatch { expected, found } => write!(
                f,
                "marker mismatch decoding record: expected 0x{:02X}, found 0x{:02X}",
                expected, found
            ),
            DecodeError::Truncated => write!(f, "record truncated before its end marker"),
            DecodeError::Io(err) => write!(f, "I/O error decoding record: {}", err),
        }
    }
}

impl std::error::Error for DecodeError {}

/// The opcode space. Values below `0x0600` are grouped by category the way HOIL
/// groups its mnemonics; `0xFFFE`/`0xFFFF` are the two reserved out-of-band markers
/// used for label definitions and syscall argument records.
#[derive(Clone, Copy, PartialEq, Eq, Debug, ToPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum Opcode {
    AllocImm = 0x0100,
    AllocMem = 0x0101,
    /// Wire-compatible twin of `AllocMem`. The assembler never emits this opcode;
    /// it exists so a hand-written or foreign-produced COIL stream using it still
    /// executes correctly.
    Move = 0x0102,
    Load = 0x0103,
    Store = 0x0104,

    Add = 0x0200,
    Sub = 0x0201,
    Mul = 0x0202,
    Div = 0x0203,
    Mod = 0x0204,
    Neg = 0x0205,

    And = 0x0300,
    Or = 0x0301,
    Xor = 0x0302,
    Not = 0x0303,
    Shl = 0x0304,
    Shr = 0x0305,

    Jmp = 0x0400,
    Jeq = 0x0401,
    Jne = 0x0402,
    Jlt = 0x0403,
    Jle = 0x0404,
    Jgt = 0x0405,
    Jge = 0x0406,
    Call = 0x0407,
    Ret = 0x0408,
    Push = 0x0409,
    Pop = 0x040A,
    Syscall = 0x040B,
    Exit = 0x040C,

    MemAlloc = 0x0600,
    MemFree = 0x0601,
    MemRead = 0x0602,
    MemWrite = 0x0603,

    /// Label definition marker. `var` carries the label id.
    Label = 0xFFFE,
    /// Syscall-argument continuation record. `imm` carries four little-endian
    /// `u16` argument lanes.
    SyscallArgs = 0xFFFF,
}

impl Opcode {
    /// Recovers an [`Opcode`] from its wire-level value via the derived
    /// `FromPrimitive`, the way `vcpu`'s `Core::tick` decodes its opcode field.
    pub fn from_u16(value: u16) -> Option<Opcode> {
        num_traits::FromPrimitive::from_u16(value)
    }

    pub fn value(self) -> u16 {
        self.to_u16().unwrap()
    }
}

/// A condition used by `JCOND`; each maps to its own opcode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Condition {
    pub fn opcode(self) -> Opcode {
        match self {
            Condition::Eq => Opcode::Jeq,
            Condition::Ne => Opcode::Jne,
            Condition::Lt => Opcode::Jlt,
            Condition::Le => Opcode::Jle,
            Condition::Gt => Opcode::Jgt,
            Condition::Ge => Opcode::Jge,
        }
    }

    pub fn from_opcode(opcode: Opcode) -> Option<Condition> {
        Some(match opcode {
            Opcode::Jeq => Condition::Eq,
            Opcode::Jne => Condition::Ne,
            Opcode::Jlt => Condition::Lt,
            Opcode::Jle => Condition::Le,
            Opcode::Jgt => Condition::Gt,
            Opcode::Jge => Condition::Ge,
            _ => return None,
        })
    }

    /// Evaluates the predicate over two signed 64-bit operands.
    pub fn eval(self, a: i64, b: i64) -> bool {
        match self {
            Condition::Eq => a == b,
            Condition::Ne => a != b,
            Condition::Lt => a < b,
            Condition::Le => a <= b,
            Condition::Gt => a > b,
            Condition::Ge => a >= b,
        }
    }
}

/// Packs two addresses into one 64-bit immediate, high/low, as used by the
/// two-source `MATH`/`BIT` operations.
pub fn pack_two(src1: u16, src2: u16) -> u64 {
    ((src1 as u64) << 32) | (src2 as u64)
}

/// Unpacks the two addresses packed by [`pack_two`].
pub fn unpack_two(imm: u64) -> (u16, u16) {
    ((imm >> 32) as u16, (imm & 0xFFFF) as u16)
}

/// Packs `SHL`/`SHR`'s `(src, shift)` pair: source address high, shift count in
/// the low 32 bits.
pub fn pack_shift(src: u16, shift: u32) -> u64 {
    ((src as u64) << 32) | (shift as u64 & 0xFFFF_FFFF)
}

pub fn unpack_shift(imm: u64) -> (u16, u32) {
    ((imm >> 32) as u16, (imm & 0xFFFF_FFFF) as u32)
}

/// Packs `JCOND`'s three fields: `src1` in bits 48-63, `src2` in bits 32-47,
/// `label_id` in bits 0-15. Bits 16-31 are unused padding.
pub fn pack_jcond(src1: u16, src2: u16, label_id: u16) -> u64 {
    ((src1 as u64) << 48) | ((src2 as u64) << 32) | (label_id as u64)
}

pub fn unpack_jcond(imm: u64) -> (u16, u16, u16) {
    (
        (imm >> 48) as u16,
        ((imm >> 32) & 0xFFFF) as u16,
        (imm & 0xFFFF) as u16,
    )
}

/// Packs up to four `u16` syscall arguments into the `SYSCALL_ARGS` immediate as
/// little-endian lanes.
pub fn pack_syscall_args(args: &[u16]) -> u64 {
    let mut imm = 0u64;
    for (i, &arg) in args.iter().take(4).enumerate() {
        imm |= (arg as u64) << (16 * i);
    }
    imm
}

/// Unpacks the four `u16` lanes of a `SYSCALL_ARGS` immediate.
pub fn unpack_syscall_args(imm: u64) -> [u16; 4] {
    let mut lanes = [0u16; 4];
    for (i, lane) in lanes.iter_mut().enumerate() {
        *lane = ((imm >> (16 * i)) & 0xFFFF) as u16;
    }
    lanes
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_size_is_eighteen_bytes() {
        assert_eq!(RECORD_SIZE, 18);
    }

    #[test]
    fn round_trips_through_bytes() {
        let record = Record::new(Opcode::Add.value(), 7, 0x1234, 0xDEAD_BEEF_0000_0001);
        let mut buf = Vec::new();
        record.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), RECORD_SIZE);

        let decoded = Record::decode(&mut &buf[..]).unwrap().unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn two_instructions_are_two_records() {
        let a = Record::new(Opcode::Add.value(), 7, 0, 0);
        let b = Record::new(Opcode::Sub.value(), 7, 0, 0);
        let mut buf = Vec::new();
        a.encode(&mut buf).unwrap();
        b.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 2 * RECORD_SIZE);
    }

    #[test]
    fn marker_mismatch_is_fatal() {
        let mut buf = Vec::new();
        Record::new(Opcode::Add.value(), 7, 0, 0).encode(&mut buf).unwrap();
        buf[0] = 0x00;
        match Record::decode(&mut &buf[..]) {
            Err(DecodeError::MarkerMismatch { .. }) => {}
            other => panic!("expected marker mismatch, got {:?}", other),
        }
    }

    #[test]
    fn truncated_record_is_an_error() {
        let mut buf = Vec::new();
        Record::new(Opcode::Add.value(), 7, 0, 0).encode(&mut buf).unwrap();
        buf.truncate(5);
        match Record::decode(&mut &buf[..]) {
            Err(DecodeError::Truncated) => {}
            other => panic!("expected truncated record, got {:?}", other),
        }
    }

    #[test]
    fn pack_two_round_trips() {
        assert_eq!(unpack_two(pack_two(0x1234, 0x5678)), (0x1234, 0x5678));
    }

    #[test]
    fn pack_jcond_round_trips() {
        assert_eq!(
            unpack_jcond(pack_jcond(0x0001, 0x0002, 0x0003)),
            (0x0001, 0x0002, 0x0003)
        );
    }

    #[test]
    fn syscall_args_round_trip() {
        let args = [1u16, 2, 3, 4];
        assert_eq!(unpack_syscall_args(pack_syscall_args(&args)), args);
    }
}
