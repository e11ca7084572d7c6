use std::{error::Error, fmt};

/// Byte order used by every on-disk and on-wire encoding in the toolchain.
pub type Endian = byteorder::LittleEndian;

/// Error returned when a mnemonic, type name or condition keyword does not
/// name a known variant.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ParseEnumError {
    pub value: String,
    pub enum_name: &'static str,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\" is not a valid {}", &self.value, &self.enum_name)
    }
}

impl Error for ParseEnumError {}

/// Implemented by the small closed enumerations (memory types, opcodes,
/// conditions, ...) that are spelled out as keywords in HOIL source.
pub trait EnumFromStr: Sized {
    fn from_str(s: &str) -> Result<Self, ParseEnumError>;
}
