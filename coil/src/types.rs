//! The closed set of primitive memory types.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive as _;
use util::{EnumFromStr, ParseEnumError};

/// A primitive memory type, or [`MemoryType::None`] for control-flow operands that
/// carry no type at all. Variant order is significant: it is the wire-level type
/// code recovered by [`MemoryType::from_code`], the way `vcpu`'s enums lean on
/// `num-derive`'s default (declaration-order) discriminants rather than spelling
/// each one out.
#[derive(Clone, Copy, PartialEq, Eq, Debug, ToPrimitive, FromPrimitive)]
pub enum MemoryType {
    None,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Bool,
    Ptr,
}

impl MemoryType {
    /// Byte size of a single value of this type. `None` has no meaningful size and
    /// must never reach a memory access; callers that dispatch on type always guard
    /// against it first.
    pub fn byte_size(self) -> usize {
        match self {
            MemoryType::None => 0,
            MemoryType::Int8 | MemoryType::UInt8 | MemoryType::Bool => 1,
            MemoryType::Int16 | MemoryType::UInt16 => 2,
            MemoryType::Int32 | MemoryType::UInt32 | MemoryType::Float32 => 4,
            MemoryType::Int64
            | MemoryType::UInt64
            | MemoryType::Float64
            | MemoryType::Ptr => 8,
        }
    }

    /// The wire-level type code stored in a record's `type` byte.
    pub fn code(self) -> u8 {
        self.to_u8().unwrap()
    }

    /// Recovers a [`MemoryType`] from its wire-level type code.
    pub fn from_code(code: u8) -> Option<MemoryType> {
        num_traits::FromPrimitive::from_u8(code)
    }
}

impl EnumFromStr for MemoryType {
    /// Parses a HOIL type keyword. `dint` ("default int") is accepted as an alias
    /// for `int64`; it appears in the grammar without its own semantics spelled out
    /// elsewhere.
    fn from_str(s: &str) -> Result<MemoryType, ParseEnumError> {
        Ok(match s {
            "dint" => MemoryType::Int64,
            "int8" => MemoryType::Int8,
            "uint8" => MemoryType::UInt8,
            "int16" => MemoryType::Int16,
            "uint16" => MemoryType::UInt16,
            "int32" => MemoryType::Int32,
            "uint32" => MemoryType::UInt32,
            "int64" => MemoryType::Int64,
            "uint64" => MemoryType::UInt64,
            "float32" => MemoryType::Float32,
            "float64" => MemoryType::Float64,
            "bool" => MemoryType::Bool,
            "ptr" => MemoryType::Ptr,
            _ => {
                return Err(ParseEnumError {
                    value: s.to_owned(),
                    enum_name: "MemoryType",
                })
            }
        })
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_every_code() {
        for code in 0..=12u8 {
            let ty = MemoryType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
        assert!(MemoryType::from_code(13).is_none());
    }

    #[test]
    fn dint_aliases_int64() {
        assert_eq!(MemoryType::from_str("dint").unwrap(), MemoryType::Int64);
        assert_eq!(
            MemoryType::from_str("dint").unwrap(),
            MemoryType::from_str("int64").unwrap()
        );
    }

    #[test]
    fn sizes_match_known_widths() {
        assert_eq!(MemoryType::Int8.byte_size(), 1);
        assert_eq!(MemoryType::UInt8.byte_size(), 1);
        assert_eq!(MemoryType::Bool.byte_size(), 1);
        assert_eq!(MemoryType::Int16.byte_size(), 2);
        assert_eq!(MemoryType::Int32.byte_size(), 4);
        assert_eq!(MemoryType::Float32.byte_size(), 4);
        assert_eq!(MemoryType::Int64.byte_size(), 8);
        assert_eq!(MemoryType::Float64.byte_size(), 8);
        assert_eq!(MemoryType::Ptr.byte_size(), 8);
    }
}
