//! Element types and the precision registry.

use std::fmt;

/// Scalar element type of a tensor.
///
/// `Dynamic` is the undetermined type: input ports have no declared
/// precision, and variables start life with a dynamic type.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementType {
    U1,
    U4,
    U8,
    U16,
    U32,
    U64,
    I4,
    I8,
    I16,
    I32,
    I64,
    F16,
    BF16,
    F32,
    F64,
    Boolean,
    #[default]
    Dynamic,
}

impl ElementType {
    /// Parse a precision string. Accepts both the classic IR spellings
    /// (`FP32`, `I64`, `BOOL`, `BIN`, ...) and the lowercase element-type
    /// ones (`f32`, `i64`, `boolean`, ...), case-insensitively.
    pub fn parse(s: &str) -> Option<ElementType> {
        use ElementType::*;
        let t = match s.trim().to_ascii_lowercase().as_str() {
            "u1" | "bin" => U1,
            "u4" => U4,
            "u8" => U8,
            "u16" => U16,
            "u32" => U32,
            "u64" => U64,
            "i4" => I4,
            "i8" => I8,
            "i16" => I16,
            "i32" => I32,
            "i64" => I64,
            "f16" | "fp16" | "half" => F16,
            "bf16" => BF16,
            "f32" | "fp32" | "float" => F32,
            "f64" | "fp64" | "double" => F64,
            "bool" | "boolean" => Boolean,
            "dynamic" | "undefined" | "unspecified" => Dynamic,
            _ => return None,
        };
        Some(t)
    }

    pub fn bitwidth(&self) -> u32 {
        use ElementType::*;
        match self {
            U1 => 1,
            U4 | I4 => 4,
            U8 | I8 | Boolean => 8,
            U16 | I16 | F16 | BF16 => 16,
            U32 | I32 | F32 => 32,
            U64 | I64 | F64 => 64,
            Dynamic => 0,
        }
    }

    /// Bytes needed to store `volume` elements, rounding sub-byte types up.
    pub fn byte_size_for(&self, volume: u64) -> u64 {
        (volume * self.bitwidth() as u64).div_ceil(8)
    }

    pub fn is_dynamic(&self) -> bool {
        *self == ElementType::Dynamic
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use ElementType::*;
        let s = match self {
            U1 => "u1",
            U4 => "u4",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            U64 => "u64",
            I4 => "i4",
            I8 => "i8",
            I16 => "i16",
            I32 => "i32",
            I64 => "i64",
            F16 => "f16",
            BF16 => "bf16",
            F32 => "f32",
            F64 => "f64",
            Boolean => "boolean",
            Dynamic => "dynamic",
        };
        write!(fmt, "{s}")
    }
}
