//! Runtime tags for the closed set of element kinds.
//!
//! A table stores homogeneous elements of exactly one [`DataType`]. Accessors
//! request a (possibly different) element type at compile time; the pair
//! `(stored, requested)` selects one [`Conversion`] rule from the table below.
//!
//! ```text
//!   from \ to | f32        | f64        | i32        | i64
//! ------------|------------|------------|------------|------------
//!   f32       | Identity   | Widen      | FloatToInt | FloatToInt
//!   f64       | Narrow     | Identity   | FloatToInt | FloatToInt
//!   i32       | IntToFloat | Widen      | Identity   | Widen
//!   i64       | IntToFloat | IntToFloat | Narrow     | Identity
//! ```

use std::fmt;

/// Element kind stored in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit IEEE float.
    Float32,
    /// 64-bit IEEE float.
    Float64,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
}

impl DataType {
    /// All supported kinds, in id order.
    pub const ALL: [DataType; 4] = [
        DataType::Float32,
        DataType::Float64,
        DataType::Int32,
        DataType::Int64,
    ];

    /// Size of one element in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::Float32 | DataType::Int32 => 4,
            DataType::Float64 | DataType::Int64 => 8,
        }
    }

    #[inline]
    pub const fn is_floating_point(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Short lowercase name (`"f32"`, `"i64"`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            DataType::Float32 => "f32",
            DataType::Float64 => "f64",
            DataType::Int32 => "i32",
            DataType::Int64 => "i64",
        }
    }

    /// Stable numeric tag, for callers that exchange kinds across a language
    /// boundary.
    pub const fn id(self) -> u32 {
        match self {
            DataType::Float32 => 0,
            DataType::Float64 => 1,
            DataType::Int32 => 2,
            DataType::Int64 => 3,
        }
    }

    /// Inverse of [`DataType::id`]. Returns `None` for unknown tags.
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|dt| dt.id() == id)
    }

    /// The conversion rule applied when reading `self` elements as `target`.
    pub const fn conversion_to(self, target: DataType) -> Conversion {
        use DataType::*;
        match (self, target) {
            (Float32, Float32) | (Float64, Float64) | (Int32, Int32) | (Int64, Int64) => {
                Conversion::Identity
            }
            (Float32, Float64) | (Int32, Int64) | (Int32, Float64) => Conversion::Widen,
            (Float64, Float32) | (Int64, Int32) => Conversion::Narrow,
            (Float32, Int32) | (Float32, Int64) | (Float64, Int32) | (Float64, Int64) => {
                Conversion::FloatToInt
            }
            (Int32, Float32) | (Int64, Float32) | (Int64, Float64) => Conversion::IntToFloat,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an element changes when read as another kind.
///
/// All rules follow Rust's `as` numeric casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// Same kind, bit-for-bit.
    Identity,
    /// Every source value is exactly representable in the target.
    Widen,
    /// Same family, smaller target: floats round to nearest, integers
    /// saturate at the target bounds.
    Narrow,
    /// Truncate toward zero, saturate at the target bounds, NaN becomes 0.
    FloatToInt,
    /// Round to the nearest representable float.
    IntToFloat,
}

impl Conversion {
    /// Whether every value survives the conversion unchanged.
    #[inline]
    pub const fn is_exact(self) -> bool {
        matches!(self, Conversion::Identity | Conversion::Widen)
    }
}
