//! # Number Types
//!
//! Primitive number descriptors used to parameterize cursor reads/writes,
//! and the dynamically typed value they produce.

use serde::Serialize;

use crate::error::{LapRfError, Result};

/// Largest integer an f64 holds exactly (2^53 - 1)
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Primitive wire number type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberType {
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl NumberType {
    /// Encoded width in bytes
    pub const fn byte_width(self) -> usize {
        match self {
            NumberType::U8 => 1,
            NumberType::U16 => 2,
            NumberType::U32 | NumberType::F32 => 4,
            NumberType::U64 | NumberType::F64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, NumberType::F32 | NumberType::F64)
    }

    /// Only the IEEE 754 types carry a sign; the integer types are unsigned on the wire
    pub const fn is_signed(self) -> bool {
        self.is_float()
    }
}

/// Whether a declared field size is one of the widths a number type can have
pub const fn is_legal_width(size: u8) -> bool {
    matches!(size, 1 | 2 | 4 | 8)
}

/// A decoded or to-be-encoded field value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Number {
    pub const fn number_type(&self) -> NumberType {
        match self {
            Number::U8(_) => NumberType::U8,
            Number::U16(_) => NumberType::U16,
            Number::U32(_) => NumberType::U32,
            Number::U64(_) => NumberType::U64,
            Number::F32(_) => NumberType::F32,
            Number::F64(_) => NumberType::F64,
        }
    }

    /// Integer value, `None` for floats
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Number::U8(v) => Some(v.into()),
            Number::U16(v) => Some(v.into()),
            Number::U32(v) => Some(v.into()),
            Number::U64(v) => Some(v),
            Number::F32(_) | Number::F64(_) => None,
        }
    }

    /// Convert to f64, failing instead of rounding a 64-bit integer
    ///
    /// # Errors
    ///
    /// Returns `PrecisionLoss` when a `U64` exceeds [`MAX_SAFE_INTEGER`]
    pub fn to_f64_exact(&self) -> Result<f64> {
        match *self {
            Number::U8(v) => Ok(v.into()),
            Number::U16(v) => Ok(v.into()),
            Number::U32(v) => Ok(v.into()),
            Number::U64(v) if v > MAX_SAFE_INTEGER => Err(LapRfError::PrecisionLoss { value: v }),
            Number::U64(v) => Ok(v as f64),
            Number::F32(v) => Ok(v.into()),
            Number::F64(v) => Ok(v),
        }
    }

    /// True for 64-bit integers that would round when handed to an f64 consumer
    pub fn exceeds_safe_integer(&self) -> bool {
        matches!(*self, Number::U64(v) if v > MAX_SAFE_INTEGER)
    }
}

/// Exact extraction of a primitive from a [`Number`] of the same type
pub trait FromNumber: Sized {
    fn from_number(number: Number) -> Option<Self>;
}

macro_rules! impl_number_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Number {
                fn from(value: $ty) -> Self {
                    Number::$variant(value)
                }
            }

            impl FromNumber for $ty {
                fn from_number(number: Number) -> Option<Self> {
                    match number {
                        Number::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_number_conversions! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}
