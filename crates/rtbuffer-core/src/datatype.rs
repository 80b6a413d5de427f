//! Element datatypes.
//!
//! The numeric tags are the wire values and must never be renumbered.

use std::fmt;
use std::str::FromStr;

use bytes::BufMut;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Element type of samples and typed event fields.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Char = 0,
    Uint8 = 1,
    Uint16 = 2,
    Uint32 = 3,
    Uint64 = 4,
    Int8 = 5,
    Int16 = 6,
    Int32 = 7,
    Int64 = 8,
    Float32 = 9,
    Float64 = 10,
}

impl DataType {
    /// Every datatype, in tag order.
    pub const ALL: [DataType; 11] = [
        DataType::Char,
        DataType::Uint8,
        DataType::Uint16,
        DataType::Uint32,
        DataType::Uint64,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Float32,
        DataType::Float64,
    ];

    /// Look up a wire tag.
    pub fn from_tag(tag: u32) -> Result<Self> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(StoreError::UnknownDataType(tag))
    }

    /// True if `tag` names a known datatype.
    pub fn is_valid(tag: u32) -> bool {
        (tag as usize) < Self::ALL.len()
    }

    /// The wire tag.
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Bytes per element.
    pub fn width(self) -> usize {
        match self {
            DataType::Char | DataType::Uint8 | DataType::Int8 => 1,
            DataType::Uint16 | DataType::Int16 => 2,
            DataType::Uint32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::Uint64 | DataType::Int64 | DataType::Float64 => 8,
        }
    }

    /// Lowercase name (`"float32"`).
    pub fn name(self) -> &'static str {
        match self {
            DataType::Char => "char",
            DataType::Uint8 => "uint8",
            DataType::Uint16 => "uint16",
            DataType::Uint32 => "uint32",
            DataType::Uint64 => "uint64",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }
}

/// Byte width of a wire tag.
pub fn width_of(tag: u32) -> Result<usize> {
    DataType::from_tag(tag).map(DataType::width)
}

impl TryFrom<u32> for DataType {
    type Error = StoreError;

    fn try_from(tag: u32) -> Result<Self> {
        Self::from_tag(tag)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|dt| dt.name() == wanted)
            .ok_or_else(|| format!("unknown datatype '{s}'"))
    }
}

/// A Rust scalar that maps onto one [`DataType`].
///
/// Used to build and interpret type-erased sample bytes without the caller
/// doing the little-endian conversions by hand.
pub trait Element: Copy {
    const DATATYPE: DataType;

    fn put_le(self, dst: &mut impl BufMut);

    /// Decode from exactly `DATATYPE.width()` bytes.
    fn from_le_slice(src: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DATATYPE: DataType = DataType::$dt;

                fn put_le(self, dst: &mut impl BufMut) {
                    dst.put_slice(&self.to_le_bytes());
                }

                fn from_le_slice(src: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(src);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_element!(
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);
