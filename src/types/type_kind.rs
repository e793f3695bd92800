//! This module defines the canonical, type-safe representation of column and
//! accumulator types used throughout ringwire.

use crate::error::RingwireError;
use arrow::datatypes::{DataType as ArrowDataType, TimeUnit};
use bytemuck::{Pod, Zeroable};
use num_traits::Bounded;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The scalar kinds a vector or ring can carry.
///
/// The discriminant of each variant is its wire tag and is part of the
/// cross-node compatibility surface: never renumber an existing kind.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TypeKind {
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Int64 = 4,
    UInt8 = 5,
    UInt16 = 6,
    UInt32 = 7,
    UInt64 = 8,
    Float32 = 9,
    Float64 = 10,
    Date = 11,
    Datetime = 12,
    Char = 13,
    Varchar = 14,
    Tuple = 15,
}

impl TypeKind {
    pub const ALL: [TypeKind; 15] = [
        TypeKind::Int8,
        TypeKind::Int16,
        TypeKind::Int32,
        TypeKind::Int64,
        TypeKind::UInt8,
        TypeKind::UInt16,
        TypeKind::UInt32,
        TypeKind::UInt64,
        TypeKind::Float32,
        TypeKind::Float64,
        TypeKind::Date,
        TypeKind::Datetime,
        TypeKind::Char,
        TypeKind::Varchar,
        TypeKind::Tuple,
    ];

    /// The wire tag for this kind.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Resolves a wire tag back into a kind.
    pub fn from_tag(tag: u8) -> Result<Self, RingwireError> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.tag() == tag)
            .ok_or(RingwireError::UnknownTag {
                what: "type kind",
                tag: tag as u16,
            })
    }

    /// Byte width of one value for fixed-width kinds, `None` for byte-string kinds.
    pub fn fixed_width(self) -> Option<usize> {
        use TypeKind::*;
        match self {
            Int8 | UInt8 => Some(1),
            Int16 | UInt16 => Some(2),
            Int32 | UInt32 | Float32 | Date => Some(4),
            Int64 | UInt64 | Float64 | Datetime => Some(8),
            Char | Varchar | Tuple => None,
        }
    }

    /// `true` for kinds stored as a data area plus offset/length tables.
    pub fn is_bytes(self) -> bool {
        self.fixed_width().is_none()
    }

    pub fn is_signed_int(self) -> bool {
        matches!(
            self,
            TypeKind::Int8 | TypeKind::Int16 | TypeKind::Int32 | TypeKind::Int64
        )
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(
            self,
            TypeKind::UInt8 | TypeKind::UInt16 | TypeKind::UInt32 | TypeKind::UInt64
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeKind::Float32 | TypeKind::Float64)
    }

    /// Kinds that AVG / VARIANCE / SUM can read as numbers.
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Converts an Arrow `DataType` into a `TypeKind`.
    pub fn from_arrow_type(arrow_type: &ArrowDataType) -> Result<Self, RingwireError> {
        match arrow_type {
            ArrowDataType::Int8 => Ok(Self::Int8),
            ArrowDataType::Int16 => Ok(Self::Int16),
            ArrowDataType::Int32 => Ok(Self::Int32),
            ArrowDataType::Int64 => Ok(Self::Int64),
            ArrowDataType::UInt8 => Ok(Self::UInt8),
            ArrowDataType::UInt16 => Ok(Self::UInt16),
            ArrowDataType::UInt32 => Ok(Self::UInt32),
            ArrowDataType::UInt64 => Ok(Self::UInt64),
            ArrowDataType::Float32 => Ok(Self::Float32),
            ArrowDataType::Float64 => Ok(Self::Float64),
            ArrowDataType::Date32 => Ok(Self::Date),
            ArrowDataType::Timestamp(TimeUnit::Microsecond, None) => Ok(Self::Datetime),
            ArrowDataType::Binary | ArrowDataType::Utf8 => Ok(Self::Varchar),
            dt => Err(RingwireError::TypeMismatch(format!(
                "Cannot convert Arrow type {:?} to a ringwire TypeKind",
                dt
            ))),
        }
    }

    /// Converts a `TypeKind` back into an Arrow `DataType`.
    pub fn to_arrow_type(&self) -> Result<ArrowDataType, RingwireError> {
        match self {
            Self::Int8 => Ok(ArrowDataType::Int8),
            Self::Int16 => Ok(ArrowDataType::Int16),
            Self::Int32 => Ok(ArrowDataType::Int32),
            Self::Int64 => Ok(ArrowDataType::Int64),
            Self::UInt8 => Ok(ArrowDataType::UInt8),
            Self::UInt16 => Ok(ArrowDataType::UInt16),
            Self::UInt32 => Ok(ArrowDataType::UInt32),
            Self::UInt64 => Ok(ArrowDataType::UInt64),
            Self::Float32 => Ok(ArrowDataType::Float32),
            Self::Float64 => Ok(ArrowDataType::Float64),
            Self::Date => Ok(ArrowDataType::Date32),
            Self::Datetime => Ok(ArrowDataType::Timestamp(TimeUnit::Microsecond, None)),
            Self::Char | Self::Varchar => Ok(ArrowDataType::Binary),
            Self::Tuple => Err(RingwireError::TypeMismatch(
                "Tuple columns have no Arrow representation".into(),
            )),
        }
    }
}

/// Provides the canonical string representation for a `TypeKind`.
impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The type descriptor attached to a vector, ring or attribute.
/// Immutable once attached.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    pub kind: TypeKind,
    /// Byte width of one stored value (24 for byte-string kinds).
    pub size: i32,
    pub width: i32,
    pub precision: i32,
}

impl Type {
    /// Byte width used for byte-string kinds, matching their slot header size.
    pub const BYTES_SLOT_SIZE: i32 = 24;

    pub fn new(kind: TypeKind) -> Self {
        let size = kind
            .fixed_width()
            .map_or(Self::BYTES_SLOT_SIZE, |w| w as i32);
        Self {
            kind,
            size,
            width: 0,
            precision: 0,
        }
    }

    pub fn with_size(kind: TypeKind, size: i32) -> Self {
        Self {
            size,
            ..Self::new(kind)
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.size)
    }
}

//==================================================================================
// Temporal newtypes
//==================================================================================

/// A calendar date stored as a day number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Date(pub i32);

/// A timestamp stored as a 64-bit tick count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Datetime(pub i64);

impl Bounded for Date {
    fn min_value() -> Self {
        Date(i32::MIN)
    }
    fn max_value() -> Self {
        Date(i32::MAX)
    }
}

impl Bounded for Datetime {
    fn min_value() -> Self {
        Datetime(i64::MIN)
    }
    fn max_value() -> Self {
        Datetime(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip_for_every_kind() {
        for kind in TypeKind::ALL {
            assert_eq!(TypeKind::from_tag(kind.tag()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        assert!(matches!(
            TypeKind::from_tag(0),
            Err(RingwireError::UnknownTag { tag: 0, .. })
        ));
        assert!(TypeKind::from_tag(200).is_err());
    }

    #[test]
    fn test_default_sizes() {
        assert_eq!(Type::new(TypeKind::Int16).size, 2);
        assert_eq!(Type::new(TypeKind::Datetime).size, 8);
        assert_eq!(Type::new(TypeKind::Varchar).size, 24);
        assert!(TypeKind::Tuple.is_bytes());
    }

    #[test]
    fn test_arrow_mapping() {
        for kind in [TypeKind::Int32, TypeKind::UInt64, TypeKind::Date, TypeKind::Float32] {
            let arrow = kind.to_arrow_type().unwrap();
            assert_eq!(TypeKind::from_arrow_type(&arrow).unwrap(), kind);
        }
        assert!(TypeKind::Tuple.to_arrow_type().is_err());
        assert!(TypeKind::from_arrow_type(&ArrowDataType::Boolean).is_err());
    }
}
