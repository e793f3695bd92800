//! This module defines shared traits used across vectors, rings and the codec.

use bytemuck::Pod;
use num_traits::Bounded;
use std::fmt::Debug;

use crate::types::{Date, Datetime, TypeKind};

/// A fixed-width value that can live in a reinterpreted column or ring buffer.
///
/// `KIND` ties the Rust type to the `TypeKind` that a vector must carry for a
/// typed view of that vector to be valid.
pub trait Scalar: Pod + Bounded + PartialOrd + Debug + Send + Sync + 'static {
    const KIND: TypeKind;
}

// Implement the trait for every fixed-width kind.
macro_rules! impl_scalar {
    ($($T:ty => $kind:ident),+ $(,)?) => {
        $(
            impl Scalar for $T {
                const KIND: TypeKind = TypeKind::$kind;
            }
        )+
    };
}

impl_scalar!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    Date => Date,
    Datetime => Datetime,
);
