//! Null tracking for vectors and ring outputs.
//!
//! Nulls are stored out of band as a set of row (or group) indices rather than
//! interleaved with the values, so a column's value buffer is always a dense,
//! reinterpretable slice regardless of how many of its rows are null.

pub mod bitmap;

pub use bitmap::NullBitmap;

#[cfg(test)]
mod bitmap_tests;
