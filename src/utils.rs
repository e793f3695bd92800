//! This module provides a set of shared, low-level utility functions used
//! throughout the ringwire core.
//!
//! Its primary responsibility is providing safe, validated conversions between
//! raw byte slices and typed slices. All reinterpretation goes through `bytemuck`
//! so there is no `unsafe` in the crate.

use crate::error::RingwireError;

//==================================================================================
// 1. Core Utility Functions
//==================================================================================

/// Safely reinterprets a byte slice as a slice of a plain-old-data type.
///
/// This is the gateway for turning raw column or ring bytes into a workable,
/// typed slice. It is zero-copy.
///
/// # Errors
/// Returns `RingwireError::PodCast` if the length is not a multiple of the
/// element size or the slice is misaligned for `T`.
pub fn safe_bytes_to_typed_slice<T>(bytes: &[u8]) -> Result<&[T], RingwireError>
where
    T: bytemuck::Pod,
{
    bytemuck::try_cast_slice(bytes)
        .map_err(|e| RingwireError::PodCast(format!("Failed to cast byte slice: {}", e)))
}

/// Converts a typed slice into an owned `Vec<u8>` in native (little-endian) order.
pub fn typed_slice_to_bytes<T: bytemuck::Pod>(data: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(data).to_vec()
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_bytes_to_typed_slice_success() {
        let original_vec: Vec<i32> = vec![1, -2, 1_000_000];
        let bytes = typed_slice_to_bytes(&original_vec);

        let typed_slice = safe_bytes_to_typed_slice::<u8>(&bytes).unwrap();
        assert_eq!(typed_slice.len(), 12);
    }

    #[test]
    fn test_safe_bytes_to_typed_slice_length_mismatch_error() {
        // 5 bytes can never be a whole number of i32 values.
        let words = [0u64; 1];
        let bytes = &bytemuck::cast_slice::<u64, u8>(&words)[..5];

        let result_i32 = safe_bytes_to_typed_slice::<i32>(bytes);
        assert!(matches!(result_i32, Err(RingwireError::PodCast(_))));
    }

    #[test]
    fn test_typed_slice_to_bytes_endianness() {
        // Value is 258 = 0x0102 in hex
        let original_vec: Vec<u16> = vec![258];
        let bytes = typed_slice_to_bytes(&original_vec);

        if cfg!(target_endian = "little") {
            assert_eq!(bytes, vec![0x02, 0x01]);
        } else {
            assert_eq!(bytes, vec![0x01, 0x02]);
        }
    }
}
