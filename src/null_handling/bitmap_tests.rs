//==================================================================================
// Unit Tests for the NullBitmap
//==================================================================================

use crate::null_handling::bitmap::*;

#[test]
fn test_empty_bitmap_has_no_members() {
    let bitmap = NullBitmap::new();
    assert!(!bitmap.any());
    assert_eq!(bitmap.count(), 0);
    assert!(!bitmap.contains(0));
    assert!(!bitmap.contains(1_000_000));
}

#[test]
fn test_add_and_contains() {
    let mut bitmap = NullBitmap::new();
    bitmap.add(3);
    bitmap.add(130);
    bitmap.add(3);

    assert!(bitmap.any());
    assert_eq!(bitmap.count(), 2);
    assert!(bitmap.contains(3));
    assert!(bitmap.contains(130));
    assert!(!bitmap.contains(4));
    assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![3, 130]);
}

#[test]
fn test_add_at_usize_max_is_ignored() {
    let mut bitmap = NullBitmap::new();
    bitmap.add(usize::MAX);
    assert!(!bitmap.any());
    assert!(!bitmap.contains(usize::MAX));
}

#[test]
fn test_equality_ignores_trailing_capacity() {
    let mut a = NullBitmap::from_indices([1, 5]);
    let b = NullBitmap::from_indices([1, 5]);
    a.add(900);
    a.remove(900);
    assert_eq!(a, b);
}

#[test]
fn test_add_range_and_truncate() {
    let mut bitmap = NullBitmap::new();
    bitmap.add_range(2, 6);
    assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![2, 3, 4, 5]);

    bitmap.truncate(4);
    assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![2, 3]);

    // An empty range is a no-op.
    bitmap.add_range(7, 7);
    assert_eq!(bitmap.count(), 2);
}

#[test]
fn test_shrink_follows_selection() {
    let bitmap = NullBitmap::from_indices([0, 2, 4]);
    let shrunk = bitmap.shrink(&[4, 1, 2]);
    // new[0] <- old[4] (null), new[1] <- old[1] (valid), new[2] <- old[2] (null)
    assert_eq!(shrunk.iter().collect::<Vec<_>>(), vec![0, 2]);
}

#[test]
fn test_extend_shifted() {
    let mut bitmap = NullBitmap::from_indices([1]);
    bitmap.extend_shifted(&NullBitmap::from_indices([0, 2]), 10);
    assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![1, 10, 12]);
}
