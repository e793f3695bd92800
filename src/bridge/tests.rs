use super::*;
use crate::arena::Arena;
use crate::batch::Batch;
use crate::ring::{AggFunc, Ring};
use crate::types::{Date, Type, TypeKind};
use crate::vector::Vector;
use arrow::array::{Array, BinaryArray, Date32Array, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow_schema::{Field, Schema};
use std::sync::Arc;

#[test]
fn test_int32_with_nulls_to_arrow() {
    let mut v = Vector::from_slice(&[1i32, 2, 3, 4]);
    v.set_null(2);

    let array = vector_to_arrow(&v).unwrap();
    let ints = array.as_any().downcast_ref::<Int32Array>().unwrap();
    assert_eq!(ints.len(), 4);
    assert_eq!(ints.null_count(), 1);
    assert!(ints.is_null(2));
    assert_eq!(ints.value(0), 1);
    assert_eq!(ints.value(3), 4);
}

#[test]
fn test_date_maps_to_date32() {
    let v = Vector::from_slice(&[Date(19000), Date(19001)]);
    let array = vector_to_arrow(&v).unwrap();
    assert_eq!(array.data_type(), &DataType::Date32);
    let dates = array.as_any().downcast_ref::<Date32Array>().unwrap();
    assert_eq!(&dates.values()[..], &[19000, 19001]);
}

#[test]
fn test_varchar_to_binary_array() {
    let mut v = Vector::from_byte_rows(Type::new(TypeKind::Varchar), &["ab", "", "xyz"]).unwrap();
    v.set_null(1);

    let array = vector_to_arrow(&v).unwrap();
    let bins = array.as_any().downcast_ref::<BinaryArray>().unwrap();
    assert_eq!(bins.value(0), b"ab");
    assert!(bins.is_null(1));
    assert_eq!(bins.value(2), b"xyz");
}

#[test]
fn test_tuple_has_no_arrow_type() {
    let v = Vector::from_byte_rows(Type::new(TypeKind::Tuple), &[[1u8, 2]]).unwrap();
    assert!(vector_to_arrow(&v).is_err());
}

#[test]
fn test_primitive_array_is_wrapped_without_copy() {
    let array = Int64Array::from(vec![Some(10), None, Some(30), Some(40)]);
    let sliced = array.slice(1, 3);

    let v = vector_from_arrow(&sliced).unwrap();
    assert!(v.is_shared());
    assert!(!v.owns_data());
    assert_eq!(v.len(), 3);
    assert!(v.is_null(0));
    assert_eq!(&v.col::<i64>().unwrap()[1..], &[30, 40]);
    assert_eq!(v.raw_bytes().as_ptr(), sliced.values().inner().as_ptr());
}

#[test]
fn test_utf8_array_becomes_varchar() {
    let array = StringArray::from(vec![Some("hello"), None, Some("ring")]);
    let v = vector_from_arrow(&array).unwrap();
    assert_eq!(v.typ().kind, TypeKind::Varchar);
    assert_eq!(v.bytes_at(0).unwrap(), b"hello");
    assert!(v.is_null(1));
    assert_eq!(v.bytes_at(2).unwrap(), b"ring");
}

#[test]
fn test_unsupported_arrow_type_is_rejected() {
    let array = arrow::array::BooleanArray::from(vec![true, false]);
    assert!(matches!(
        vector_from_arrow(&array),
        Err(crate::error::RingwireError::TypeMismatch(_))
    ));
}

#[test]
fn test_batch_selection_applies_before_export() {
    let mut bat = Batch::default();
    bat.push_vector("k", Vector::from_slice(&[1i32, 2, 3, 4]));
    bat.push_vector("v", Vector::from_slice(&[1.5f64, 2.5, 3.5, 4.5]));
    bat.set_selection(vec![3, 1]);

    let rb = batch_to_record_batch(&bat).unwrap();
    assert_eq!(rb.num_rows(), 2);
    assert_eq!(rb.schema().field(0).name(), "k");
    assert!(rb.schema().field(1).is_nullable());
    let keys = rb.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
    assert_eq!(&keys.values()[..], &[4, 2]);
    let vals = rb.column(1).as_any().downcast_ref::<Float64Array>().unwrap();
    assert_eq!(&vals.values()[..], &[4.5, 2.5]);
    // The source batch keeps its selection.
    assert_eq!(bat.row_count(), 2);
    assert_eq!(bat.domain_len(), 4);
}

#[test]
fn test_inconsistent_batch_is_not_exported() {
    let mut bat = Batch::default();
    bat.push_vector("a", Vector::from_slice(&[1i32, 2]));
    bat.push_vector("b", Vector::from_slice(&[1i32]));
    assert!(batch_to_record_batch(&bat).is_err());
}

#[test]
fn test_record_batch_round_trip() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("name", DataType::Utf8, true),
    ]));
    let rb = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int32Array::from(vec![7, 8])),
            Arc::new(StringArray::from(vec![Some("x"), None])),
        ],
    )
    .unwrap();

    let bat = batch_from_record_batch(&rb).unwrap();
    assert_eq!(bat.attrs, vec!["id".to_string(), "name".to_string()]);
    assert_eq!(bat.vector_by_name("id").unwrap().col::<i32>().unwrap(), &[7, 8]);
    assert!(bat.vector_by_name("name").unwrap().is_null(1));

    let back = batch_to_record_batch(&bat).unwrap();
    assert_eq!(back.num_rows(), 2);
    assert_eq!(back.schema().field(1).data_type(), &DataType::Binary);
}

#[test]
fn test_ring_output_exports_nulls() {
    let v = Vector::from_slice(&[3i64, 9, 4]);
    let mut ring = Ring::new(AggFunc::Sum, Type::new(TypeKind::Int64)).unwrap();
    ring.grows(&Arena::unbounded(), 2).unwrap();
    ring.bulk_fill(0, &[1, 1, 1], &v).unwrap();

    let out = ring.eval(&[3, 0]).unwrap();
    let array = vector_to_arrow(&out).unwrap();
    let sums = array.as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(sums.value(0), 16);
    assert!(sums.is_null(1));
}
