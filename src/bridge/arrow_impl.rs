// In: src/bridge/arrow_impl.rs

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BinaryArray, PrimitiveArray};
use arrow::buffer::{BooleanBuffer, Buffer, NullBuffer, ScalarBuffer};
use arrow::datatypes::*;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow_schema::{Field, Schema};

use crate::batch::Batch;
use crate::error::RingwireError;
use crate::null_handling::NullBitmap;
use crate::types::{Type, TypeKind};
use crate::vector::Vector;

/// Builds an Arrow array holding a copy of `v`.
///
/// Fixed-width kinds become the matching `PrimitiveArray`; `Date` maps to
/// `Date32` and `Datetime` to microsecond timestamps. `Char` and `Varchar`
/// become `BinaryArray`s because their rows are not guaranteed to be UTF-8.
/// `Tuple` has no Arrow counterpart and is rejected.
pub fn vector_to_arrow(v: &Vector) -> Result<ArrayRef, RingwireError> {
    let len = v.len();
    let nulls = v
        .has_nulls()
        .then(|| NullBuffer::new(BooleanBuffer::from_iter((0..len).map(|i| !v.is_null(i)))));

    macro_rules! to_primitive {
        ($T:ty) => {{
            let values = ScalarBuffer::<<$T as ArrowPrimitiveType>::Native>::new(
                Buffer::from_slice_ref(v.raw_bytes()),
                0,
                len,
            );
            Arc::new(PrimitiveArray::<$T>::try_new(values, nulls)?) as ArrayRef
        }};
    }

    let array = match v.typ().kind {
        TypeKind::Int8 => to_primitive!(Int8Type),
        TypeKind::Int16 => to_primitive!(Int16Type),
        TypeKind::Int32 => to_primitive!(Int32Type),
        TypeKind::Int64 => to_primitive!(Int64Type),
        TypeKind::UInt8 => to_primitive!(UInt8Type),
        TypeKind::UInt16 => to_primitive!(UInt16Type),
        TypeKind::UInt32 => to_primitive!(UInt32Type),
        TypeKind::UInt64 => to_primitive!(UInt64Type),
        TypeKind::Float32 => to_primitive!(Float32Type),
        TypeKind::Float64 => to_primitive!(Float64Type),
        TypeKind::Date => to_primitive!(Date32Type),
        TypeKind::Datetime => to_primitive!(TimestampMicrosecondType),
        TypeKind::Char | TypeKind::Varchar => {
            let rows = (0..len)
                .map(|i| Ok((!v.is_null(i)).then_some(v.bytes_at(i)?)))
                .collect::<Result<Vec<Option<&[u8]>>, RingwireError>>()?;
            Arc::new(BinaryArray::from_opt_vec(rows)) as ArrayRef
        }
        TypeKind::Tuple => {
            return Err(RingwireError::TypeMismatch(
                "Tuple columns have no Arrow representation".into(),
            ))
        }
    };
    Ok(array)
}

/// Wraps an Arrow array as a `Vector`.
///
/// Primitive arrays are referenced, not copied: the vector holds a slice of
/// the array's value buffer and reports `owns_data() == false`. Binary and
/// UTF-8 arrays are copied into a detached byte-string vector.
pub fn vector_from_arrow(array: &dyn Array) -> Result<Vector, RingwireError> {
    let kind = TypeKind::from_arrow_type(array.data_type())?;
    let nulls = NullBitmap::from_indices((0..array.len()).filter(|&i| array.is_null(i)));

    if let Some(width) = kind.fixed_width() {
        let data = array.to_data();
        let buffer = data.buffers().first().ok_or_else(|| {
            RingwireError::ContractViolation(format!("{} array has no value buffer", array.data_type()))
        })?;
        let values = buffer.slice_with_length(data.offset() * width, data.len() * width);
        return Vector::shared(Type::new(kind), values, nulls);
    }

    let rows: Vec<&[u8]> = match array.data_type() {
        DataType::Binary => array
            .as_binary::<i32>()
            .iter()
            .map(|row| row.unwrap_or_default())
            .collect(),
        DataType::Utf8 => array
            .as_string::<i32>()
            .iter()
            .map(|row| row.map(str::as_bytes).unwrap_or_default())
            .collect(),
        dt => {
            return Err(RingwireError::TypeMismatch(format!(
                "Unsupported Arrow type for a byte-string vector: {}",
                dt
            )))
        }
    };
    let mut vector = Vector::from_byte_rows(Type::new(kind), &rows)?;
    *vector.nulls_mut() = nulls;
    Ok(vector)
}

/// Converts a batch into an Arrow `RecordBatch`, one nullable field per
/// attribute. A selection is applied first, so the record batch holds only the
/// selected rows. Weights, reference counts and aliases have no Arrow
/// counterpart and are left behind.
pub fn batch_to_record_batch(bat: &Batch) -> Result<RecordBatch, RingwireError> {
    bat.validate()?;
    let shrunk;
    let bat = if bat.sels.is_some() {
        let mut copy = bat.clone();
        copy.shrink()?;
        shrunk = copy;
        &shrunk
    } else {
        bat
    };

    let mut fields = Vec::with_capacity(bat.attrs.len());
    let mut columns = Vec::with_capacity(bat.vecs.len());
    for (name, v) in bat.attrs.iter().zip(&bat.vecs) {
        fields.push(Field::new(name.as_str(), v.typ().kind.to_arrow_type()?, true));
        columns.push(vector_to_arrow(v)?);
    }
    let options = RecordBatchOptions::new().with_row_count(Some(bat.row_count()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        columns,
        &options,
    )?)
}

/// Wraps every column of an Arrow `RecordBatch` into a batch without weights.
pub fn batch_from_record_batch(rb: &RecordBatch) -> Result<Batch, RingwireError> {
    let mut bat = Batch::default();
    for (field, column) in rb.schema().fields().iter().zip(rb.columns()) {
        bat.push_vector(field.name().as_str(), vector_from_arrow(column.as_ref())?);
    }
    log::debug!(
        "wrapped record batch of {} rows and {} columns",
        rb.num_rows(),
        rb.num_columns()
    );
    Ok(bat)
}
