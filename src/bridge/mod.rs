// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Arrow Bridge
// ====================================================================================
//
// The `bridge` is the boundary between ringwire's own column model and Apache
// Arrow. Scan operators hand over Arrow arrays; result sinks expect Arrow
// record batches. Everything between the two speaks `Vector` and `Batch`.
//
// Data Flow (Ingest):
//
//   1. [Arrow RecordBatch / &dyn Array]
//         |
//         `-> `vector_from_arrow` wraps primitive value buffers without copying
//             (the vector is `shared`) and copies binary / UTF-8 rows.
//
//   2. [Batch] -> fed to rings via `fill` / `batch_fill` / `bulk_fill`
//
// Data Flow (Emit):
//
//   1. [Ring::eval] -> `Vector`
//         |
//         `-> `vector_to_arrow` copies it into an Arrow array.
//
//   2. [Batch] -> `batch_to_record_batch` applies any selection first.
//
// ====================================================================================
pub(crate) mod arrow_impl;

pub use arrow_impl::{batch_from_record_batch, batch_to_record_batch, vector_from_arrow, vector_to_arrow};

#[cfg(test)]
mod tests;
