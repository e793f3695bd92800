// In: src/error.rs

//! This module defines the single, unified error type for the entire ringwire library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RingwireError {
    // =========================================================================
    // === Resource Errors
    // =========================================================================
    /// The arena refused a grow/alloc request because it would exceed its budget.
    #[error("Arena allocation of {requested} bytes rejected ({in_use} in use, budget {budget})")]
    AllocationExhausted {
        requested: usize,
        in_use: usize,
        budget: usize,
    },

    // =========================================================================
    // === Wire Protocol Errors
    // =========================================================================
    /// Truncated buffer, a length prefix larger than the remaining bytes, or a
    /// payload that is internally inconsistent.
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    /// A tag byte that this build does not recognise (version skew between nodes).
    #[error("Unknown {what} tag: {tag}")]
    UnknownTag { what: &'static str, tag: u16 },

    // =========================================================================
    // === Contract Errors (planner or operator bugs)
    // =========================================================================
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Ring has already been finalized by Eval")]
    RingFinalized,

    #[error("Group {group}: total weight {total} is below null count {nulls}")]
    WeightUnderflow { group: usize, total: i64, nulls: i64 },

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    // =========================================================================
    // === External Error Wrappers
    // =========================================================================
    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String), // Manual `From` impl is needed as bytemuck::PodCastError doesn't impl Error

    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading configuration.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl RingwireError {
    /// `true` for errors that come from bytes received over the wire, as opposed
    /// to local misuse. Callers use this to decide whether to blame the peer.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            RingwireError::MalformedEncoding(_) | RingwireError::UnknownTag { .. }
        )
    }
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for RingwireError {
    fn from(err: bytemuck::PodCastError) -> Self {
        RingwireError::PodCast(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RingwireError>;
