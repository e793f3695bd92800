//! This module defines the core, strongly-typed data representations shared by
//! vectors, rings and the wire protocol.
//!
//! It holds the canonical `TypeKind` enum (with its stable one-byte wire tag), the
//! `Type` descriptor attached to every vector and ring, and the plain-old-data
//! temporal newtypes that live inside reinterpreted buffers.

pub mod type_kind;

// Re-export the main type(s) for easier access.
pub use type_kind::{Date, Datetime, Type, TypeKind};
