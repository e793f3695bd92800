//! This file is the root of the `ringwire` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`ring`, `protocol`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the types a caller needs to build rings, feed them batches and
//!     move either across the wire.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Buffers are reinterpreted in place and the wire format is little-endian.
#[cfg(target_endian = "big")]
compile_error!("ringwire only supports little-endian targets");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod arena;
pub mod batch;
pub mod bridge;
pub mod config;
pub mod error;
pub mod explain;
pub mod extend;
pub mod instruction;
pub mod null_handling;
pub mod protocol;
pub mod ring;
pub mod traits;
pub mod types;
pub mod vector;

mod utils;

#[doc(hidden)]
pub use log as __log;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use arena::{Arena, ArenaBuffer, ArenaVec, Growth};
pub use batch::Batch;
pub use config::RingwireConfig;
pub use error::{Result, RingwireError};
pub use extend::Extend;
pub use instruction::{Argument, Direction, Instruction, OpCode};
pub use null_handling::NullBitmap;
pub use ring::{AggFunc, Ring};
pub use types::{Date, Datetime, Type, TypeKind};
pub use vector::Vector;
