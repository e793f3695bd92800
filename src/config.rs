// In: src/config.rs

//! The single source of truth for ringwire runtime configuration.
//!
//! `RingwireConfig` is created once at the operator boundary (usually parsed from
//! the JSON blob the scheduler hands to a worker) and then consumed by the arena
//! and ring constructors. Every field has a default so partial documents load.

use serde::{Deserialize, Serialize};

use crate::error::RingwireError;

/// Smallest and largest HyperLogLog precision accepted by the sketch rings.
pub const MIN_SKETCH_PRECISION: u8 = 4;
pub const MAX_SKETCH_PRECISION: u8 = 16;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RingwireConfig {
    /// Byte budget for the worker's memory arena. `None` disables the limit.
    #[serde(default)]
    pub arena_budget_bytes: Option<usize>,

    /// Slot capacity reserved the first time a ring grows.
    #[serde(default = "default_initial_group_capacity")]
    pub initial_group_capacity: usize,

    /// Upper bound on any single length prefix the decoder will honour.
    #[serde(default = "default_max_decode_len")]
    pub max_decode_len: usize,

    /// Register bits for APPROX_COUNT_DISTINCT sketches.
    #[serde(default = "default_sketch_precision")]
    pub sketch_precision: u8,
}

impl Default for RingwireConfig {
    fn default() -> Self {
        Self {
            arena_budget_bytes: None,
            initial_group_capacity: default_initial_group_capacity(),
            max_decode_len: default_max_decode_len(),
            sketch_precision: default_sketch_precision(),
        }
    }
}

impl RingwireConfig {
    /// Parses a configuration document, filling omitted fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, RingwireError> {
        let mut config: RingwireConfig = serde_json::from_str(json)?;
        config.sketch_precision = config
            .sketch_precision
            .clamp(MIN_SKETCH_PRECISION, MAX_SKETCH_PRECISION);
        if config.initial_group_capacity == 0 {
            config.initial_group_capacity = 1;
        }
        Ok(config)
    }
}

fn default_initial_group_capacity() -> usize {
    8
}

fn default_max_decode_len() -> usize {
    256 * 1024 * 1024
}

fn default_sketch_precision() -> u8 {
    14
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RingwireConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RingwireConfig::default());
        assert_eq!(config.initial_group_capacity, 8);
        assert_eq!(config.sketch_precision, 14);
    }

    #[test]
    fn test_partial_document_and_clamping() {
        let config = RingwireConfig::from_json_str(
            r#"{"arena_budget_bytes": 4096, "sketch_precision": 30, "initial_group_capacity": 0}"#,
        )
        .unwrap();
        assert_eq!(config.arena_budget_bytes, Some(4096));
        assert_eq!(config.sketch_precision, MAX_SKETCH_PRECISION);
        assert_eq!(config.initial_group_capacity, 1);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let result = RingwireConfig::from_json_str("{not json");
        assert!(matches!(result, Err(RingwireError::SerdeJson(_))));
    }
}
