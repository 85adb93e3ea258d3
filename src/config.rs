//! Decoding configuration.
//!
//! A plain struct-of-tunables, `serde`-derived so a caller — or the CLI
//! front-end in `main.rs` — can load one from JSON.

use serde::{Deserialize, Serialize};

/// Tunables for [`crate::intersect_dense_pruned`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Target forward cutoff margin; the dynamic beam relaxes toward this.
    pub search_beam: f32,
    /// Fixed backward cutoff margin used to keep arcs/states in the output.
    pub output_beam: f32,
    /// Soft floor on per-sequence active states.
    pub min_active: usize,
    /// Soft ceiling on per-sequence active states.
    pub max_active: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            search_beam: 20.0,
            output_beam: 8.0,
            min_active: 30,
            max_active: 10_000,
        }
    }
}
