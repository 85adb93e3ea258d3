//! Pruned dense-graph intersection (composition) for speech decoding.
//!
//! Batches of decoding graphs (`a_fsas`) are composed frame-by-frame
//! against batches of dense per-frame emission scores (`b_fsas`), with a
//! dynamic beam keeping the number of active states per sequence within a
//! configured band. See [`intersect_dense_pruned`] for the entry point.

pub mod backward;
pub mod config;
pub mod cutoffs;
pub mod dense;
pub mod error;
pub mod exec;
pub mod forward;
pub mod frame;
pub mod graph;
pub mod intersect;
pub mod ordered_float;
pub mod output;
pub mod ragged;

pub use config::DecodeConfig;
pub use dense::DenseFsaVec;
pub use error::IntersectError;
pub use exec::Context;
pub use frame::{ArcInfo, DestState, FrameInfo, StateInfo};
pub use graph::{Arc, FsaVec};
pub use intersect::intersect_dense_pruned;
pub use ragged::{Ragged, RaggedShape};
