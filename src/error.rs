//! Error type for the one public fallible entry point, [`crate::intersect_dense_pruned`].
//!
//! Precondition violations are refused with a typed `Result` rather than a
//! process abort; callers decide what to do with it (a CLI front-end, for
//! instance, exits non-zero).

use thiserror::Error;

/// Reasons [`crate::intersect_dense_pruned`] can refuse to run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntersectError {
    #[error(
        "a_fsas.dim0 ({a_fsas_dim0}) must be 1 or equal to b_fsas.dim0 ({b_fsas_dim0})"
    )]
    GraphCountMismatch {
        a_fsas_dim0: usize,
        b_fsas_dim0: usize,
    },

    #[error("b_fsas.dim0 must be >= 1, got 0")]
    EmptyBatch,

    #[error("output_beam must be > 0, got {0}")]
    NonPositiveOutputBeam(f32),

    #[error("min_active ({min_active}) must be < max_active ({max_active})")]
    ActiveBandInverted { min_active: usize, max_active: usize },

    #[error(
        "sequences must be sorted by non-increasing frame count: seq {prev_idx} has {prev_len} \
         frames but seq {idx} (later in the batch) has {len}, which is greater"
    )]
    SequencesNotSorted {
        prev_idx: usize,
        prev_len: usize,
        idx: usize,
        len: usize,
    },

    #[error(
        "arc label {label} in fsa {fsa} is out of range: label+1 ({label_plus_one}) must be in \
         0..{columns}"
    )]
    LabelOutOfRange {
        fsa: usize,
        label: i32,
        label_plus_one: i64,
        columns: usize,
    },
}
