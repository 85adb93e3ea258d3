//! Per-frame state: `StateInfo`, `ArcInfo`, `FrameInfo`, and initial-frame
//! construction.
//!
//! `FrameInfo`'s `states`/`arcs` are parallel per-step `Vec`s much like a
//! fixed-width beam search's per-beam score/sequence arrays, generalised to
//! a ragged per-sequence active-state set whose shape changes every frame.

use crate::graph::FsaVec;
use crate::ordered_float::to_ordered;
use crate::ragged::{Ragged, RaggedShape};

/// One active state on one frame.
#[derive(Debug, Clone, Copy)]
pub struct StateInfo {
    /// idx01 into the decoding graphs.
    pub a_fsas_state: u32,
    /// Best forward score to this state so far, as an order-preserving
    /// `u32` so it can be updated with a lock-free atomic max.
    pub forward_loglike: u32,
    /// Best score from this state to a complete path; set during the
    /// backward pass. `NEG_INFINITY` until then and if pruned.
    pub backward_loglike: f32,
}

impl StateInfo {
    fn start(a_fsas_state: u32) -> Self {
        Self {
            a_fsas_state,
            forward_loglike: to_ordered(0.0),
            backward_loglike: f32::NEG_INFINITY,
        }
    }
}

/// The destination of an [`ArcInfo`], which means two different things at
/// two life stages: a candidate graph state right after expansion, or a
/// resolved index into the next frame's state
/// list after forward propagation dedups destinations. Modeled as an enum
/// rather than two fields plus a validity flag so "resolved but invalid" is
/// unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestState {
    /// idx01 into the decoding graphs — not yet deduplicated.
    Candidate(u32),
    /// idx1 within `next_frame.states[seq]`, after dedup.
    Resolved(u32),
    /// Arc did not survive forward pruning.
    Pruned,
}

/// One arc considered during a single frame's expansion.
#[derive(Debug, Clone, Copy)]
pub struct ArcInfo {
    /// idx012 into the decoding graph's arcs.
    pub a_fsas_arc: u32,
    /// `emission[seq, t, label+1] + graph_arc.score`.
    pub arc_loglike: f32,
    /// `forward_loglike(src) + arc_loglike`.
    pub end_loglike: f32,
    pub dest: DestState,
}

/// One time step's active states and (once populated) their out-arcs.
///
/// `arcs` shares its first two axes (`[fsa,state]`) with `states.shape`.
#[derive(Debug, Clone)]
pub struct FrameInfo {
    pub states: Ragged<StateInfo>,
    pub arcs: Option<Ragged<ArcInfo>>,
}

impl FrameInfo {
    /// One `StateInfo` per sequence, holding that sequence's decoding
    /// graph's start state, with forward_loglike = 0 and no arcs yet.
    pub fn initial(a_fsas: &FsaVec, num_seqs: usize) -> FrameInfo {
        let mut counts = Vec::with_capacity(num_seqs);
        let mut values = Vec::new();
        for seq in 0..num_seqs {
            let g = a_fsas.graph_index_for_seq(seq);
            match a_fsas.start_state(g) {
                Some(start) => {
                    counts.push(1u32);
                    values.push(StateInfo::start(start));
                }
                None => counts.push(0u32),
            }
        }
        let shape = RaggedShape::trivial(num_seqs).append_axis(&counts);
        FrameInfo {
            states: Ragged::new(shape, values),
            arcs: None,
        }
    }

    pub fn num_seqs(&self) -> usize {
        self.states.shape.dim0()
    }

    /// Active-state count for sequence `seq`.
    pub fn active_count(&self, seq: usize) -> u32 {
        self.states.shape.row_splits(1)[seq + 1] - self.states.shape.row_splits(1)[seq]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Arc;

    fn tiny_acceptor() -> FsaVec {
        FsaVec::from_counts(
            &[2],
            &[2, 0],
            vec![
                Arc { src_state: 0, dest_state: 0, label: 0, score: 0.0 },
                Arc { src_state: 0, dest_state: 1, label: -1, score: 0.0 },
            ],
        )
    }

    #[test]
    fn initial_frame_one_start_state_per_seq() {
        let fsa = tiny_acceptor();
        let frame = FrameInfo::initial(&fsa, 3);
        assert_eq!(frame.num_seqs(), 3);
        for seq in 0..3 {
            assert_eq!(frame.active_count(seq), 1);
        }
        assert_eq!(frame.states.values[0].a_fsas_state, 0);
        assert_eq!(frame.states.values[0].forward_loglike, to_ordered(0.0));
    }

    #[test]
    fn initial_frame_empty_graph_gives_empty_sublist() {
        let shape = RaggedShape::trivial(1).append_axis(&[0]).append_axis(&[]);
        let empty = FsaVec::new(Ragged::new(shape, vec![]));
        let frame = FrameInfo::initial(&empty, 1);
        assert_eq!(frame.active_count(0), 0);
    }
}
