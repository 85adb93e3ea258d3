//! Backward pass and output-lattice keep-mask.
//!
//! The backward reduction is a plain per-state max over that state's
//! surviving out-arcs, so unlike [`crate::forward`] it needs no atomic:
//! `crate::ragged::max_per_sublist` already groups arcs by their owning
//! `[fsa,state]` row.

use crate::frame::{DestState, FrameInfo};
use crate::graph::FsaVec;
use crate::ragged::max_per_sublist;

/// Seed the backward pass at the last processed frame: a state's backward
/// log-likelihood is `0.0` if it is its graph's final state (an accepting
/// path ends there for free) and `NEG_INFINITY` otherwise (no path to
/// acceptance survived pruning).
pub fn init_terminal(frame: &mut FrameInfo, a_fsas: &FsaVec) {
    for seq in 0..frame.num_seqs() {
        let g = a_fsas.graph_index_for_seq(seq);
        let final_state = a_fsas.final_state(g);
        let start = frame.states.shape.row_splits(1)[seq] as usize;
        let end = frame.states.shape.row_splits(1)[seq + 1] as usize;
        for i in start..end {
            frame.states.values[i].backward_loglike = if Some(frame.states.values[i].a_fsas_state) == final_state {
                0.0
            } else {
                f32::NEG_INFINITY
            };
        }
    }
}

/// Given `cur_frame`'s arcs (already resolved by
/// [`crate::forward::propagate_forward`]) and `next_frame`'s backward
/// log-likelihoods, compute `cur_frame`'s per-state backward log-likelihood
/// as the max, over surviving out-arcs, of `arc_loglike + backward(dest)`.
///
/// A state that is its graph's final state is anchored to `0.0` regardless
/// of that max: a graph's final state has no out-arcs by construction, so
/// the max-over-out-arcs would otherwise fall back to `NEG_INFINITY` for
/// every sequence that reaches acceptance before the batch's longest
/// sequence runs out of frames (the final state is then active on some
/// non-terminal `cur_frame`, not just the one global terminal frame
/// [`init_terminal`] seeds).
pub fn propagate_backward(cur_frame: &mut FrameInfo, next_frame: &FrameInfo, a_fsas: &FsaVec) {
    let arcs = cur_frame
        .arcs
        .as_ref()
        .expect("propagate_backward requires cur_frame.arcs to be populated");

    let contributions: Vec<f32> = arcs
        .values
        .iter()
        .map(|a| match a.dest {
            DestState::Resolved(idx) => {
                a.arc_loglike + next_frame.states.values[idx as usize].backward_loglike
            }
            DestState::Candidate(_) | DestState::Pruned => f32::NEG_INFINITY,
        })
        .collect();

    let per_state = max_per_sublist(&arcs.shape, &contributions, f32::NEG_INFINITY);
    let state_to_seq = cur_frame.states.shape.row_ids(1).to_vec();
    for ((state, backward), seq) in cur_frame.states.values.iter_mut().zip(per_state).zip(state_to_seq) {
        let g = a_fsas.graph_index_for_seq(seq as usize);
        state.backward_loglike = if Some(state.a_fsas_state) == a_fsas.final_state(g) {
            0.0
        } else {
            backward
        };
    }
}

/// Per-arc keep decision for output-lattice materialization. An arc
/// survives if some complete path through it is within `output_beam` of
/// its sequence's best complete-path score. `end_loglike` is already
/// `forward_loglike(src) + arc_loglike`, so adding the destination's
/// backward log-likelihood gives the best complete-path score routed
/// through that arc.
pub fn compute_keep_mask(cur_frame: &FrameInfo, next_frame: &FrameInfo, tot_scores: &[f32], output_beam: f32) -> Vec<bool> {
    let arcs = cur_frame
        .arcs
        .as_ref()
        .expect("compute_keep_mask requires cur_frame.arcs to be populated");
    let arc_to_seq = arcs.shape.row_ids_to_axis0(2);

    arcs.values
        .iter()
        .enumerate()
        .map(|(i, a)| match a.dest {
            DestState::Resolved(idx) => {
                let through = a.end_loglike + next_frame.states.values[idx as usize].backward_loglike;
                let seq = arc_to_seq[i] as usize;
                through >= tot_scores[seq] - output_beam
            }
            DestState::Candidate(_) | DestState::Pruned => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ArcInfo, StateInfo};
    use crate::graph::Arc;
    use crate::ordered_float::to_ordered;
    use crate::ragged::{Ragged, RaggedShape};

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

    fn state(a_fsas_state: u32, forward: f32, backward: f32) -> StateInfo {
        StateInfo {
            a_fsas_state,
            forward_loglike: to_ordered(forward),
            backward_loglike: backward,
        }
    }

    #[test]
    fn init_terminal_marks_final_states_zero() {
        let fsa = tiny_acceptor();
        let shape = RaggedShape::trivial(1).append_axis(&[2]);
        let mut frame = FrameInfo {
            states: Ragged::new(shape, vec![state(0, 0.0, 0.0), state(1, 0.0, 0.0)]),
            arcs: None,
        };
        init_terminal(&mut frame, &fsa);
        assert_eq!(frame.states.values[0].backward_loglike, f32::NEG_INFINITY);
        assert_eq!(frame.states.values[1].backward_loglike, 0.0);
    }

    #[test]
    fn propagate_backward_takes_max_over_out_arcs() {
        let fsa = tiny_acceptor();
        let cur_shape = RaggedShape::trivial(1).append_axis(&[1]);
        let arcs_shape = cur_shape.clone().append_axis(&[2]);
        let mut cur = FrameInfo {
            states: Ragged::new(cur_shape, vec![state(0, 0.0, f32::NEG_INFINITY)]),
            arcs: Some(Ragged::new(
                arcs_shape,
                vec![
                    ArcInfo { a_fsas_arc: 0, arc_loglike: -1.0, end_loglike: -1.0, dest: DestState::Resolved(0) },
                    ArcInfo { a_fsas_arc: 1, arc_loglike: -0.5, end_loglike: -0.5, dest: DestState::Resolved(1) },
                ],
            )),
        };
        let next_shape = RaggedShape::trivial(1).append_axis(&[2]);
        let next = FrameInfo {
            states: Ragged::new(next_shape, vec![state(0, 0.0, -2.0), state(0, 0.0, 0.0)]),
            arcs: None,
        };
        propagate_backward(&mut cur, &next, &fsa);
        // max(-1.0 + -2.0, -0.5 + 0.0) == -0.5
        assert_eq!(cur.states.values[0].backward_loglike, -0.5);
    }

    /// A sequence that reaches its graph's final state before the batch's
    /// longest sequence runs out of frames must still get the `0.0` anchor
    /// at that non-terminal frame, not just at the global terminal frame.
    #[test]
    fn propagate_backward_anchors_final_state_on_non_terminal_frame() {
        let fsa = tiny_acceptor();
        let cur_shape = RaggedShape::trivial(1).append_axis(&[1]);
        let arcs_shape = cur_shape.clone().append_axis(&[0]);
        let mut cur = FrameInfo {
            states: Ragged::new(cur_shape, vec![state(1, 0.0, f32::NEG_INFINITY)]),
            arcs: Some(Ragged::new(arcs_shape, vec![])),
        };
        let next_shape = RaggedShape::trivial(1).append_axis(&[0]);
        let next = FrameInfo {
            states: Ragged::new(next_shape, vec![]),
            arcs: None,
        };
        propagate_backward(&mut cur, &next, &fsa);
        assert_eq!(cur.states.values[0].backward_loglike, 0.0);
    }

    #[test]
    fn keep_mask_drops_arcs_outside_output_beam() {
        let cur_shape = RaggedShape::trivial(1).append_axis(&[1]);
        let arcs_shape = cur_shape.clone().append_axis(&[2]);
        let cur = FrameInfo {
            states: Ragged::new(cur_shape, vec![state(0, 0.0, f32::NEG_INFINITY)]),
            arcs: Some(Ragged::new(
                arcs_shape,
                vec![
                    ArcInfo { a_fsas_arc: 0, arc_loglike: 0.0, end_loglike: 0.0, dest: DestState::Resolved(0) },
                    ArcInfo { a_fsas_arc: 1, arc_loglike: -10.0, end_loglike: -10.0, dest: DestState::Resolved(0) },
                ],
            )),
        };
        let next_shape = RaggedShape::trivial(1).append_axis(&[1]);
        let next = FrameInfo {
            states: Ragged::new(next_shape, vec![state(0, 0.0, 0.0)]),
            arcs: None,
        };
        let keep = compute_keep_mask(&cur, &next, &[0.0], 8.0);
        assert_eq!(keep, vec![true, false]);
    }
}
