//! Output-lattice materialization: fold the per-frame history into a
//! single pruned [`FsaVec`] per sequence, plus the two arc maps back into
//! the inputs.
//!
//! Worked out directly from the decoding-graph invariant in
//! [`crate::graph`] (every `FsaVec` row ends in one unique, out-arc-free
//! final state), which forces every surviving copy of a graph's final
//! state (one per frame it was reached at) to be folded into a single
//! synthetic final state per output sequence.

use crate::dense::DenseFsaVec;
use crate::frame::{DestState, FrameInfo};
use crate::graph::{Arc, FsaVec};
use crate::ragged::{Ragged, RaggedShape};

/// Per-frame `state_kept[t][i]`: whether `frames[t].states.values[i]`
/// survives into the output, computed forward from frame 0 (always kept
/// when reachable to acceptance) by following which arcs `keep_masks`
/// marks as surviving.
fn compute_state_kept(frames: &[FrameInfo], keep_masks: &[Vec<bool>]) -> Vec<Vec<bool>> {
    let t_count = frames.len();
    let mut state_kept: Vec<Vec<bool>> = Vec::with_capacity(t_count);
    state_kept.push(
        frames[0]
            .states
            .values
            .iter()
            .map(|s| s.backward_loglike > f32::NEG_INFINITY)
            .collect(),
    );
    for t in 0..t_count - 1 {
        let mut next_kept = vec![false; frames[t + 1].states.values.len()];
        let arcs = frames[t].arcs.as_ref().expect("non-terminal frame must have arcs");
        for (i, arc) in arcs.values.iter().enumerate() {
            if keep_masks[t][i] {
                if let DestState::Resolved(j) = arc.dest {
                    next_kept[j as usize] = true;
                }
            }
        }
        state_kept.push(next_kept);
    }
    state_kept
}

/// Build the pruned output lattice and its two arc maps
/// (`arc_map_a[i]` = idx012 into the decoding graphs, `arc_map_b[i]` = flat
/// index into `b_fsas.scores`, for each kept output arc `i`). Arcs landing
/// on a graph's final state are redirected to one synthetic final state
/// per sequence, so the output still satisfies the unique-final-state
/// invariant even when that final state was reached at several different
/// frames.
pub fn format_output(
    frames: &[FrameInfo],
    keep_masks: &[Vec<bool>],
    a_fsas: &FsaVec,
    b_fsas: &DenseFsaVec,
) -> (FsaVec, Vec<u32>, Vec<u32>) {
    let num_seqs = frames[0].num_seqs();
    let t_count = frames.len();
    let state_kept = compute_state_kept(frames, keep_masks);

    // output_id[t][local_idx] = numbered output state, or None if this
    // state is either dropped or is a final-graph-state leaf (which is
    // folded into the sequence's synthetic final state instead).
    let mut output_id: Vec<Vec<Option<u32>>> = (0..t_count)
        .map(|t| vec![None; frames[t].states.values.len()])
        .collect();

    let mut states_per_fsa = Vec::with_capacity(num_seqs);
    let mut out_arcs_per_state: Vec<u32> = Vec::new();
    let mut out_arcs: Vec<Arc> = Vec::new();
    let mut arc_map_a: Vec<u32> = Vec::new();
    let mut arc_map_b: Vec<u32> = Vec::new();

    for seq in 0..num_seqs {
        let g = a_fsas.graph_index_for_seq(seq);
        let final_graph_state = a_fsas.final_state(g);

        // Number every kept, non-final-leaf state for this sequence in
        // (t, local) order.
        let mut next_id = 0u32;
        for t in 0..t_count {
            let splits = frames[t].states.shape.row_splits(1);
            let start = splits[seq] as usize;
            let end = splits[seq + 1] as usize;
            for local in start..end {
                if !state_kept[t][local] {
                    continue;
                }
                let a_fsas_state = frames[t].states.values[local].a_fsas_state;
                if Some(a_fsas_state) == final_graph_state {
                    continue;
                }
                output_id[t][local] = Some(next_id);
                next_id += 1;
            }
        }
        let final_id = next_id; // synthetic final state, last in this fsa.
        let num_states_this_seq = final_id + 1;

        // Per-state out-arc counts, numbered states first (in id order),
        // then the synthetic final state (always 0 out-arcs).
        let mut per_state_arcs: Vec<Vec<Arc>> = vec![Vec::new(); num_states_this_seq as usize];
        let mut per_state_map_a: Vec<Vec<u32>> = vec![Vec::new(); num_states_this_seq as usize];
        let mut per_state_map_b: Vec<Vec<u32>> = vec![Vec::new(); num_states_this_seq as usize];

        for t in 0..t_count.saturating_sub(1) {
            let arcs = match &frames[t].arcs {
                Some(a) => a,
                None => continue,
            };
            let splits = frames[t].states.shape.row_splits(1);
            let start = splits[seq] as usize;
            let end = splits[seq + 1] as usize;
            if start == end {
                continue;
            }
            let arc_splits = arcs.shape.row_splits(2);
            let arc_start = arc_splits[start] as usize;
            let arc_end = arc_splits[end] as usize;

            for i in arc_start..arc_end {
                if !keep_masks[t][i] {
                    continue;
                }
                let arc = &arcs.values[i];
                let src_local = state_local_of_arc(&arc_splits, start, end, i);
                let src_id = match output_id[t][src_local] {
                    Some(id) => id,
                    None => continue,
                };
                let dest_j = match arc.dest {
                    DestState::Resolved(j) => j as usize,
                    _ => continue,
                };
                let dest_a_fsas_state = frames[t + 1].states.values[dest_j].a_fsas_state;
                let dest_id = if Some(dest_a_fsas_state) == final_graph_state {
                    final_id
                } else {
                    match output_id[t + 1][dest_j] {
                        Some(id) => id,
                        None => continue,
                    }
                };

                let graph_arc = a_fsas.arc(arc.a_fsas_arc as usize);
                let dense_idx = b_fsas.row_offset(seq, t as u32) * b_fsas.columns
                    + (graph_arc.label + 1) as usize;

                per_state_arcs[src_id as usize].push(Arc {
                    src_state: src_id,
                    dest_state: dest_id,
                    label: graph_arc.label,
                    score: arc.arc_loglike,
                });
                per_state_map_a[src_id as usize].push(arc.a_fsas_arc);
                per_state_map_b[src_id as usize].push(dense_idx as u32);
            }
        }

        for state in 0..num_states_this_seq {
            let arcs_here = &per_state_arcs[state as usize];
            out_arcs_per_state.push(arcs_here.len() as u32);
            out_arcs.extend(arcs_here.iter().cloned());
            arc_map_a.extend(per_state_map_a[state as usize].iter().copied());
            arc_map_b.extend(per_state_map_b[state as usize].iter().copied());
        }
        states_per_fsa.push(num_states_this_seq);
    }

    let shape = RaggedShape::trivial(num_seqs)
        .append_axis(&states_per_fsa)
        .append_axis(&out_arcs_per_state);
    (FsaVec::new(Ragged::new(shape, out_arcs)), arc_map_a, arc_map_b)
}

/// Which row (local state index) owns arc `arc_idx`, given the state
/// range `[start,end)` this sequence occupies and the arc axis's
/// row_splits. Arcs are contiguous per state, so a linear scan over this
/// sequence's (small) state range is enough.
fn state_local_of_arc(arc_row_splits: &[u32], start: usize, end: usize, arc_idx: usize) -> usize {
    for local in start..end {
        if (arc_row_splits[local] as usize) <= arc_idx && arc_idx < arc_row_splits[local + 1] as usize {
            return local;
        }
    }
    unreachable!("arc_idx must fall within [start,end)'s arc range")
}
