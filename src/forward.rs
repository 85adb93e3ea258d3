//! Arc expansion and forward propagation.
//!
//! `get_arcs` turns a ragged set of active states into a ragged set of
//! out-arcs by an exclusive-sum over out-degrees. `propagate_forward`'s
//! destination dedup is a group-by-destination-index reduction, but the
//! reduction itself has to be a true atomic max (not a tensor op) because
//! the destination groups aren't known until the arcs are expanded.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::dense::DenseFsaVec;
use crate::exec::{run, Context};
use crate::frame::{ArcInfo, DestState, FrameInfo, StateInfo};
use crate::graph::FsaVec;
use crate::ordered_float::{from_ordered, to_ordered};
use crate::ragged::{exclusive_sum, Ragged, RaggedShape};

/// Expand every active state's out-arcs into a 3-axis
/// `[fsa,state,arc]` ragged tensor of [`ArcInfo`].
pub fn get_arcs(
    t: u32,
    frame: &FrameInfo,
    a_fsas: &FsaVec,
    b_fsas: &DenseFsaVec,
    ctx: Context,
) -> Ragged<ArcInfo> {
    let num_states = frame.states.values.len();
    let state_to_seq = frame.states.shape.row_ids(1);

    let mut counts = vec![0u32; num_states];
    run(ctx, num_states, |i| {
        let seq = state_to_seq[i] as usize;
        // A sequence with no frames left simply stops producing arcs: any
        // state it still has active dies without reaching a final state.
        let n = if t < b_fsas.num_frames(seq) {
            let g = frame.states.values[i].a_fsas_state;
            a_fsas.out_arc_range(g).len() as u32
        } else {
            0
        };
        // SAFETY: disjoint index `i` per invocation.
        unsafe {
            let p = counts.as_ptr().add(i) as *mut u32;
            *p = n;
        }
    });

    let arc_splits = exclusive_sum(&counts);
    let total_arcs = *arc_splits.last().unwrap() as usize;
    let arc_to_state = {
        let mut ids = Vec::with_capacity(total_arcs);
        for (state, w) in arc_splits.windows(2).enumerate() {
            ids.resize(ids.len() + (w[1] - w[0]) as usize, state as u32);
        }
        ids
    };

    let mut values: Vec<ArcInfo> = Vec::with_capacity(total_arcs);
    values.resize(
        total_arcs,
        ArcInfo {
            a_fsas_arc: 0,
            arc_loglike: 0.0,
            end_loglike: 0.0,
            dest: DestState::Pruned,
        },
    );

    run(ctx, total_arcs, |arc_slot| {
        let state_idx = arc_to_state[arc_slot] as usize;
        let state = &frame.states.values[state_idx];
        let seq = state_to_seq[state_idx] as usize;
        let g = state.a_fsas_state;
        let range = a_fsas.out_arc_range(g);
        let local = arc_slot - arc_splits[state_idx] as usize;
        let graph_arc_idx012 = range.start + local;
        let a = a_fsas.arc(graph_arc_idx012);

        let column = (a.label + 1) as usize;
        let arc_loglike = b_fsas.score(seq, t, column) + a.score;
        let end_loglike = from_ordered(state.forward_loglike) + arc_loglike;
        let dest_a_fsas_state = (g as i64 + (a.dest_state as i64 - a.src_state as i64)) as u32;

        // SAFETY: disjoint index `arc_slot` per invocation.
        unsafe {
            let p = values.as_ptr().add(arc_slot) as *mut ArcInfo;
            *p = ArcInfo {
                a_fsas_arc: graph_arc_idx012 as u32,
                arc_loglike,
                end_loglike,
                dest: DestState::Candidate(dest_a_fsas_state),
            };
        }
    });

    let shape = frame.states.shape.clone().append_axis(&counts);
    Ragged::new(shape, values)
}

/// Apply cutoffs, dedup destination states, build the next frame.
/// Mutates `cur_frame.arcs` in place (attaching the fully built arcs with
/// `dest` rewritten) and returns the new `next_frame` plus the per-sequence
/// cutoffs used on this frame (for logging/diagnostics).
#[allow(clippy::too_many_arguments)]
pub fn propagate_forward(
    t: u32,
    cur_frame: &mut FrameInfo,
    a_fsas: &FsaVec,
    b_fsas: &DenseFsaVec,
    seq_num_frames: &[u32],
    dynamic_beams: &mut [f32],
    search_beam: f32,
    min_active: usize,
    max_active: usize,
    ctx: Context,
) -> (FrameInfo, Vec<f32>) {
    let num_seqs = cur_frame.num_seqs();
    let mut arcs = get_arcs(t, cur_frame, a_fsas, b_fsas, ctx);

    let end_loglikes: Vec<f32> = arcs.values.iter().map(|a| a.end_loglike).collect();
    let active_counts: Vec<u32> = (0..num_seqs).map(|s| cur_frame.active_count(s) as u32).collect();
    let cutoffs = crate::cutoffs::get_pruning_cutoffs(
        &arcs.shape,
        &end_loglikes,
        &active_counts,
        dynamic_beams,
        search_beam,
        min_active,
        max_active,
    );

    let arc_to_seq = arcs.shape.row_ids_to_axis0(2);

    // Step 3: mark kept arcs.
    let kept: Vec<bool> = (0..arcs.values.len())
        .map(|i| {
            let seq = arc_to_seq[i] as usize;
            if end_loglikes[i] < cutoffs[seq] {
                return false;
            }
            if let DestState::Candidate(dest) = arcs.values[i].dest {
                let g = a_fsas.graph_index_for_seq(seq);
                if Some(dest) == a_fsas.final_state(g) && t + 1 < seq_num_frames[seq] {
                    return false;
                }
            }
            true
        })
        .collect();

    // Step 4: per-sequence dedup of kept arcs' destination states.
    // Build, for each sequence, the sorted-unique list of (dest, slot).
    let mut next_counts = vec![0u32; num_seqs];
    // dest_slot[i] = index into next_frame.states[seq] for kept arc i, or
    // None for pruned arcs.
    let mut dest_slot: Vec<Option<u32>> = vec![None; arcs.values.len()];
    let mut next_states: Vec<StateInfo> = Vec::new();
    let mut next_state_atomics: Vec<AtomicU32> = Vec::new();

    // Group arc indices by sequence using arcs.shape's own row grouping.
    let arc_row_splits = arcs.shape.row_splits(2); // indexed by state, not seq;
    // we need per-seq ranges: use the state axis's row_ids_to_axis0 plus
    // the fact that a sequence's states are contiguous in frame.states.
    let state_splits = cur_frame.states.shape.row_splits(1);

    for seq in 0..num_seqs {
        let state_start = state_splits[seq] as usize;
        let state_end = state_splits[seq + 1] as usize;
        let arc_start = arc_row_splits[state_start] as usize;
        let arc_end = arc_row_splits[state_end] as usize;

        let mut dest_list: Vec<(u32, usize)> = (arc_start..arc_end)
            .filter(|&i| kept[i])
            .map(|i| match arcs.values[i].dest {
                DestState::Candidate(d) => (d, i),
                _ => unreachable!(),
            })
            .collect();
        dest_list.sort_unstable_by_key(|&(d, _)| d);

        let base_slot = next_states.len() as u32;
        let mut num_unique = 0u32;
        let mut prev_dest: Option<u32> = None;
        for &(dest, arc_idx) in &dest_list {
            if prev_dest != Some(dest) {
                next_states.push(StateInfo {
                    a_fsas_state: dest,
                    forward_loglike: to_ordered(f32::NEG_INFINITY),
                    backward_loglike: f32::NEG_INFINITY,
                });
                num_unique += 1;
                prev_dest = Some(dest);
            }
            let slot = base_slot + num_unique - 1;
            dest_slot[arc_idx] = Some(slot);
        }
        next_counts[seq] = num_unique;
    }
    next_state_atomics.extend(
        next_states
            .iter()
            .map(|s| AtomicU32::new(s.forward_loglike)),
    );

    // Atomic-max merge of forward_loglike over all kept arcs into their
    // resolved destination slot.
    run(ctx, arcs.values.len(), |i| {
        if let Some(slot) = dest_slot[i] {
            let candidate = to_ordered(arcs.values[i].end_loglike);
            next_state_atomics[slot as usize].fetch_max(candidate, Ordering::Relaxed);
        }
    });
    for (s, a) in next_states.iter_mut().zip(next_state_atomics.iter()) {
        s.forward_loglike = a.load(Ordering::Relaxed);
    }

    // Step 5: rewrite dest on cur_frame's arcs.
    run(ctx, arcs.values.len(), |i| {
        let resolved = match dest_slot[i] {
            Some(slot) => DestState::Resolved(slot),
            None => DestState::Pruned,
        };
        // SAFETY: disjoint index `i` per invocation.
        unsafe {
            let p = arcs.values.as_ptr().add(i) as *mut ArcInfo;
            (*p).dest = resolved;
        }
    });

    let next_shape = RaggedShape::trivial(num_seqs).append_axis(&next_counts);
    let next_frame = FrameInfo {
        states: Ragged::new(next_shape, next_states),
        arcs: None,
    };

    cur_frame.arcs = Some(arcs);
    (next_frame, cutoffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Arc;

    fn one_state_two_symbol_acceptor() -> FsaVec {
        // states: 0 (start), 1 (final). arcs: 0->0 label 0, 0->1 label -1.
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
    fn get_arcs_expands_out_degree() {
        let fsa = one_state_two_symbol_acceptor();
        let b = DenseFsaVec::new(&[1], 2, vec![0.0, f32::NEG_INFINITY]);
        let frame = FrameInfo::initial(&fsa, 1);
        let arcs = get_arcs(0, &frame, &fsa, &b, Context::Serial);
        assert_eq!(arcs.values.len(), 2);
        assert_eq!(arcs.values[0].arc_loglike, 0.0);
        assert_eq!(arcs.values[1].arc_loglike, f32::NEG_INFINITY);
    }

    #[test]
    fn propagate_forward_dedups_destinations() {
        let fsa = one_state_two_symbol_acceptor();
        // t0: only label 0 viable (column1=0.0), final column (0) = -inf
        let b = DenseFsaVec::new(&[1], 2, vec![f32::NEG_INFINITY, 0.0]);
        let mut frame = FrameInfo::initial(&fsa, 1);
        let mut beams = vec![20.0];
        let (next, _cutoffs) = propagate_forward(
            0, &mut frame, &fsa, &b, &[1], &mut beams, 20.0, 1, 100, Context::Serial,
        );
        // label 0 arc score: column index = label+1 = 1 -> 0.0 (kept)
        // final arc: column index = 0 -> -inf (pruned by score)
        assert_eq!(next.states.values.len(), 1);
        assert_eq!(next.states.values[0].a_fsas_state, 0);
    }
}
