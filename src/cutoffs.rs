//! Per-sequence dynamic-beam controller.
//!
//! A feedback-controlled score margin that targets an active-state
//! *count* band (`[min_active, max_active]`) rather than a fixed top-K
//! cut: the margin widens or narrows from one frame to the next based on
//! how many states it would have kept on the frame just finished.

use crate::ragged::{max_per_sublist, RaggedShape};

/// Per-sequence pruning cutoffs for one frame, plus the updated dynamic
/// beams (mutated in place).
pub fn get_pruning_cutoffs(
    arc_end_scores_shape: &RaggedShape,
    end_loglikes: &[f32],
    active_counts: &[u32],
    dynamic_beams: &mut [f32],
    search_beam: f32,
    min_active: usize,
    max_active: usize,
) -> Vec<f32> {
    // Flatten axes 1,2 ([fsa,state,arc] -> [fsa,arc]) by reducing directly
    // over the leaf axis; max_per_sublist already operates on the last axis
    // of the shape regardless of how many axes precede it, so no actual
    // flattening of the shape object is needed.
    let best = max_per_sublist(arc_end_scores_shape, end_loglikes, f32::NEG_INFINITY);

    let mut cutoffs = Vec::with_capacity(best.len());
    for seq in 0..best.len() {
        let active = active_counts[seq] as usize;
        let beam = &mut dynamic_beams[seq];

        if active <= max_active && (active >= min_active || active == 0) {
            *beam = 0.8 * *beam + 0.2 * search_beam;
        } else if active <= max_active {
            // 0 < active < min_active
            if *beam < search_beam {
                *beam = search_beam;
            }
            *beam *= 1.25;
        } else {
            // active > max_active
            if *beam > search_beam {
                *beam = search_beam;
            }
            *beam *= 0.9;
        }

        cutoffs.push(best[seq] - *beam);
    }
    cutoffs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape_two_seqs(arcs_per_seq: &[u32]) -> RaggedShape {
        // [fsa, state(=1 per fsa), arc]
        RaggedShape::trivial(arcs_per_seq.len())
            .append_axis(&vec![1u32; arcs_per_seq.len()])
            .append_axis(arcs_per_seq)
    }

    #[test]
    fn beam_relaxes_toward_search_beam_when_in_band() {
        let shape = shape_two_seqs(&[2]);
        let end = vec![1.0, 2.0];
        let mut beams = vec![5.0];
        let cutoffs = get_pruning_cutoffs(&shape, &end, &[5], &mut beams, 20.0, 1, 100);
        assert_eq!(beams[0], 0.8 * 5.0 + 0.2 * 20.0);
        assert_eq!(cutoffs[0], 2.0 - beams[0]);
    }

    #[test]
    fn beam_grows_when_under_min_active() {
        let shape = shape_two_seqs(&[1]);
        let end = vec![1.0];
        let mut beams = vec![5.0];
        get_pruning_cutoffs(&shape, &end, &[2], &mut beams, 20.0, 10, 100);
        assert_eq!(beams[0], 20.0 * 1.25);
    }

    #[test]
    fn beam_shrinks_when_over_max_active() {
        let shape = shape_two_seqs(&[1]);
        let end = vec![1.0];
        let mut beams = vec![25.0];
        get_pruning_cutoffs(&shape, &end, &[200], &mut beams, 20.0, 1, 100);
        assert_eq!(beams[0], 20.0 * 0.9);
    }

    #[test]
    fn empty_sequence_uses_identity_and_relaxes() {
        let shape = shape_two_seqs(&[0]);
        let end: Vec<f32> = vec![];
        let mut beams = vec![5.0];
        let cutoffs = get_pruning_cutoffs(&shape, &end, &[0], &mut beams, 20.0, 1, 100);
        assert_eq!(cutoffs[0], f32::NEG_INFINITY);
        assert_eq!(beams[0], 0.8 * 5.0 + 0.2 * 20.0);
    }
}
