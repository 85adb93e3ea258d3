//! The public entry point: precondition checks, the frame-loop driver, and
//! output materialization.

use tracing::{debug, error, info, instrument};

use crate::backward;
use crate::config::DecodeConfig;
use crate::dense::DenseFsaVec;
use crate::error::IntersectError;
use crate::exec::Context;
use crate::forward;
use crate::frame::FrameInfo;
use crate::graph::FsaVec;
use crate::output;

/// Precondition checks. Violations are refused with a typed error rather
/// than a process abort.
fn validate(a_fsas: &FsaVec, b_fsas: &DenseFsaVec, config: &DecodeConfig) -> Result<(), IntersectError> {
    if b_fsas.dim0() == 0 {
        error!("rejecting empty batch");
        return Err(IntersectError::EmptyBatch);
    }
    if a_fsas.dim0() != 1 && a_fsas.dim0() != b_fsas.dim0() {
        error!(a_fsas_dim0 = a_fsas.dim0(), b_fsas_dim0 = b_fsas.dim0(), "graph count mismatch");
        return Err(IntersectError::GraphCountMismatch {
            a_fsas_dim0: a_fsas.dim0(),
            b_fsas_dim0: b_fsas.dim0(),
        });
    }
    if config.output_beam <= 0.0 {
        error!(output_beam = config.output_beam, "non-positive output beam");
        return Err(IntersectError::NonPositiveOutputBeam(config.output_beam));
    }
    if config.min_active >= config.max_active {
        error!(min_active = config.min_active, max_active = config.max_active, "active band inverted");
        return Err(IntersectError::ActiveBandInverted {
            min_active: config.min_active,
            max_active: config.max_active,
        });
    }
    if let Err((prev_idx, prev_len, idx, len)) = b_fsas.is_sorted_non_increasing() {
        error!(prev_idx, prev_len, idx, len, "sequences not sorted non-increasing by frame count");
        return Err(IntersectError::SequencesNotSorted {
            prev_idx,
            prev_len: prev_len as usize,
            idx,
            len: len as usize,
        });
    }

    let arc_to_fsa = a_fsas.arcs.shape.row_ids_to_axis0(2);
    for (idx012, arc) in a_fsas.arcs.values.iter().enumerate() {
        let label_plus_one = arc.label as i64 + 1;
        if label_plus_one < 0 || label_plus_one >= b_fsas.columns as i64 {
            error!(
                fsa = arc_to_fsa[idx012],
                label = arc.label,
                label_plus_one,
                columns = b_fsas.columns,
                "arc label out of range"
            );
            return Err(IntersectError::LabelOutOfRange {
                fsa: arc_to_fsa[idx012] as usize,
                label: arc.label,
                label_plus_one,
                columns: b_fsas.columns,
            });
        }
    }
    Ok(())
}

/// Pruned composition of a batch of decoding graphs against a batch of
/// dense per-frame emissions. Returns the pruned output lattice plus
/// `arc_map_a`/`arc_map_b`, mapping each output arc back to the decoding
/// graph arc and dense-emission cell it came from.
#[instrument(skip_all, fields(num_seqs = b_fsas.dim0()))]
pub fn intersect_dense_pruned(
    a_fsas: &FsaVec,
    b_fsas: &DenseFsaVec,
    config: &DecodeConfig,
    ctx: Context,
) -> Result<(FsaVec, Vec<u32>, Vec<u32>), IntersectError> {
    validate(a_fsas, b_fsas, config)?;

    let num_seqs = b_fsas.dim0();
    let t_count = b_fsas.num_frames(0) as usize;
    let seq_num_frames: Vec<u32> = (0..num_seqs).map(|s| b_fsas.num_frames(s)).collect();
    let mut dynamic_beams = vec![config.search_beam; num_seqs];

    info!(t_count, "starting forward pass");
    let mut frames: Vec<FrameInfo> = Vec::with_capacity(t_count + 1);
    frames.push(FrameInfo::initial(a_fsas, num_seqs));

    for t in 0..t_count {
        let (next, cutoffs) = {
            let cur = &mut frames[t];
            forward::propagate_forward(
                t as u32,
                cur,
                a_fsas,
                b_fsas,
                &seq_num_frames,
                &mut dynamic_beams,
                config.search_beam,
                config.min_active,
                config.max_active,
                ctx,
            )
        };
        debug!(
            t,
            active = next.states.values.len(),
            dynamic_beam = ?dynamic_beams,
            cutoff = ?cutoffs,
            "propagated frame"
        );
        frames.push(next);
    }

    info!("starting backward pass");
    let terminal = t_count;
    backward::init_terminal(&mut frames[terminal], a_fsas);
    for t in (0..t_count).rev() {
        let (head, tail) = frames.split_at_mut(t + 1);
        backward::propagate_backward(&mut head[t], &tail[0], a_fsas);
    }

    let tot_scores: Vec<f32> = (0..num_seqs)
        .map(|seq| {
            let splits = frames[0].states.shape.row_splits(1);
            let start = splits[seq] as usize;
            let end = splits[seq + 1] as usize;
            if start == end {
                f32::NEG_INFINITY
            } else {
                frames[0].states.values[start].backward_loglike
            }
        })
        .collect();

    let keep_masks: Vec<Vec<bool>> = (0..t_count)
        .map(|t| backward::compute_keep_mask(&frames[t], &frames[t + 1], &tot_scores, config.output_beam))
        .collect();

    info!("materializing output lattice");
    let (out_fsa, arc_map_a, arc_map_b) = output::format_output(&frames, &keep_masks, a_fsas, b_fsas);
    debug!(out_arcs = out_fsa.arcs.values.len(), "done");
    Ok((out_fsa, arc_map_a, arc_map_b))
}
