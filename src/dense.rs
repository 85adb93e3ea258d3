//! Dense per-frame emission matrices (`b_fsas`).
//!
//! A row-major `[total_frames, columns]` matrix plus a `[seq]` row-splits
//! array into it — a plain contiguous host buffer rather than a
//! tensor-backend type, since this crate carries no tensor dependency.

/// A batch of dense emission sequences.
///
/// `scores` is row-major `[total_frames, columns]`; column 0 is the `-1`
/// (final) symbol, column `k >= 1` is label `k - 1`. `seq_frame_splits` is a
/// `[seq]`-length exclusive-prefix-sum row-splits array into the rows of
/// `scores` (i.e. `[seq].len() == dim0 + 1`).
#[derive(Debug, Clone)]
pub struct DenseFsaVec {
    seq_frame_splits: Vec<u32>,
    pub scores: Vec<f32>,
    pub columns: usize,
}

impl DenseFsaVec {
    /// Build from per-sequence frame counts and a contiguous row-major
    /// `[total_frames, columns]` score matrix.
    pub fn new(frames_per_seq: &[u32], columns: usize, scores: Vec<f32>) -> Self {
        let seq_frame_splits = crate::ragged::exclusive_sum(frames_per_seq);
        debug_assert_eq!(
            scores.len(),
            *seq_frame_splits.last().unwrap() as usize * columns
        );
        Self {
            seq_frame_splits,
            scores,
            columns,
        }
    }

    pub fn dim0(&self) -> usize {
        self.seq_frame_splits.len() - 1
    }

    pub fn num_frames(&self, seq: usize) -> u32 {
        self.seq_frame_splits[seq + 1] - self.seq_frame_splits[seq]
    }

    /// Flat row offset (in rows, not elements) of `[seq, frame]`.
    pub fn row_offset(&self, seq: usize, frame: u32) -> usize {
        self.seq_frame_splits[seq] as usize + frame as usize
    }

    /// `emission[seq, t, column]`.
    pub fn score(&self, seq: usize, frame: u32, column: usize) -> f32 {
        self.scores[self.row_offset(seq, frame) * self.columns + column]
    }

    /// Whether sequences are ordered by non-increasing frame count, the
    /// precondition enforced by [`crate::intersect_dense_pruned`].
    pub fn is_sorted_non_increasing(&self) -> Result<(), (usize, u32, usize, u32)> {
        for seq in 1..self.dim0() {
            let prev = self.num_frames(seq - 1);
            let cur = self.num_frames(seq);
            if cur > prev {
                return Err((seq - 1, prev, seq, cur));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_offset_and_score() {
        // 2 sequences: 3 frames, 2 frames. 2 columns.
        let scores = vec![
            0.0, -1.0, // seq0 t0
            0.1, -1.1, // seq0 t1
            0.2, -1.2, // seq0 t2
            1.0, -2.0, // seq1 t0
            1.1, -2.1, // seq1 t1
        ];
        let b = DenseFsaVec::new(&[3, 2], 2, scores);
        assert_eq!(b.row_offset(1, 1), 4);
        assert_eq!(b.score(1, 1, 0), 1.1);
        assert_eq!(b.num_frames(0), 3);
        assert_eq!(b.num_frames(1), 2);
    }

    #[test]
    fn sortedness_check() {
        let b = DenseFsaVec::new(&[2, 3], 1, vec![0.0; 5]);
        assert_eq!(b.is_sorted_non_increasing(), Err((0, 2, 1, 3)));
        let ok = DenseFsaVec::new(&[3, 2], 1, vec![0.0; 5]);
        assert!(ok.is_sorted_non_increasing().is_ok());
    }
}
