use criterion::{black_box, criterion_group, criterion_main, Criterion};

use densefsa_intersect::{intersect_dense_pruned, Arc, Context, DecodeConfig, DenseFsaVec, FsaVec};

fn self_loop_then_final_acceptor() -> FsaVec {
    FsaVec::from_counts(
        &[2],
        &[2, 0],
        vec![
            Arc { src_state: 0, dest_state: 0, label: 0, score: 0.0 },
            Arc { src_state: 0, dest_state: 1, label: -1, score: 0.0 },
        ],
    )
}

/// A batch of `num_seqs` independent sequences of `frames` each, all
/// sharing the same one-state acceptor, open on label 0 for every frame
/// but the last (where only the final symbol is open).
fn emission_batch(num_seqs: usize, frames: u32) -> DenseFsaVec {
    let frames_per_seq = vec![frames; num_seqs];
    let mut scores = Vec::with_capacity(num_seqs * frames as usize * 2);
    for _ in 0..num_seqs {
        for t in 0..frames {
            if t + 1 == frames {
                scores.push(0.0);
                scores.push(f32::NEG_INFINITY);
            } else {
                scores.push(f32::NEG_INFINITY);
                scores.push(0.0);
            }
        }
    }
    DenseFsaVec::new(&frames_per_seq, 2, scores)
}

fn bench_intersect(c: &mut Criterion) {
    let fsa = self_loop_then_final_acceptor();
    let config = DecodeConfig::default();

    let mut group = c.benchmark_group("intersect_dense_pruned");
    for &(num_seqs, frames) in &[(1usize, 16u32), (8, 16), (8, 64)] {
        let b_fsas = emission_batch(num_seqs, frames);
        group.bench_function(format!("seqs={num_seqs},frames={frames},serial"), |bencher| {
            bencher.iter(|| {
                black_box(intersect_dense_pruned(&fsa, &b_fsas, &config, Context::Serial).unwrap())
            })
        });
        group.bench_function(format!("seqs={num_seqs},frames={frames},parallel"), |bencher| {
            bencher.iter(|| {
                black_box(intersect_dense_pruned(&fsa, &b_fsas, &config, Context::Parallel).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_intersect);
criterion_main!(benches);
