//! Execution context for the massively-parallel, SPMD-style kernels the
//! intersection pipeline is built from.
//!
//! Every per-arc or per-state operation in this crate is written as a call
//! to [`run`] with an index range and a closure, dispatched over
//! `rayon::par_iter()` under [`Context::Parallel`] and a plain loop under
//! [`Context::Serial`].
//!
//! No kernel body may assume a particular iteration order between indices,
//! even under [`Context::Serial`] — the one exception is the frame loop
//! itself, which is sequential across frames by construction.

use rayon::prelude::*;

/// Where a kernel launch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Context {
    /// Plain sequential loop. Still must not be relied upon for ordering.
    #[default]
    Serial,
    /// `rayon`-parallel loop across available threads.
    Parallel,
}

/// Apply `f(i)` for every `0 <= i < n`, with no ordering guarantee between
/// invocations. `f` must be safe to call from multiple threads concurrently
/// when `ctx` is [`Context::Parallel`].
pub fn run<F>(ctx: Context, n: usize, f: F)
where
    F: Fn(usize) + Sync + Send,
{
    match ctx {
        Context::Serial => (0..n).for_each(f),
        Context::Parallel => (0..n).into_par_iter().for_each(f),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn run_serial_visits_all_indices() {
        let hits = AtomicUsize::new(0);
        run(Context::Serial, 10, |_| {
            hits.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(hits.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn run_parallel_visits_all_indices() {
        let hits = AtomicUsize::new(0);
        run(Context::Parallel, 1000, |_| {
            hits.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(hits.load(Ordering::Relaxed), 1000);
    }
}
