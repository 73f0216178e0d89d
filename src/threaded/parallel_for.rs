//! Data-parallel loop over disjoint chunks of a buffer.

use rayon::prelude::*;

/// Calls `f(index, chunk)` for every `chunk_len`-sized chunk of `data`,
/// spread over at most `threads` workers.
///
/// Chunks are handed out in contiguous runs, one run per worker, so each
/// worker writes a disjoint region and nothing is shared mutably. With
/// `threads == 1` the loop runs inline on the calling thread. Otherwise it
/// runs on the current rayon pool (the one installed by
/// [`ConvOptions`](crate::ConvOptions)).
pub fn for_each_chunk<T, F>(data: &mut [T], chunk_len: usize, threads: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    if chunk_len == 0 || data.is_empty() {
        return;
    }
    debug_assert_eq!(data.len() % chunk_len, 0);

    let chunks = data.len() / chunk_len;
    let threads = threads.clamp(1, chunks);

    if threads == 1 {
        for (index, chunk) in data.chunks_mut(chunk_len).enumerate() {
            f(index, chunk);
        }
        return;
    }

    let per_worker = chunks.div_ceil(threads);
    data.par_chunks_mut(per_worker * chunk_len)
        .enumerate()
        .for_each(|(worker, run)| {
            for (j, chunk) in run.chunks_mut(chunk_len).enumerate() {
                f(worker * per_worker + j, chunk);
            }
        });
}

/// Picks how many workers a stage should use.
///
/// Small stages pay more in hand-off than they gain, so they scale down;
/// a stage never gets more workers than it has independent units.
///
/// * `units` - independent work units (channel groups or coefficients)
/// * `work` - rough multiply-accumulate count for the whole stage
pub fn choose_thread_count(units: usize, work: usize, max_threads: usize) -> usize {
    const SINGLE_THREAD_THRESHOLD: usize = 1_000_000;
    const TWO_THREAD_THRESHOLD: usize = 4_000_000;

    let optimal_threads = if work < SINGLE_THREAD_THRESHOLD {
        1
    } else if work < TWO_THREAD_THRESHOLD {
        2
    } else {
        max_threads
    };

    optimal_threads.min(units).min(max_threads).max(1)
}
