//! Portable N-tile contraction microkernel.

use crate::tensor::{F16x8, LANES};

/// Contracts one tile block over all input channels for one coefficient.
///
/// `kernel` holds one [`F16x8`] of output-lane weights per input channel;
/// `packed` is the block's interleaved input, `[in_group][tile]`. Writes `N`
/// accumulators to `out`, one per tile.
///
/// Input channels are visited in order, each step rounded to half.
///
/// # Arguments
///
/// * `kernel` - `in_groups * 8` weight vectors
/// * `packed` - `in_groups * N` input vectors
/// * `out` - `N` output vectors
pub fn contract_tiles<const N: usize>(kernel: &[F16x8], packed: &[F16x8], out: &mut [F16x8]) {
    debug_assert_eq!(packed.len() % N, 0);
    debug_assert_eq!(kernel.len(), packed.len() / N * LANES);

    let mut acc = [F16x8::ZERO; N];

    for (k, v) in kernel.chunks_exact(LANES).zip(packed.chunks_exact(N)) {
        for t in 0..N {
            for l in 0..LANES {
                acc[t] = acc[t].fma_lane(k[l], v[t], l);
            }
        }
    }

    out[..N].copy_from_slice(&acc);
}
