//! Batched per-coefficient contraction over input channels.

use tracing::debug_span;

use crate::blocked::interleave::block_offset;
use crate::config::ConvOptions;
use crate::error::Result;
use crate::kernels::Microkernel;
use crate::tensor::{COEFFS, F16x8, LANES, TileGrid};
use crate::threaded::parallel_for::for_each_chunk;
use crate::transform::TransformedFilter;

/// For every coefficient: `out[tile, oc] = Σ_ic filter[oc, ic] · in[tile, ic]`.
///
/// `packed` comes from [`interleave_tiles`](super::interleave_tiles). The
/// result is `[out_group][coefficient][tile]`, the layout the output
/// transform reads. Every (output group, coefficient) pair is an
/// independent unit writing its own `tiles`-long run.
pub fn contract(
    packed: &[F16x8],
    filter: &TransformedFilter,
    grid: &TileGrid,
    microkernel: Microkernel,
    options: &ConvOptions,
) -> Result<Vec<F16x8>> {
    let tiles = grid.tiles();
    let in_groups = filter.in_groups();
    let out_groups = filter.out_groups();
    debug_assert_eq!(packed.len(), in_groups * COEFFS * tiles);

    let _span = debug_span!(
        "contraction",
        in_groups,
        out_groups,
        tiles,
        kernel = microkernel.name()
    )
    .entered();

    let mut out = options.allocator().allocate(out_groups * COEFFS * tiles)?;
    let work = out.len() * filter.in_channels() * LANES;
    let threads = options.threads_for(out_groups * COEFFS, work);

    for_each_chunk(&mut out, tiles, threads, |index, dst| {
        let (group, coeff) = (index / COEFFS, index % COEFFS);
        let kernel = filter.coefficient(group, coeff);
        let region = &packed[coeff * tiles * in_groups..(coeff + 1) * tiles * in_groups];

        for block in grid.blocks() {
            let input = &region[block_offset(block.start, in_groups)..][..in_groups * block.width];
            microkernel.contract_block(kernel, input, &mut dst[block.start..block.start + block.width]);
        }
    });

    Ok(out)
}
