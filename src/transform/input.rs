//! Input transform: padded map -> `[in_group][coefficient][tile]` lanes.

use tracing::debug_span;

use crate::config::ConvOptions;
use crate::error::Result;
use crate::tensor::{COEFFS, F16x8, FeatureMap, TILE_IN, TileGrid};
use crate::threaded::parallel_for::for_each_chunk;

/// One 8-point pass of `Bᵀ`.
///
/// Factored to share partial sums; the operation order here is part of the
/// numerical contract and matches the contraction's rounding behaviour.
#[inline]
pub(crate) fn input_1d(a: &[F16x8; TILE_IN]) -> [F16x8; TILE_IN] {
    let t0 = (a[0] - a[6]).fma_scalar(a[4] - a[2], 5.25);
    let t7 = (a[7] - a[1]).fma_scalar(a[3] - a[5], 5.25);

    let p = (a[2] + a[6]).fms_scalar(a[4], 4.25);
    let q = (a[1] + a[5]).fms_scalar(a[3], 4.25);
    let t1 = p + q;
    let t2 = p - q;

    let p = a[6].fma_scalar(a[2], 0.25).fms_scalar(a[4], 1.25);
    let q = a[1].mul_scalar(0.5).fms_scalar(a[3], 2.5).fma_scalar(a[5], 2.0);
    let t3 = p + q;
    let t4 = p - q;

    // reuses the a2 - 1.25 a4 shape of the pair above
    let p = a[6].fma_scalar(a[2].fms_scalar(a[4], 1.25), 4.0);
    let q = a[1].mul_scalar(2.0).fms_scalar(a[3], 2.5).fma_scalar(a[5], 0.5);
    let t5 = p + q;
    let t6 = p - q;

    [t0, t1, t2, t3, t4, t5, t6, t7]
}

/// Transforms every 8×8 tile of `padded` into the Winograd domain.
///
/// `padded` must have the grid's padded input extent. Output layout is
/// `[in_group][coefficient][tile]`: for one group and coefficient, all tiles
/// are contiguous (stride `tiles` between coefficients).
pub fn transform_input(
    padded: &FeatureMap,
    grid: &TileGrid,
    options: &ConvOptions,
) -> Result<Vec<F16x8>> {
    debug_assert_eq!(padded.width(), grid.padded_input_width());
    debug_assert_eq!(padded.height(), grid.padded_input_height());

    let tiles = grid.tiles();
    let groups = padded.groups();
    let _span = debug_span!("input_transform", groups, tiles).entered();

    let mut out = options.allocator().allocate(groups * COEFFS * tiles)?;
    let threads = options.threads_for(groups, out.len() * 48);

    for_each_chunk(&mut out, COEFFS * tiles, threads, |group, dst| {
        let src = padded.channel(group);
        // tmp[u][y]: spatial row y after the horizontal pass, frequency u
        let mut tmp = [[F16x8::ZERO; TILE_IN]; TILE_IN];

        for tile in 0..tiles {
            let (y0, x0) = grid.origin(tile);

            for y in 0..TILE_IN {
                let row = &src.row(y0 + y)[x0..x0 + TILE_IN];
                let t = input_1d(&std::array::from_fn(|x| row[x]));
                for u in 0..TILE_IN {
                    tmp[u][y] = t[u];
                }
            }

            for (u, column) in tmp.iter().enumerate() {
                let t = input_1d(column);
                for (v, value) in t.into_iter().enumerate() {
                    dst[(u * TILE_IN + v) * tiles + tile] = value;
                }
            }
        }
    });

    Ok(out)
}
