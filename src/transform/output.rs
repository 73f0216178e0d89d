//! Output transform: `[out_group][coefficient][tile]` lanes -> padded map.

use tracing::debug_span;

use crate::config::ConvOptions;
use crate::tensor::{ChannelMut, COEFFS, F16x8, FeatureMap, TILE_IN, TILE_OUT, TileGrid};
use crate::threaded::parallel_for::for_each_chunk;

/// One 8 -> 6 point pass of `Aᵀ`.
#[inline]
pub(crate) fn output_1d(b: &[F16x8; TILE_IN]) -> [F16x8; TILE_OUT] {
    let e0 = b[1] + b[2];
    let o0 = b[1] - b[2];
    let e1 = b[3] + b[4];
    let o1 = b[3] - b[4];
    let e2 = b[5] + b[6];
    let o2 = b[5] - b[6];

    [
        (b[0] + e0) + e1.fma_scalar(e2, 32.0),
        o0.fma_scalar(o1, 2.0).fma_scalar(o2, 16.0),
        e0.fma_scalar(e1, 4.0).fma_scalar(e2, 8.0),
        o0.fma_scalar(o1, 8.0).fma_scalar(o2, 4.0),
        e0.fma_scalar(e1, 16.0).fma_scalar(e2, 2.0),
        (b[7] + o0) + o2.fma_scalar(o1, 32.0),
    ]
}

/// Inverse-transforms every tile and adds the bias.
///
/// `transformed` is `[out_group][coefficient][tile]`; `dst` is a zeroed
/// buffer of `out_groups` planes at the grid's padded output size, filled
/// and returned as a map. A missing bias adds zero.
pub fn transform_output(
    transformed: &[F16x8],
    grid: &TileGrid,
    out_groups: usize,
    bias: Option<&[F16x8]>,
    mut dst: Vec<F16x8>,
    options: &ConvOptions,
) -> FeatureMap {
    let tiles = grid.tiles();
    let width = grid.padded_output_width();
    let height = grid.padded_output_height();
    debug_assert_eq!(transformed.len(), out_groups * COEFFS * tiles);
    debug_assert_eq!(dst.len(), out_groups * width * height);

    let _span = debug_span!("output_transform", out_groups, tiles).entered();
    let threads = options.threads_for(out_groups, transformed.len() * 24);

    for_each_chunk(&mut dst, width * height, threads, |group, plane| {
        let src = &transformed[group * COEFFS * tiles..(group + 1) * COEFFS * tiles];
        let bias = bias.map_or(F16x8::ZERO, |b| b[group]);
        let mut plane = ChannelMut::new(width, plane);
        // tmp[y][u]: spatial row y after the vertical pass, frequency u
        let mut tmp = [[F16x8::ZERO; TILE_IN]; TILE_OUT];

        for tile in 0..tiles {
            let (y0, x0) = grid.origin(tile);

            for u in 0..TILE_IN {
                let column = std::array::from_fn(|v| src[(u * TILE_IN + v) * tiles + tile]);
                for (y, value) in output_1d(&column).into_iter().enumerate() {
                    tmp[y][u] = value;
                }
            }

            for (y, row) in tmp.iter().enumerate() {
                let out = &mut plane.row_mut(y0 + y)[x0..x0 + TILE_OUT];
                for (o, value) in out.iter_mut().zip(output_1d(row)) {
                    *o = bias + value;
                }
            }
        }
    });

    FeatureMap::from_lanes(width, height, out_groups, dst)
}
