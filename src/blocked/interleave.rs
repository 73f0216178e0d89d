//! Tile-axis repack of the transformed input into 8/4/2/1 blocks.

use tracing::debug_span;

use crate::config::ConvOptions;
use crate::error::Result;
use crate::tensor::{COEFFS, F16x8, TileGrid};
use crate::threaded::parallel_for::for_each_chunk;

/// Offset of a block's data inside one coefficient's region.
///
/// A block starting at tile `start` occupies `in_groups * width` lanes
/// beginning at `start * in_groups`, so blocks tile the region without gaps.
#[inline]
pub fn block_offset(start: usize, in_groups: usize) -> usize {
    start * in_groups
}

/// Repacks `[in_group][coefficient][tile]` into per-coefficient blocks.
///
/// Result layout: coefficient `r` owns `tiles * in_groups` lanes starting at
/// `r * tiles * in_groups`; inside it each tile block is `[in_group][tile]`,
/// so a microkernel reads one block as a single contiguous run.
pub fn interleave_tiles(
    transformed: &[F16x8],
    grid: &TileGrid,
    in_groups: usize,
    options: &ConvOptions,
) -> Result<Vec<F16x8>> {
    let tiles = grid.tiles();
    debug_assert_eq!(transformed.len(), in_groups * COEFFS * tiles);
    let _span = debug_span!("interleave", in_groups, tiles).entered();

    let mut packed = options.allocator().allocate(transformed.len())?;
    let threads = options.threads_for(COEFFS, packed.len());

    for_each_chunk(&mut packed, tiles * in_groups, threads, |coeff, dst| {
        for block in grid.blocks() {
            let out = &mut dst[block_offset(block.start, in_groups)..][..in_groups * block.width];
            for (q, run) in out.chunks_exact_mut(block.width).enumerate() {
                let src = (q * COEFFS + coeff) * tiles + block.start;
                run.copy_from_slice(&transformed[src..src + block.width]);
            }
        }
    });

    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lane 0 carries the source index, so every value is traceable.
    fn indexed(len: usize) -> Vec<F16x8> {
        (0..len)
            .map(|i| {
                let mut v = [0.0f32; 8];
                v[0] = i as f32;
                F16x8::from_f32(v)
            })
            .collect()
    }

    #[test]
    fn test_blocks_are_group_major() {
        // 7 tiles -> blocks of 4, 2, 1
        let grid = TileGrid::for_output(42, 6);
        assert_eq!(grid.tiles(), 7);
        let in_groups = 2;
        let tm = indexed(in_groups * COEFFS * 7);

        let packed = interleave_tiles(&tm, &grid, in_groups, &ConvOptions::single_threaded()).unwrap();
        assert_eq!(packed.len(), tm.len());

        let coeff = 5;
        let region = &packed[coeff * 7 * in_groups..(coeff + 1) * 7 * in_groups];
        for block in grid.blocks() {
            let base = block_offset(block.start, in_groups);
            for q in 0..in_groups {
                for t in 0..block.width {
                    let src = (q * COEFFS + coeff) * 7 + block.start + t;
                    assert_eq!(region[base + q * block.width + t], tm[src]);
                }
            }
        }
    }

    #[test]
    fn test_is_a_permutation() {
        let grid = TileGrid::for_output(30, 18);
        let tm = indexed(COEFFS * grid.tiles());
        let mut seen: Vec<u32> = interleave_tiles(&tm, &grid, 1, &ConvOptions::single_threaded())
            .unwrap()
            .iter()
            .map(|v| v.lane(0).to_f32() as u32)
            .collect();
        seen.sort_unstable();
        assert!(seen.iter().enumerate().all(|(i, &x)| x as usize == i));
    }
}
