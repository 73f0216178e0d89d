//! Spatial border adapters around the Winograd stages.
//!
//! The transforms need the input extended to `6n + 2` on each axis and
//! produce output rounded up to `6n`. These adapters grow and shrink maps
//! with the existing content anchored at the top-left corner.

pub mod crop;
pub mod pad;

pub use crop::crop_output;
pub use pad::pad_input;

use crate::tensor::{ChannelMut, F16x8, FeatureMap};
use crate::threaded::parallel_for::for_each_chunk;

/// Copies the overlapping top-left region of `src` into a zero-filled
/// `width × height` buffer with the same channel groups.
pub(crate) fn copy_top_left(
    src: &FeatureMap,
    dst: &mut [F16x8],
    width: usize,
    height: usize,
    threads: usize,
) {
    let rows = src.height().min(height);
    let cols = src.width().min(width);

    for_each_chunk(dst, width * height, threads, |group, plane| {
        let from = src.channel(group);
        let mut to = ChannelMut::new(width, plane);
        for y in 0..rows {
            to.row_mut(y)[..cols].copy_from_slice(&from.row(y)[..cols]);
        }
    });
}
