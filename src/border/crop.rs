//! Crop adapter: padded output -> requested output extent.

use tracing::debug_span;

use crate::border::copy_top_left;
use crate::config::ConvOptions;
use crate::error::Result;
use crate::scratch::{HeapAllocator, ScratchAllocator};
use crate::tensor::FeatureMap;

/// Trims `bordered` to its top-left `width × height` region.
///
/// Passes the map through untouched when it already has that size.
/// Otherwise the result is a fresh caller-owned map and the bordered
/// buffer goes back to the scratch allocator.
pub fn crop_output(
    bordered: FeatureMap,
    width: usize,
    height: usize,
    options: &ConvOptions,
) -> Result<FeatureMap> {
    if bordered.width() == width && bordered.height() == height {
        return Ok(bordered);
    }

    let _span = debug_span!(
        "crop",
        from_w = bordered.width(),
        from_h = bordered.height(),
        to_w = width,
        to_h = height
    )
    .entered();

    let groups = bordered.groups();
    let mut lanes = HeapAllocator.allocate(groups * width * height)?;
    let threads = options.threads_for(groups, lanes.len());
    copy_top_left(&bordered, &mut lanes, width, height, threads);
    options.allocator().release(bordered.into_lanes());

    Ok(FeatureMap::from_lanes(width, height, groups, lanes))
}
