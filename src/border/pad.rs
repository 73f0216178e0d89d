//! Padding adapter: input map -> `(6·tiles_x + 2) × (6·tiles_y + 2)`.

use std::borrow::Cow;

use tracing::debug_span;

use crate::border::copy_top_left;
use crate::config::ConvOptions;
use crate::error::Result;
use crate::tensor::{FeatureMap, TileGrid};

/// Extends `input` to the extent the input transform reads for `grid`.
///
/// Content stays at the origin; new columns and rows on the right and
/// bottom are zero. Content beyond the padded extent cannot reach any
/// requested output and is dropped. Returns the input itself when it
/// already has the padded size.
pub fn pad_input<'a>(
    input: &'a FeatureMap,
    grid: &TileGrid,
    options: &ConvOptions,
) -> Result<Cow<'a, FeatureMap>> {
    let width = grid.padded_input_width();
    let height = grid.padded_input_height();
    if input.width() == width && input.height() == height {
        return Ok(Cow::Borrowed(input));
    }

    let _span = debug_span!(
        "pad",
        from_w = input.width(),
        from_h = input.height(),
        to_w = width,
        to_h = height
    )
    .entered();

    let groups = input.groups();
    let mut lanes = options.allocator().allocate(groups * width * height)?;
    let threads = options.threads_for(groups, lanes.len());
    copy_top_left(input, &mut lanes, width, height, threads);

    Ok(Cow::Owned(FeatureMap::from_lanes(width, height, groups, lanes)))
}

/// Hands a padded copy's buffer back to the scratch allocator.
pub(crate) fn release_padded(padded: Cow<'_, FeatureMap>, options: &ConvOptions) {
    if let Cow::Owned(map) = padded {
        options.allocator().release(map.into_lanes());
    }
}
