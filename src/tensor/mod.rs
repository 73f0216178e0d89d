//! Data containers: the 8-lane half vector, the packed feature map, and the
//! tile geometry every stage agrees on.

pub mod feature_map;
pub mod lanes;
pub mod tiles;

pub use feature_map::{Channel, ChannelMut, FeatureMap};
pub use lanes::{F16x8, LANES};
pub use tiles::{COEFFS, TILE_IN, TILE_OUT, TileBlock, TileGrid};

/// Channel pack width.
pub const PACK: usize = LANES;
