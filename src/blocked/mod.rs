//! Blocked batched contraction.
//!
//! The transformed input is repacked so that, for one coefficient, up to
//! 8 tiles of one input-channel group sit side by side; the contraction
//! then streams each tile block through a microkernel while the block's
//! filter weights stay hot.
//!
//! - `interleave`: tile-axis repack into 8/4/2/1 blocks
//! - `contraction`: per-coefficient GEMM driver over the blocks

pub mod contraction;
pub mod interleave;

pub use contraction::contract;
pub use interleave::interleave_tiles;
