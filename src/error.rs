//! Crate-level error type.

use std::collections::TryReserveError;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong before or while running a convolution.
///
/// Shape problems are caught once at the entry points; the stages
/// themselves assume conforming shapes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{what} channel count {channels} is not a multiple of 8")]
    ChannelPack { what: &'static str, channels: usize },

    #[error("raw filter has {actual} taps, expected {expected}")]
    FilterLength { expected: usize, actual: usize },

    #[error("filter expects {filter} input channels but the feature map has {input}")]
    FilterMismatch { filter: usize, input: usize },

    #[error("bias has {actual} values, expected {expected}")]
    BiasLength { expected: usize, actual: usize },

    #[error("feature map data has {actual} values, expected {expected}")]
    DataLength { expected: usize, actual: usize },

    #[error("requested output {width}x{height} is empty")]
    EmptyOutput { width: usize, height: usize },

    #[error("scratch allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Fails with [`Error::ChannelPack`] unless `channels` fills whole 8-lane packs.
pub(crate) fn check_pack(what: &'static str, channels: usize) -> Result<()> {
    if channels % crate::tensor::PACK != 0 {
        return Err(Error::ChannelPack { what, channels });
    }
    Ok(())
}
