//! Winograd F(6,3) convolution over 8-channel-packed half-precision maps.
//!
//! 3×3 stride-1 convolution is the workhorse of most inference graphs.
//! F(6,3) turns every 8×8 input tile and every 3×3 filter tap into 64
//! Winograd-domain coefficients, so a 6×6 block of outputs costs 64
//! multiplies per channel pair instead of 324. The price is a transform
//! on each side and half-precision rounding along the way.
//!
//! ## Usage
//!
//! ```
//! use winograd63::{ConvOptions, FeatureMap, OutputShape, convolve, transform_filter};
//!
//! let options = ConvOptions::single_threaded();
//!
//! // once per model load: 8 in, 8 out channels, [out][in][3][3]
//! let weights = vec![0.01f32; 8 * 8 * 9];
//! let filter = transform_filter(&weights, 8, 8, &options)?;
//!
//! // per inference
//! let input = FeatureMap::from_planar_f32(&vec![1.0; 8 * 10 * 10], 10, 10, 8)?;
//! let output = convolve(&input, &filter, None, OutputShape::new(8, 8), &options)?;
//! assert_eq!((output.width(), output.height(), output.channels()), (8, 8, 8));
//! # Ok::<(), winograd63::Error>(())
//! ```
//!
//! For repeated inference, build the options once from a [`ConvConfig`]
//! and give them a [`RecyclingAllocator`] so scratch buffers are reused:
//!
//! ```
//! use std::sync::Arc;
//! use winograd63::{ConvConfig, ConvOptions, RecyclingAllocator};
//!
//! let options = ConvOptions::from_config(&ConvConfig::default())?
//!     .with_allocator(Arc::new(RecyclingAllocator::default()));
//! # Ok::<(), winograd63::Error>(())
//! ```
//!
//! ## What's inside
//!
//! - Filter, input and output transforms with factored closed forms
//! - Tile-blocked per-coefficient contraction (8/4/2/1 tiles per block)
//! - Portable and AVX + F16C + FMA microkernels with identical results
//! - Adaptive multi-threading on a rayon pool (scales down for small maps)

pub mod border;
pub mod blocked;
pub mod config;
pub mod error;
pub mod kernels;
pub mod layer;
pub mod reference;
pub mod scratch;
pub mod tensor;
pub mod threaded;
pub mod transform;

use half::f16;
use tracing::{debug, debug_span};

pub use config::{ConvConfig, ConvOptions, MicrokernelChoice};
pub use error::{Error, Result};
pub use layer::WinogradConv;
pub use reference::{conv3x3_direct, tolerance};
pub use scratch::{HeapAllocator, RecyclingAllocator, ScratchAllocator};
pub use tensor::{F16x8, FeatureMap, LANES, TileGrid};
pub use transform::{TransformedFilter, transform_filter};

use crate::blocked::{contract, interleave_tiles};
use crate::border::crop_output;
use crate::border::pad::{pad_input, release_padded};
use crate::kernels::Microkernel;
use crate::transform::{transform_input, transform_output};

/// Requested spatial size of a convolution's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputShape {
    pub width: usize,
    pub height: usize,
}

impl OutputShape {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

/// 3×3 stride-1 convolution of `input` with a transformed filter.
///
/// Output pixel `(y, x)` reads input pixels `(y..y+3, x..x+3)`; any border
/// the caller wants must already be in `input`, and pixels past its edge
/// read as zero. The output has the filter's output channel count and
/// exactly `output.width × output.height` positions.
///
/// Runs pad, input transform, interleave, contraction, output transform
/// and crop, each fully finished before the next starts. Scratch comes
/// from the options' allocator and goes back to it after its consuming
/// stage; only the returned map is caller-owned.
///
/// # Errors
///
/// [`Error::EmptyOutput`] for a zero-sized output,
/// [`Error::FilterMismatch`] when the filter's input channels disagree with
/// the map, [`Error::BiasLength`] for a bias of the wrong length, and
/// [`Error::Allocation`] when scratch cannot be allocated.
pub fn convolve(
    input: &FeatureMap,
    filter: &TransformedFilter,
    bias: Option<&[f16]>,
    output: OutputShape,
    options: &ConvOptions,
) -> Result<FeatureMap> {
    if output.width == 0 || output.height == 0 {
        return Err(Error::EmptyOutput {
            width: output.width,
            height: output.height,
        });
    }
    if filter.in_channels() != input.channels() {
        return Err(Error::FilterMismatch {
            filter: filter.in_channels(),
            input: input.channels(),
        });
    }
    let bias = bias
        .map(|b| pack_bias(b, filter.out_channels()))
        .transpose()?;

    let grid = TileGrid::for_output(output.width, output.height);
    let microkernel = Microkernel::select(options.microkernel());
    debug!(
        kernel = microkernel.name(),
        threads = options.num_threads(),
        tiles = grid.tiles(),
        in_channels = filter.in_channels(),
        out_channels = filter.out_channels(),
        "convolve"
    );

    options.install(|| {
        let _span = debug_span!("convolve", width = output.width, height = output.height).entered();
        let allocator = options.allocator();

        let padded = pad_input(input, &grid, options)?;
        let transformed = transform_input(&padded, &grid, options)?;
        release_padded(padded, options);

        let packed = interleave_tiles(&transformed, &grid, filter.in_groups(), options)?;
        allocator.release(transformed);

        let product = contract(&packed, filter, &grid, microkernel, options)?;
        allocator.release(packed);

        // without a crop the bordered map is the result, so it must not be scratch
        let len = filter.out_groups() * grid.padded_output_width() * grid.padded_output_height();
        let exact = grid.padded_output_width() == output.width
            && grid.padded_output_height() == output.height;
        let dst = if exact {
            HeapAllocator.allocate(len)?
        } else {
            allocator.allocate(len)?
        };

        let bordered = transform_output(
            &product,
            &grid,
            filter.out_groups(),
            bias.as_deref(),
            dst,
            options,
        );
        allocator.release(product);

        crop_output(bordered, output.width, output.height, options)
    })
}

/// Groups a per-channel bias into broadcast lanes.
fn pack_bias(bias: &[f16], out_channels: usize) -> Result<Vec<F16x8>> {
    if bias.len() != out_channels {
        return Err(Error::BiasLength {
            expected: out_channels,
            actual: bias.len(),
        });
    }
    Ok(bias
        .chunks_exact(LANES)
        .map(|chunk| {
            let mut lanes = [f16::ZERO; LANES];
            lanes.copy_from_slice(chunk);
            F16x8(lanes)
        })
        .collect())
}
