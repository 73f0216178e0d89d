//! Direct spatial-domain convolution used as the correctness baseline.

/// Direct 3×3 stride-1 convolution in single precision.
///
/// Loop order puts the output column innermost so both the input row and
/// the output row are walked sequentially; taps outside the input read as
/// zero, the same border the Winograd path's padding produces.
///
/// This is the scalar baseline the Winograd path is compared against.
///
/// # Arguments
///
/// * `input` - planar `in_channels × in_height × in_width`
/// * `weights` - `[out][in][3][3]`, the layout `transform_filter` takes
/// * `bias` - one value per output channel, or `None` for zero
///
/// Returns planar `out_channels × out_height × out_width`.
///
/// # Panics
///
/// Panics if `input`, `weights` or `bias` have the wrong length.
#[allow(clippy::too_many_arguments)]
pub fn conv3x3_direct(
    input: &[f32],
    in_width: usize,
    in_height: usize,
    in_channels: usize,
    weights: &[f32],
    bias: Option<&[f32]>,
    out_channels: usize,
    out_width: usize,
    out_height: usize,
) -> Vec<f32> {
    assert_eq!(input.len(), in_channels * in_height * in_width, "input size");
    assert_eq!(weights.len(), out_channels * in_channels * 9, "weights size");
    if let Some(bias) = bias {
        assert_eq!(bias.len(), out_channels, "bias size");
    }

    let out_plane = out_width * out_height;
    let mut out = vec![0.0f32; out_channels * out_plane];

    for (oc, dst) in out.chunks_exact_mut(out_plane.max(1)).enumerate() {
        dst.fill(bias.map_or(0.0, |b| b[oc]));

        for ic in 0..in_channels {
            let src = &input[ic * in_height * in_width..(ic + 1) * in_height * in_width];
            let tap = &weights[(oc * in_channels + ic) * 9..][..9];

            for ky in 0..3 {
                for kx in 0..3 {
                    let w = tap[ky * 3 + kx];
                    for y in 0..out_height {
                        let sy = y + ky;
                        if sy >= in_height {
                            break;
                        }
                        let row = &src[sy * in_width..(sy + 1) * in_width];
                        let cols = out_width.min(in_width.saturating_sub(kx));
                        for x in 0..cols {
                            dst[y * out_width + x] += w * row[x + kx];
                        }
                    }
                }
            }
        }
    }

    out
}

/// Largest `|winograd - direct|` expected per unit of output scale.
///
/// Multiply by `max(1, max|direct|)` to get an absolute bound. Half-precision
/// accumulation over the input channels makes the error grow with
/// `sqrt(in_channels)` past 32 channels. Measured for 8 to 512 input
/// channels, inputs in [-2, 2], weights uniform in `±1/sqrt(9·in_channels)`
/// and outputs up to 32×32.
pub fn tolerance(in_channels: usize) -> f32 {
    0.1 * (in_channels as f32 / 32.0).sqrt().max(1.0)
}
