//! Filter transform: raw 3×3 taps -> channel-packed 64-coefficient blocks.

use tracing::debug_span;

use crate::config::ConvOptions;
use crate::error::{Error, Result, check_pack};
use crate::tensor::{COEFFS, F16x8, LANES, TILE_IN};
use crate::threaded::parallel_for::for_each_chunk;

/// The 8×3 filter transform matrix `G` of F(6,3).
const G: [[f32; 3]; 8] = [
    [1.0, 0.0, 0.0],
    [-2.0 / 9.0, -2.0 / 9.0, -2.0 / 9.0],
    [-2.0 / 9.0, 2.0 / 9.0, -2.0 / 9.0],
    [1.0 / 90.0, 1.0 / 45.0, 2.0 / 45.0],
    [1.0 / 90.0, -1.0 / 45.0, 2.0 / 45.0],
    [1.0 / 45.0, 1.0 / 90.0, 1.0 / 180.0],
    [1.0 / 45.0, -1.0 / 90.0, 1.0 / 180.0],
    [0.0, 0.0, 1.0],
];

/// Filter weights in the Winograd domain, ready for the contraction.
///
/// Layout is `[out_group][coefficient][in_channel]`, each entry an
/// [`F16x8`] holding the 8 output channels of the group. For a fixed
/// coefficient and output group the input channels are contiguous, so the
/// contraction streams one slice per coefficient.
///
/// Immutable once built; share it by reference (or `Arc`) across calls.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformedFilter {
    in_channels: usize,
    out_channels: usize,
    data: Vec<F16x8>,
}

impl TransformedFilter {
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn in_groups(&self) -> usize {
        self.in_channels / LANES
    }

    pub fn out_groups(&self) -> usize {
        self.out_channels / LANES
    }

    /// Per-input-channel output-lane vectors for one coefficient of one
    /// output group; `in_channels` entries long.
    pub fn coefficient(&self, out_group: usize, coeff: usize) -> &[F16x8] {
        let start = (out_group * COEFFS + coeff) * self.in_channels;
        &self.data[start..start + self.in_channels]
    }
}

/// `G · k · Gᵀ` for one 3×3 tap, single precision.
///
/// Coefficient `u * 8 + v` holds horizontal frequency `u` and vertical
/// frequency `v`; the input and output transforms use the same order.
pub fn transform_tap(k: &[f32]) -> [f32; COEFFS] {
    debug_assert_eq!(k.len(), 9);

    // tmp[u][r]: row r of the tap, transformed horizontally
    let mut tmp = [[0.0f32; 3]; TILE_IN];
    for (u, g) in G.iter().enumerate() {
        for r in 0..3 {
            tmp[u][r] = k[r * 3] * g[0] + k[r * 3 + 1] * g[1] + k[r * 3 + 2] * g[2];
        }
    }

    let mut out = [0.0f32; COEFFS];
    for u in 0..TILE_IN {
        let t = &tmp[u];
        for (v, g) in G.iter().enumerate() {
            out[u * TILE_IN + v] = t[0] * g[0] + t[1] * g[1] + t[2] * g[2];
        }
    }
    out
}

/// Transforms raw `[out][in][3][3]` single-precision taps.
///
/// Both channel counts must be multiples of 8. Runs once per model load;
/// the result is rounded to half precision here, so the contraction never
/// sees single precision.
pub fn transform_filter(
    raw: &[f32],
    in_channels: usize,
    out_channels: usize,
    options: &ConvOptions,
) -> Result<TransformedFilter> {
    check_pack("filter input", in_channels)?;
    check_pack("filter output", out_channels)?;
    let expected = out_channels * in_channels * 9;
    if raw.len() != expected {
        return Err(Error::FilterLength {
            expected,
            actual: raw.len(),
        });
    }

    let _span = debug_span!("filter_transform", in_channels, out_channels).entered();

    options.install(|| {
        let per_out = in_channels * COEFFS;

        // [out][in][coefficient], single precision
        let mut spectral = vec![0.0f32; out_channels * per_out];
        let threads = options.threads_for(out_channels, spectral.len() * 3);
        for_each_chunk(&mut spectral, per_out, threads, |oc, dst| {
            for ic in 0..in_channels {
                let tap = &raw[(oc * in_channels + ic) * 9..][..9];
                dst[ic * COEFFS..(ic + 1) * COEFFS].copy_from_slice(&transform_tap(tap));
            }
        });

        let out_groups = out_channels / LANES;
        let mut data = vec![F16x8::ZERO; out_groups * COEFFS * in_channels];
        let threads = options.threads_for(out_groups, data.len() * LANES);
        for_each_chunk(&mut data, COEFFS * in_channels, threads, |og, dst| {
            for coeff in 0..COEFFS {
                for ic in 0..in_channels {
                    let mut lanes = [0.0f32; LANES];
                    for (l, x) in lanes.iter_mut().enumerate() {
                        *x = spectral[(og * LANES + l) * per_out + ic * COEFFS + coeff];
                    }
                    dst[coeff * in_channels + ic] = F16x8::from_f32(lanes);
                }
            }
        });

        Ok(TransformedFilter {
            in_channels,
            out_channels,
            data,
        })
    })
}
