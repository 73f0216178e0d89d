//! 8-wide half-precision lane vector.

use std::ops::{Add, Sub};

use half::f16;
use half::slice::HalfFloatSliceExt;

/// Channels per lane group.
pub const LANES: usize = 8;

/// Eight half-precision channel values processed together.
///
/// Arithmetic widens to f32, computes, and rounds back to half once per
/// operation. A product of two half values is exact in f32, so `a + b * s`
/// evaluated in f32 is the fused result and the only rounding that matters
/// is the final one to half. This keeps the portable path bit-identical to
/// the F16C microkernel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(transparent)]
pub struct F16x8(pub [f16; LANES]);

impl F16x8 {
    pub const ZERO: Self = Self([f16::ZERO; LANES]);

    #[inline]
    pub const fn splat(value: f16) -> Self {
        Self([value; LANES])
    }

    #[inline]
    pub fn from_f32(values: [f32; LANES]) -> Self {
        let mut lanes = [f16::ZERO; LANES];
        lanes.convert_from_f32_slice(&values);
        Self(lanes)
    }

    #[inline]
    pub fn to_f32(self) -> [f32; LANES] {
        let mut out = [0.0f32; LANES];
        self.0.convert_to_f32_slice(&mut out);
        out
    }

    #[inline]
    pub fn lane(self, index: usize) -> f16 {
        self.0[index]
    }

    #[inline]
    fn zip_with(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        let a = self.to_f32();
        let b = other.to_f32();
        let mut out = [0.0f32; LANES];
        for i in 0..LANES {
            out[i] = f(a[i], b[i]);
        }
        Self::from_f32(out)
    }

    /// `self * s`
    #[inline]
    pub fn mul_scalar(self, s: f32) -> Self {
        let a = self.to_f32();
        Self::from_f32(a.map(|x| x * s))
    }

    /// `self + b * s`, rounded once. `s` must be representable in half.
    #[inline]
    pub fn fma_scalar(self, b: Self, s: f32) -> Self {
        self.zip_with(b, |a, b| a + b * s)
    }

    /// `self - b * s`, rounded once. `s` must be representable in half.
    #[inline]
    pub fn fms_scalar(self, b: Self, s: f32) -> Self {
        self.zip_with(b, |a, b| a - b * s)
    }

    /// `self + k * v[lane]`: one broadcast-lane multiply-accumulate step.
    #[inline]
    pub fn fma_lane(self, k: Self, v: Self, lane: usize) -> Self {
        let s = v.0[lane].to_f32();
        self.zip_with(k, |acc, k| acc + k * s)
    }
}

impl Add for F16x8 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for F16x8 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a - b)
    }
}
