//! Channel-packed half-precision feature map.

use half::f16;

use crate::error::{Error, Result, check_pack};
use crate::tensor::lanes::{F16x8, LANES};

/// A `width × height × channels` map with channels packed into 8-lane groups.
///
/// Storage is group-major: every lane group owns one contiguous
/// `height × width` plane of [`F16x8`] values, rows stored top to bottom.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMap {
    width: usize,
    height: usize,
    groups: usize,
    data: Vec<F16x8>,
}

impl FeatureMap {
    /// Zero-filled map. `channels` must be a multiple of 8.
    pub fn zeros(width: usize, height: usize, channels: usize) -> Result<Self> {
        check_pack("feature map", channels)?;
        let groups = channels / LANES;
        Ok(Self::from_lanes(
            width,
            height,
            groups,
            vec![F16x8::ZERO; groups * width * height],
        ))
    }

    /// Wraps an existing lane buffer of exactly `groups * height * width` values.
    pub(crate) fn from_lanes(width: usize, height: usize, groups: usize, data: Vec<F16x8>) -> Self {
        debug_assert_eq!(data.len(), groups * width * height);
        Self {
            width,
            height,
            groups,
            data,
        }
    }

    /// Packs a planar `channels × height × width` single-precision buffer.
    pub fn from_planar_f32(data: &[f32], width: usize, height: usize, channels: usize) -> Result<Self> {
        check_pack("feature map", channels)?;
        let plane = width * height;
        if data.len() != channels * plane {
            return Err(Error::DataLength {
                expected: channels * plane,
                actual: data.len(),
            });
        }

        let groups = channels / LANES;
        let mut lanes = Vec::with_capacity(groups * plane);
        for g in 0..groups {
            for i in 0..plane {
                let mut v = [0.0f32; LANES];
                for (l, x) in v.iter_mut().enumerate() {
                    *x = data[(g * LANES + l) * plane + i];
                }
                lanes.push(F16x8::from_f32(v));
            }
        }
        Ok(Self::from_lanes(width, height, groups, lanes))
    }

    /// Unpacks into a planar `channels × height × width` single-precision buffer.
    pub fn to_planar_f32(&self) -> Vec<f32> {
        let plane = self.plane_len();
        let mut out = vec![0.0f32; self.channels() * plane];
        for g in 0..self.groups {
            for (i, lanes) in self.channel(g).as_slice().iter().enumerate() {
                for (l, x) in lanes.to_f32().into_iter().enumerate() {
                    out[(g * LANES + l) * plane + i] = x;
                }
            }
        }
        out
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.groups * LANES
    }

    /// Number of 8-lane channel groups.
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Lane values per channel group (`width * height`).
    pub fn plane_len(&self) -> usize {
        self.width * self.height
    }

    /// Single channel value.
    ///
    /// # Panics
    ///
    /// Panics if any coordinate is out of range.
    pub fn get(&self, channel: usize, y: usize, x: usize) -> f16 {
        self.channel(channel / LANES).row(y)[x].lane(channel % LANES)
    }

    pub fn channel(&self, group: usize) -> Channel<'_> {
        let plane = self.plane_len();
        Channel {
            width: self.width,
            data: &self.data[group * plane..(group + 1) * plane],
        }
    }

    pub fn channel_mut(&mut self, group: usize) -> ChannelMut<'_> {
        let plane = self.plane_len();
        ChannelMut {
            width: self.width,
            data: &mut self.data[group * plane..(group + 1) * plane],
        }
    }

    pub fn as_lanes(&self) -> &[F16x8] {
        &self.data
    }

    pub fn as_lanes_mut(&mut self) -> &mut [F16x8] {
        &mut self.data
    }

    pub fn into_lanes(self) -> Vec<F16x8> {
        self.data
    }
}

/// Read-only view of one lane group's plane.
#[derive(Clone, Copy)]
pub struct Channel<'a> {
    width: usize,
    data: &'a [F16x8],
}

impl<'a> Channel<'a> {
    pub fn row(&self, y: usize) -> &'a [F16x8] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_slice(&self) -> &'a [F16x8] {
        self.data
    }
}

/// Mutable view of one lane group's plane.
pub struct ChannelMut<'a> {
    width: usize,
    data: &'a mut [F16x8],
}

impl<'a> ChannelMut<'a> {
    /// Views a raw plane buffer of `width`-long rows.
    pub(crate) fn new(width: usize, data: &'a mut [F16x8]) -> Self {
        Self { width, data }
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [F16x8] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }
}
