//! Model-owned convolution layer.

use std::sync::Arc;

use half::f16;

use crate::config::ConvOptions;
use crate::error::{Error, Result};
use crate::tensor::FeatureMap;
use crate::transform::{TransformedFilter, transform_filter};
use crate::{OutputShape, convolve};

/// A 3×3 stride-1 convolution with its filter already transformed.
///
/// Built once when the model loads and immutable afterwards, so one layer
/// can serve concurrent [`forward`](Self::forward) calls from many threads.
/// Clones share the transformed filter.
#[derive(Clone, Debug)]
pub struct WinogradConv {
    filter: Arc<TransformedFilter>,
    bias: Option<Vec<f16>>,
}

impl WinogradConv {
    /// Transforms raw `[out][in][3][3]` weights and stores the bias in half.
    pub fn new(
        weights: &[f32],
        in_channels: usize,
        out_channels: usize,
        bias: Option<&[f32]>,
        options: &ConvOptions,
    ) -> Result<Self> {
        let filter = transform_filter(weights, in_channels, out_channels, options)?;
        let bias = bias.map(|b| b.iter().copied().map(f16::from_f32).collect());
        Self::from_parts(Arc::new(filter), bias)
    }

    /// Wraps a filter transformed elsewhere, possibly shared with other layers.
    pub fn from_parts(filter: Arc<TransformedFilter>, bias: Option<Vec<f16>>) -> Result<Self> {
        if let Some(b) = &bias {
            if b.len() != filter.out_channels() {
                return Err(Error::BiasLength {
                    expected: filter.out_channels(),
                    actual: b.len(),
                });
            }
        }
        Ok(Self { filter, bias })
    }

    pub fn forward(&self, input: &FeatureMap, output: OutputShape, options: &ConvOptions) -> Result<FeatureMap> {
        convolve(input, &self.filter, self.bias.as_deref(), output, options)
    }

    pub fn filter(&self) -> &Arc<TransformedFilter> {
        &self.filter
    }

    pub fn bias(&self) -> Option<&[f16]> {
        self.bias.as_deref()
    }

    pub fn in_channels(&self) -> usize {
        self.filter.in_channels()
    }

    pub fn out_channels(&self) -> usize {
        self.filter.out_channels()
    }
}
