//! Tensor types fed to the dehazing network

use std::fmt;

use ndarray::{Array4, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::aqi_pipeline::common::error::{AnalysisError, Result};

/// Spatial side length of the network input.
pub const INPUT_SIZE: usize = 256;

/// Number of colour channels in the network input.
pub const INPUT_CHANNELS: usize = 3;

/// Order of colour planes in the network input.
///
/// Must match the order the dehazing weights were fit under. A mismatch does
/// not raise anything at inference time, it only degrades the haze map, so
/// the order is fixed in configuration and checked against the weight
/// artifact when it loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Index into an RGB pixel for each output plane.
    pub fn source_indices(&self) -> [usize; 3] {
        match self {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgr => [2, 1, 0],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelOrder::Rgb => "rgb",
            ChannelOrder::Bgr => "bgr",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rgb" => Some(ChannelOrder::Rgb),
            "bgr" => Some(ChannelOrder::Bgr),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalised network input of shape `(1, 3, 256, 256)` with values in [0, 1].
#[derive(Debug, Clone)]
pub struct InputTensor {
    data: Array4<f32>,
    channel_order: ChannelOrder,
}

impl InputTensor {
    /// Wraps an NCHW array, checking the fixed input shape.
    pub fn new(data: Array4<f32>, channel_order: ChannelOrder) -> Result<Self> {
        let expected = [1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE];
        if data.shape() != &expected[..] {
            return Err(AnalysisError::InferenceFailure(format!(
                "input tensor has shape {:?}, expected {:?}",
                data.shape(),
                expected
            )));
        }
        Ok(Self { data, channel_order })
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.channel_order
    }

    /// The single image in the batch as `(channels, height, width)`.
    pub fn image(&self) -> ArrayView3<'_, f32> {
        self.data.index_axis(Axis(0), 0)
    }
}
