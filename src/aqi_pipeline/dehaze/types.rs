//! Outputs of the dehazing transform

use image::RgbImage;
use ndarray::{Array4, Axis};

use crate::aqi_pipeline::common::error::{AnalysisError, Result};
use crate::aqi_pipeline::common::stats::{MeanStd, mean_std};
use crate::aqi_pipeline::preprocess::ChannelOrder;

/// Per-pixel haze transmission map K, shape `(1, 3, H, W)`.
///
/// Values near 1 mean clear air, near 0 heavy haze. The network's final ReLU
/// bounds K below by zero only, so consumers that need [0, 1] use
/// [`HazeMap::clamped`].
#[derive(Debug, Clone)]
pub struct HazeMap {
    data: Array4<f32>,
}

impl HazeMap {
    pub fn new(data: Array4<f32>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// Mean of the raw (unclamped) map.
    pub fn mean(&self) -> f32 {
        self.stats().mean as f32
    }

    pub fn stats(&self) -> MeanStd {
        mean_std(self.data.iter().map(|&v| v as f64))
    }

    /// Copy of the map with every element clamped to [0, 1].
    ///
    /// NaN elements become 0.
    pub fn clamped(&self) -> Array4<f32> {
        self.data.mapv(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
    }
}

/// Reconstructed clear-scene estimate J, shape `(1, 3, H, W)`.
#[derive(Debug, Clone)]
pub struct ReconstructedScene {
    data: Array4<f32>,
}

impl ReconstructedScene {
    pub fn new(data: Array4<f32>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// Renders J as an 8-bit RGB image, clamping to [0, 1] first.
    ///
    /// `channel_order` is the plane order of the tensor, so BGR tensors come
    /// back out in RGB.
    pub fn to_rgb_image(&self, channel_order: ChannelOrder) -> Result<RgbImage> {
        let (batch, channels, height, width) = self.data.dim();
        if batch != 1 || channels != 3 {
            return Err(AnalysisError::InferenceFailure(format!(
                "cannot render scene of shape {:?}",
                self.data.shape()
            )));
        }

        let scene = self.data.index_axis(Axis(0), 0);
        let planes = channel_order.source_indices();
        Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let mut rgb = [0u8; 3];
            for (plane, &target) in planes.iter().enumerate() {
                let value = scene[[plane, y as usize, x as usize]];
                let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
                rgb[target] = (value * 255.0).round() as u8;
            }
            image::Rgb(rgb)
        }))
    }
}

/// Result of one forward pass.
#[derive(Debug, Clone)]
pub struct DehazeOutput {
    pub reconstructed: ReconstructedScene,
    pub haze_map: HazeMap,
}
