use image::imageops::{self, FilterType};
use ndarray::Array4;
use tracing::debug;

use crate::aqi_pipeline::common::error::Result;
use crate::aqi_pipeline::decode::RawImage;
use crate::aqi_pipeline::preprocess::types::{ChannelOrder, INPUT_CHANNELS, INPUT_SIZE, InputTensor};

const SCALE: f32 = 1.0 / 255.0;

/// Resizes and normalises an image into the network input layout.
///
/// Steps, in order: bilinear resize to 256x256 on the 8-bit samples, channel
/// reordering to `channel_order`, scaling by 1/255, channel-first layout with
/// a leading batch dimension of one.
pub fn preprocess(image: &RawImage, channel_order: ChannelOrder) -> Result<InputTensor> {
    let side = INPUT_SIZE as u32;
    let resized = if image.width() == side && image.height() == side {
        image.pixels().clone()
    } else {
        imageops::resize(image.pixels(), side, side, FilterType::Triangle)
    };

    debug!(
        "Preprocessing {}x{} -> {}x{} ({})",
        image.width(),
        image.height(),
        side,
        side,
        channel_order
    );

    let planes = channel_order.source_indices();
    let mut data = Array4::<f32>::zeros((1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for (plane, &source) in planes.iter().enumerate() {
            data[[0, plane, y as usize, x as usize]] = pixel.0[source] as f32 * SCALE;
        }
    }

    InputTensor::new(data, channel_order)
}
