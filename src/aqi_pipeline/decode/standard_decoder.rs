//! Image decoder backed by the `image` crate.
//!
//! The container format is sniffed from the leading bytes, so any format the
//! enabled `image` features support (PNG, JPEG, BMP, TIFF, WebP) is accepted.
//! Whatever the source colour type, the result is converted to 8-bit RGB.

use tracing::debug;

use crate::aqi_pipeline::common::error::{AnalysisError, Result};
use crate::aqi_pipeline::decode::reader::ImageDecoder;
use crate::aqi_pipeline::decode::types::RawImage;

pub struct StandardImageDecoder;

impl ImageDecoder for StandardImageDecoder {
    fn decode(&self, data: &[u8]) -> Result<RawImage> {
        if data.is_empty() {
            return Err(AnalysisError::InvalidImage("upload is empty".to_string()));
        }

        debug!("Decoding image, {} bytes", data.len());

        let decoded = image::load_from_memory(data)
            .map_err(|e| AnalysisError::InvalidImage(e.to_string()))?;

        debug!(
            "Decoded image: {}x{} ({:?})",
            decoded.width(),
            decoded.height(),
            decoded.color()
        );

        RawImage::new(decoded.to_rgb8())
    }
}
