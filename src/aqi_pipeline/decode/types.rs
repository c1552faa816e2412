//! Decoded image types

use image::RgbImage;

use crate::aqi_pipeline::common::error::{AnalysisError, Result};

/// A decoded photograph with 8-bit samples in RGB order.
#[derive(Debug, Clone)]
pub struct RawImage {
    pixels: RgbImage,
}

impl RawImage {
    /// Wraps an RGB buffer, rejecting images with no pixels.
    pub fn new(pixels: RgbImage) -> Result<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(AnalysisError::InvalidImage(format!(
                "image has no pixels ({}x{})",
                pixels.width(),
                pixels.height()
            )));
        }
        Ok(Self { pixels })
    }

    /// Builds an image from interleaved `[R, G, B, R, G, B, ...]` samples.
    pub fn from_rgb_samples(width: u32, height: u32, samples: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if samples.len() != expected {
            return Err(AnalysisError::InvalidImage(format!(
                "expected {} samples for {}x{}, got {}",
                expected,
                width,
                height,
                samples.len()
            )));
        }
        let pixels = RgbImage::from_raw(width, height, samples).ok_or_else(|| {
            AnalysisError::InvalidImage(format!("cannot build {width}x{height} image"))
        })?;
        Self::new(pixels)
    }

    /// Image filled with a single colour; handy for synthetic inputs.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}
