#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};

use haze_aqi_rs::aqi_pipeline::{AodNet, ChannelOrder, PipelineConfig};
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

/// Workspace holding model artifacts and a staging directory.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create fixture dir");
        std::fs::create_dir(dir.path().join("uploads")).expect("create staging dir");
        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.path("uploads")
    }

    /// Saves a network whose transmission map is `haze` everywhere.
    pub fn constant_weights(&self, haze: f32) -> PathBuf {
        let path = self.path(&format!("aodnet-{haze}.safetensors"));
        AodNet::constant(haze, Some(ChannelOrder::Rgb))
            .and_then(|net| net.save(&path))
            .expect("save weights");
        path
    }

    pub fn config(&self, weights: &Path) -> PipelineConfig {
        PipelineConfig::builder()
            .dehaze_weights(weights)
            .staging_dir(Some(self.staging_dir()))
            .build()
    }

    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.staging_dir()).expect("read staging dir").count()
    }
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format).expect("encode image");
    bytes.into_inner()
}

pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encode(&RgbImage::from_pixel(width, height, Rgb(rgb)), ImageFormat::Png)
}

/// Bright sky gradient with some texture.
pub fn sky_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let shade = 150 + (y * 80 / height.max(1)) as u8;
        let grain = ((x * 7 + y * 13) % 11) as u8;
        Rgb([shade - grain, shade, 250 - grain])
    });
    encode(&image, ImageFormat::Png)
}
