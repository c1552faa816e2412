use std::path::Path;

use crate::aqi_pipeline::common::error::{AnalysisError, Result};
use crate::aqi_pipeline::decode::types::RawImage;

pub trait ImageDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<RawImage>;

    fn decode_file(&self, path: &Path) -> Result<RawImage> {
        let data = std::fs::read(path).map_err(|e| {
            AnalysisError::InvalidImage(format!("{}: {}", path.display(), e))
        })?;
        self.decode(&data)
    }
}
