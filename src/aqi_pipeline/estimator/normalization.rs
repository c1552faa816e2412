use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aqi_pipeline::common::archive::read_artifact;
use crate::aqi_pipeline::common::error::ArtifactError;
use crate::aqi_pipeline::features::FEATURE_COUNT;

/// Added to the standard deviation so constant features don't divide by zero.
pub const FEATURE_EPSILON: f32 = 1e-6;

/// Per-feature statistics captured when the regressor was fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: [f32; FEATURE_COUNT],
    pub std: [f32; FEATURE_COUNT],
}

impl FeatureStats {
    pub fn new(
        mean: [f32; FEATURE_COUNT],
        std: [f32; FEATURE_COUNT],
    ) -> std::result::Result<Self, ArtifactError> {
        let stats = Self { mean, std };
        stats.validate()?;
        Ok(stats)
    }

    /// Zero mean, unit deviation.
    pub fn identity() -> Self {
        Self {
            mean: [0.0; FEATURE_COUNT],
            std: [1.0; FEATURE_COUNT],
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ArtifactError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading feature statistics");
        let bytes = read_artifact(path)?;
        let stats: FeatureStats = serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        stats.validate()?;
        Ok(stats)
    }

    fn validate(&self) -> std::result::Result<(), ArtifactError> {
        if self.mean.iter().chain(&self.std).any(|v| !v.is_finite()) {
            return Err(ArtifactError::ConfigMismatch(
                "feature statistics must be finite".to_string(),
            ));
        }
        if self.std.iter().any(|&s| s < 0.0) {
            return Err(ArtifactError::ConfigMismatch(
                "feature standard deviations must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// `(f - mean) / (std + eps)` per feature.
    pub fn standardize(&self, values: &[f32; FEATURE_COUNT]) -> [f32; FEATURE_COUNT] {
        std::array::from_fn(|i| (values[i] - self.mean[i]) / (self.std[i] + FEATURE_EPSILON))
    }
}
