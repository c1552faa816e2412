use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::aqi_pipeline::categorize::BreakpointConfig;
use crate::aqi_pipeline::common::error::ArtifactError;
use crate::aqi_pipeline::estimator::EstimatorKind;
use crate::aqi_pipeline::features::FeatureVariant;
use crate::aqi_pipeline::preprocess::ChannelOrder;
use crate::aqi_pipeline::quality::QualityThresholds;

/// Locations of the model artifacts loaded at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    /// AOD-Net safetensors export
    pub dehaze_weights: PathBuf,
    /// Regressor safetensors export, required for the regressor estimator
    pub regressor_weights: Option<PathBuf>,
    /// Calibration JSON; the built-in anchors are used when absent
    pub calibration: Option<PathBuf>,
    /// Feature normalization JSON, required for the regressor estimator
    pub feature_stats: Option<PathBuf>,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            dehaze_weights: PathBuf::from("models/aodnet.safetensors"),
            regressor_weights: None,
            calibration: None,
            feature_stats: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub channel_order: ChannelOrder,
    pub feature_variant: FeatureVariant,
    pub estimator: EstimatorKind,
    pub breakpoints: BreakpointConfig,
    /// Hold the calibration curve flat below its vertex instead of letting
    /// it rise again for very low haze means
    pub monotone_calibration: bool,
    pub quality: QualityThresholds,
    pub artifacts: ArtifactPaths,
    /// Directory uploads are staged in; the system temp dir when unset
    pub staging_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Checks settings that can be judged without touching the artifacts.
    pub fn validate(&self) -> std::result::Result<(), ArtifactError> {
        if self.estimator == EstimatorKind::Regressor {
            if self.artifacts.regressor_weights.is_none() {
                return Err(ArtifactError::ConfigMismatch(
                    "regressor estimator needs artifacts.regressor_weights".to_string(),
                ));
            }
            if self.artifacts.feature_stats.is_none() {
                return Err(ArtifactError::ConfigMismatch(
                    "regressor estimator needs artifacts.feature_stats".to_string(),
                ));
            }
        }

        let fraction = self.quality.exposure_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ArtifactError::ConfigMismatch(format!(
                "quality.exposure_fraction must be within [0, 1], got {fraction}"
            )));
        }

        self.breakpoints.build()?;
        Ok(())
    }
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    channel_order: Option<ChannelOrder>,
    feature_variant: Option<FeatureVariant>,
    estimator: Option<EstimatorKind>,
    breakpoints: Option<BreakpointConfig>,
    monotone_calibration: Option<bool>,
    quality: Option<QualityThresholds>,
    dehaze_weights: Option<PathBuf>,
    regressor_weights: Option<Option<PathBuf>>,
    calibration: Option<Option<PathBuf>>,
    feature_stats: Option<Option<PathBuf>>,
    staging_dir: Option<Option<PathBuf>>,
}

impl PipelineConfigBuilder {
    pub fn channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = Some(order);
        self
    }

    pub fn feature_variant(mut self, variant: FeatureVariant) -> Self {
        self.feature_variant = Some(variant);
        self
    }

    pub fn estimator(mut self, estimator: EstimatorKind) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn breakpoints(mut self, breakpoints: BreakpointConfig) -> Self {
        self.breakpoints = Some(breakpoints);
        self
    }

    pub fn monotone_calibration(mut self, monotone: bool) -> Self {
        self.monotone_calibration = Some(monotone);
        self
    }

    pub fn quality(mut self, quality: QualityThresholds) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn dehaze_weights(mut self, path: impl Into<PathBuf>) -> Self {
        self.dehaze_weights = Some(path.into());
        self
    }

    pub fn regressor_weights(mut self, path: Option<PathBuf>) -> Self {
        self.regressor_weights = Some(path);
        self
    }

    pub fn calibration(mut self, path: Option<PathBuf>) -> Self {
        self.calibration = Some(path);
        self
    }

    pub fn feature_stats(mut self, path: Option<PathBuf>) -> Self {
        self.feature_stats = Some(path);
        self
    }

    pub fn staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.staging_dir = Some(dir);
        self
    }

    pub fn build(self) -> PipelineConfig {
        let default = PipelineConfig::default();
        PipelineConfig {
            channel_order: self.channel_order.unwrap_or(default.channel_order),
            feature_variant: self.feature_variant.unwrap_or(default.feature_variant),
            estimator: self.estimator.unwrap_or(default.estimator),
            breakpoints: self.breakpoints.unwrap_or(default.breakpoints),
            monotone_calibration: self.monotone_calibration.unwrap_or(default.monotone_calibration),
            quality: self.quality.unwrap_or(default.quality),
            artifacts: ArtifactPaths {
                dehaze_weights: self.dehaze_weights.unwrap_or(default.artifacts.dehaze_weights),
                regressor_weights: self.regressor_weights.unwrap_or(default.artifacts.regressor_weights),
                calibration: self.calibration.unwrap_or(default.artifacts.calibration),
                feature_stats: self.feature_stats.unwrap_or(default.artifacts.feature_stats),
            },
            staging_dir: self.staging_dir.unwrap_or(default.staging_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aqi_pipeline::categorize::BreakpointPreset;

    #[test]
    fn test_builder_defaults() {
        let config = PipelineConfig::builder().build();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.estimator, EstimatorKind::Calibration);
        assert_eq!(config.feature_variant, FeatureVariant::KWithSource);
        assert_eq!(config.channel_order, ChannelOrder::Rgb);
        assert!(!config.monotone_calibration);
    }

    #[test]
    fn test_builder_overrides() {
        let config = PipelineConfig::builder()
            .channel_order(ChannelOrder::Bgr)
            .estimator(EstimatorKind::Regressor)
            .breakpoints(BreakpointConfig::Preset(BreakpointPreset::Epa))
            .dehaze_weights("w.safetensors")
            .regressor_weights(Some(PathBuf::from("r.safetensors")))
            .feature_stats(Some(PathBuf::from("stats.json")))
            .build();

        assert_eq!(config.channel_order, ChannelOrder::Bgr);
        assert_eq!(config.artifacts.dehaze_weights, PathBuf::from("w.safetensors"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_regressor_needs_its_artifacts() {
        let config = PipelineConfig::builder()
            .estimator(EstimatorKind::Regressor)
            .build();
        assert!(matches!(config.validate(), Err(ArtifactError::ConfigMismatch(_))));
    }

    #[test]
    fn test_invalid_breakpoints_fail_validation() {
        let config = PipelineConfig::builder()
            .breakpoints(BreakpointConfig::Custom {
                upper_bounds: vec![1.0, 2.0],
            })
            .build();
        assert!(matches!(config.validate(), Err(ArtifactError::InvalidBreakpoints(_))));
    }
}
