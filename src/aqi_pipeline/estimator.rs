//! AQI estimation module
//!
//! Two interchangeable strategies map a haze signature to an AQI value in
//! [0, 500]: a calibration polynomial over the mean transmission (default)
//! and a small learned regressor over the full feature vector.

mod calibration;
mod normalization;
mod regressor;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aqi_pipeline::common::error::{AnalysisError, Result};
use crate::aqi_pipeline::features::{FeatureVariant, FeatureVector};

pub use calibration::{CalibrationArtifact, CalibrationCurve, DEFAULT_ANCHORS};
pub use normalization::{FEATURE_EPSILON, FeatureStats};
pub use regressor::HazeRegressor;

pub const AQI_MIN: f32 = 0.0;
pub const AQI_MAX: f32 = 500.0;

/// Which estimator strategy the pipeline is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    #[default]
    Calibration,
    Regressor,
}

/// Clamps a raw estimate into the AQI range.
///
/// NaN has no meaningful AQI and is reported as an inference failure rather
/// than clamped; infinities clamp to the range ends.
pub fn clamp_aqi(raw: f64) -> Result<f32> {
    if raw.is_nan() {
        return Err(AnalysisError::InferenceFailure(
            "estimator produced NaN".to_string(),
        ));
    }
    Ok(raw.clamp(AQI_MIN as f64, AQI_MAX as f64) as f32)
}

#[derive(Debug, Clone)]
pub enum AqiEstimator {
    Calibration(CalibrationCurve),
    Regressor(HazeRegressor),
}

impl AqiEstimator {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            AqiEstimator::Calibration(_) => EstimatorKind::Calibration,
            AqiEstimator::Regressor(_) => EstimatorKind::Regressor,
        }
    }

    /// Feature variant the estimator was fit on, if it depends on one.
    pub fn required_variant(&self) -> Option<FeatureVariant> {
        match self {
            AqiEstimator::Calibration(_) => None,
            AqiEstimator::Regressor(regressor) => Some(regressor.variant()),
        }
    }

    /// Estimates AQI in [0, 500].
    ///
    /// The calibration curve reads only `mean_haze`, the raw mean of K; the
    /// regressor reads only `features`.
    pub fn estimate(&self, features: &FeatureVector, mean_haze: f32) -> Result<f32> {
        let aqi = match self {
            AqiEstimator::Calibration(curve) => curve.estimate(mean_haze)?,
            AqiEstimator::Regressor(regressor) => regressor.estimate(features)?,
        };
        debug!(kind = ?self.kind(), aqi, "Estimated AQI");
        Ok(aqi)
    }
}
