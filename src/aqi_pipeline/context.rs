//! Inference context
//!
//! Everything the pipeline needs from disk, loaded once at startup and then
//! shared read-only between requests. Loading never fails outright: a broken
//! or missing artifact leaves the context unavailable with a reason, and
//! every request then reports `ModelUnavailable` until the process is
//! restarted with fixed artifacts.

use serde::Serialize;
use tracing::{error, info, instrument};

use crate::aqi_pipeline::categorize::BreakpointTable;
use crate::aqi_pipeline::common::error::{AnalysisError, ArtifactError, Result};
use crate::aqi_pipeline::config::PipelineConfig;
use crate::aqi_pipeline::dehaze::{AodNet, HazeTransform};
use crate::aqi_pipeline::estimator::{
    AqiEstimator, CalibrationCurve, EstimatorKind, FeatureStats, HazeRegressor,
};
use crate::aqi_pipeline::features::FeatureVariant;
use crate::aqi_pipeline::preprocess::ChannelOrder;

/// Models and tables a request runs against.
#[derive(Debug)]
pub struct LoadedModels<T> {
    pub transform: T,
    pub estimator: AqiEstimator,
    pub breakpoints: BreakpointTable,
}

#[derive(Debug)]
enum ModelState<T> {
    Ready(LoadedModels<T>),
    Unavailable(String),
}

/// Health snapshot of a context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextStatus {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub estimator: EstimatorKind,
    pub feature_variant: FeatureVariant,
    pub channel_order: ChannelOrder,
}

#[derive(Debug)]
pub struct InferenceContext<T: HazeTransform = AodNet> {
    config: PipelineConfig,
    state: ModelState<T>,
}

impl InferenceContext<AodNet> {
    /// Loads every artifact named by `config`.
    #[instrument(skip(config), fields(estimator = ?config.estimator))]
    pub fn load(config: PipelineConfig) -> Self {
        match Self::load_models(&config) {
            Ok(models) => {
                info!(
                    estimator = ?models.estimator.kind(),
                    feature_variant = %config.feature_variant,
                    channel_order = %config.channel_order,
                    "Inference context ready"
                );
                Self {
                    config,
                    state: ModelState::Ready(models),
                }
            }
            Err(e) => {
                error!(error = %e, "Model artifacts failed to load; analysis disabled");
                Self::unavailable(config, e.to_string())
            }
        }
    }

    fn load_models(config: &PipelineConfig) -> std::result::Result<LoadedModels<AodNet>, ArtifactError> {
        config.validate()?;
        let artifacts = &config.artifacts;

        let transform = AodNet::load(&artifacts.dehaze_weights)?;

        let estimator = match config.estimator {
            EstimatorKind::Calibration => {
                let mut curve = match &artifacts.calibration {
                    Some(path) => CalibrationCurve::load(path)?,
                    None => CalibrationCurve::default_anchors()?,
                };
                if config.monotone_calibration {
                    curve = curve.monotone()?;
                }
                AqiEstimator::Calibration(curve)
            }
            EstimatorKind::Regressor => {
                let missing = |field: &str| {
                    ArtifactError::ConfigMismatch(format!("regressor estimator needs artifacts.{field}"))
                };
                let stats_path = artifacts.feature_stats.as_ref().ok_or_else(|| missing("feature_stats"))?;
                let weights_path = artifacts
                    .regressor_weights
                    .as_ref()
                    .ok_or_else(|| missing("regressor_weights"))?;
                let stats = FeatureStats::load(stats_path)?;
                AqiEstimator::Regressor(HazeRegressor::load(weights_path, stats, config.feature_variant)?)
            }
        };

        Self::check_parts(config, &transform, &estimator)
            .map(|breakpoints| LoadedModels { transform, estimator, breakpoints })
    }
}

impl<T: HazeTransform> InferenceContext<T> {
    /// Builds a ready context from already constructed parts, applying the
    /// same consistency checks as [`InferenceContext::load`].
    pub fn from_parts(
        config: PipelineConfig,
        transform: T,
        estimator: AqiEstimator,
    ) -> std::result::Result<Self, ArtifactError> {
        config.validate()?;
        let breakpoints = Self::check_parts(&config, &transform, &estimator)?;
        Ok(Self {
            config,
            state: ModelState::Ready(LoadedModels {
                transform,
                estimator,
                breakpoints,
            }),
        })
    }

    pub fn unavailable(config: PipelineConfig, reason: impl Into<String>) -> Self {
        Self {
            config,
            state: ModelState::Unavailable(reason.into()),
        }
    }

    /// Cross-checks the parts against the configuration and builds the
    /// breakpoint table.
    fn check_parts(
        config: &PipelineConfig,
        transform: &T,
        estimator: &AqiEstimator,
    ) -> std::result::Result<BreakpointTable, ArtifactError> {
        if let Some(declared) = transform.declared_channel_order() {
            if declared != config.channel_order {
                return Err(ArtifactError::ConfigMismatch(format!(
                    "dehazing weights were fit on {declared} input, configured for {}",
                    config.channel_order
                )));
            }
        }

        if estimator.kind() != config.estimator {
            return Err(ArtifactError::ConfigMismatch(format!(
                "configured for the {:?} estimator, got {:?}",
                config.estimator,
                estimator.kind()
            )));
        }

        if let Some(required) = estimator.required_variant() {
            if required != config.feature_variant {
                return Err(ArtifactError::ConfigMismatch(format!(
                    "estimator was fit on {required} features, configured for {}",
                    config.feature_variant
                )));
            }
        }

        config.breakpoints.build()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn models(&self) -> Result<&LoadedModels<T>> {
        match &self.state {
            ModelState::Ready(models) => Ok(models),
            ModelState::Unavailable(reason) => Err(AnalysisError::ModelUnavailable(reason.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    pub fn status(&self) -> ContextStatus {
        let reason = match &self.state {
            ModelState::Ready(_) => None,
            ModelState::Unavailable(reason) => Some(reason.clone()),
        };
        ContextStatus {
            ready: reason.is_none(),
            reason,
            estimator: self.config.estimator,
            feature_variant: self.config.feature_variant,
            channel_order: self.config.channel_order,
        }
    }
}
