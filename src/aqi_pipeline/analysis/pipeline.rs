use std::path::Path;

use tracing::{error, info, instrument, warn};

use crate::aqi_pipeline::analysis::result::{AnalysisReport, AqiResult};
use crate::aqi_pipeline::analysis::timing::{PipelineTimings, Timer};
use crate::aqi_pipeline::categorize::{HazeLevel, categorize};
use crate::aqi_pipeline::common::error::{AnalysisError, ErrorKind, Result};
use crate::aqi_pipeline::config::PipelineConfig;
use crate::aqi_pipeline::context::{ContextStatus, InferenceContext, LoadedModels};
use crate::aqi_pipeline::decode::{ImageDecoder, RawImage, StagedUpload, StandardImageDecoder};
use crate::aqi_pipeline::dehaze::{AodNet, HazeTransform};
use crate::aqi_pipeline::features::extract_features;
use crate::aqi_pipeline::preprocess::preprocess;
use crate::aqi_pipeline::quality::{assess_quality, rejection_reason};

/// Photo-to-AQI analysis.
///
/// Stages run strictly in order: decode, quality gate, preprocess, dehaze,
/// feature extraction, estimation, categorization. The pipeline holds no
/// per-request state and can be shared between threads.
pub struct AqiPipeline<D: ImageDecoder = StandardImageDecoder, T: HazeTransform = AodNet> {
    decoder: D,
    context: InferenceContext<T>,
}

impl AqiPipeline<StandardImageDecoder, AodNet> {
    /// Loads the artifacts named by `config`. A load failure does not fail
    /// construction; the pipeline then answers every request with
    /// `ModelUnavailable`.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            decoder: StandardImageDecoder,
            context: InferenceContext::load(config),
        }
    }
}

impl<D: ImageDecoder, T: HazeTransform> AqiPipeline<D, T> {
    pub fn with_custom(decoder: D, context: InferenceContext<T>) -> Self {
        Self { decoder, context }
    }

    pub fn context(&self) -> &InferenceContext<T> {
        &self.context
    }

    pub fn config(&self) -> &PipelineConfig {
        self.context.config()
    }

    pub fn is_ready(&self) -> bool {
        self.context.is_ready()
    }

    pub fn status(&self) -> ContextStatus {
        self.context.status()
    }

    /// Analyzes an encoded image held in memory.
    #[instrument(skip(self, data), fields(input_size = data.len()))]
    pub fn analyze_image(&self, data: &[u8]) -> Result<AqiResult> {
        self.analyze_with_timings(data).map(|report| report.result)
    }

    /// Like [`AqiPipeline::analyze_image`], keeping the intermediate outputs
    /// and per-stage timings.
    #[instrument(skip(self, data), fields(input_size = data.len()))]
    pub fn analyze_with_timings(&self, data: &[u8]) -> Result<AnalysisReport> {
        let outcome = self.context.models().and_then(|models| {
            let mut timings = PipelineTimings::new();
            let image = timed("decode", &mut timings, || self.decoder.decode(data))?;
            self.run(models, &image, timings)
        });
        observe(outcome)
    }

    /// Analyzes an image that is already decoded.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn analyze_raw(&self, image: &RawImage) -> Result<AqiResult> {
        let outcome = self
            .context
            .models()
            .and_then(|models| self.run(models, image, PipelineTimings::new()));
        observe(outcome).map(|report| report.result)
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn analyze_file<P: AsRef<Path>>(&self, path: P) -> Result<AqiResult> {
        let outcome = self.context.models().and_then(|models| {
            let mut timings = PipelineTimings::new();
            let image = timed("decode", &mut timings, || self.decoder.decode_file(path.as_ref()))?;
            self.run(models, &image, timings)
        });
        observe(outcome).map(|report| report.result)
    }

    /// Analyzes an upload by way of a temporary file, as a web handler
    /// would. The file is gone when this returns, whatever the outcome.
    #[instrument(skip(self, data), fields(input_size = data.len()))]
    pub fn analyze_upload(&self, data: &[u8]) -> Result<AqiResult> {
        let outcome = self.context.models().and_then(|models| {
            let mut timings = PipelineTimings::new();
            let staged = timed("stage_upload", &mut timings, || {
                StagedUpload::stage(data, self.config().staging_dir.as_deref())
            })?;
            let image = timed("decode", &mut timings, || self.decoder.decode_file(staged.path()))?;
            self.run(models, &image, timings)
        });
        observe(outcome).map(|report| report.result)
    }

    fn run(
        &self,
        models: &LoadedModels<T>,
        image: &RawImage,
        mut timings: PipelineTimings,
    ) -> Result<AnalysisReport> {
        let config = self.config();

        let quality = timed("quality_gate", &mut timings, || {
            let report = assess_quality(image, &config.quality);
            match rejection_reason(&report) {
                Some(reason) => Err(AnalysisError::UnsuitableImage(reason)),
                None => Ok(report),
            }
        })?;

        let input = timed("preprocess", &mut timings, || preprocess(image, config.channel_order))?;

        let output = timed("dehaze", &mut timings, || models.transform.dehaze(&input))?;

        let features = timed("extract_features", &mut timings, || {
            extract_features(&output.haze_map, Some(&input), config.feature_variant)
        })?;

        let (value, mean_haze) = timed("estimate", &mut timings, || {
            let mean_haze = output.haze_map.mean();
            if !mean_haze.is_finite() {
                return Err(AnalysisError::InferenceFailure(format!(
                    "haze map mean is {mean_haze}"
                )));
            }
            Ok((models.estimator.estimate(&features, mean_haze)?, mean_haze))
        })?;

        let (category, color) = timed("categorize", &mut timings, || {
            Ok(categorize(&models.breakpoints, value))
        })?;

        let result = AqiResult {
            value,
            category,
            color,
            mean_haze,
            haze_level: HazeLevel::from_aqi(value),
            feature_variant: features.variant(),
        };

        info!(
            aqi = result.value,
            category = %result.category,
            mean_haze = result.mean_haze,
            blur_score = quality.blur_score,
            elapsed_ms = timings.total_duration().as_secs_f64() * 1000.0,
            "Analysis complete"
        );

        Ok(AnalysisReport {
            result,
            quality,
            features,
            dehazed: output.reconstructed,
            timings,
        })
    }
}

/// Runs one stage inside its own span and records how long it took.
fn timed<R>(stage: &'static str, timings: &mut PipelineTimings, f: impl FnOnce() -> Result<R>) -> Result<R> {
    let _span = tracing::info_span!("stage", name = stage).entered();
    let timer = Timer::start(stage);
    let outcome = f();
    timer.stop(timings);
    outcome
}

/// Logs a failed request at a level matching its kind.
fn observe<R>(outcome: Result<R>) -> Result<R> {
    if let Err(e) = &outcome {
        match e.kind() {
            ErrorKind::InferenceFailure => error!(error = %e, "Analysis failed"),
            ErrorKind::ModelUnavailable => warn!(error = %e, "Analysis refused"),
            ErrorKind::InvalidImage | ErrorKind::UnsuitableImage => info!(error = %e, "Image rejected"),
        }
    }
    outcome
}
