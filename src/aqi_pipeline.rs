//! Haze-based air quality analysis
//!
//! Estimates an Air Quality Index from a single outdoor photograph: the
//! photo is screened for daylight, run through a dehazing network, reduced to
//! a haze signature and mapped onto the AQI scale and its named bands.

pub mod analysis;
pub mod categorize;
pub mod common;
pub mod config;
pub mod context;
pub mod decode;
pub mod dehaze;
pub mod estimator;
pub mod features;
pub mod preprocess;
pub mod quality;

pub use common::{AnalysisError, ArtifactError, ErrorKind, Result};

pub use analysis::{
    AnalysisReport,
    AnalysisResponse,
    AqiPipeline,
    AqiResult,
    ErrorResponse,
    PipelineTimings,
};

pub use categorize::{
    AqiCategory,
    BreakpointConfig,
    BreakpointPreset,
    BreakpointTable,
    HazeLevel,
};

pub use config::{
    ArtifactPaths,
    PipelineConfig,
    PipelineConfigBuilder,
};

pub use context::{ContextStatus, InferenceContext, LoadedModels};

pub use decode::{ImageDecoder, RawImage, StandardImageDecoder};

pub use dehaze::{AodNet, HazeTransform};

pub use estimator::{
    AqiEstimator,
    CalibrationCurve,
    EstimatorKind,
    FeatureStats,
    HazeRegressor,
};

pub use features::{FeatureVariant, FeatureVector};

pub use preprocess::ChannelOrder;
