use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds surfaced across the analysis boundary.
///
/// Every failure inside the pipeline is classified into exactly one of these
/// before it reaches the caller.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Unsuitable image: {0}")]
    UnsuitableImage(String),

    #[error("Inference failure: {0}")]
    InferenceFailure(String),
}

/// Transport-agnostic discriminant of [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ModelUnavailable,
    InvalidImage,
    UnsuitableImage,
    InferenceFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::InvalidImage => "invalid_image",
            ErrorKind::UnsuitableImage => "unsuitable_image",
            ErrorKind::InferenceFailure => "inference_failure",
        }
    }
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            AnalysisError::InvalidImage(_) => ErrorKind::InvalidImage,
            AnalysisError::UnsuitableImage(_) => ErrorKind::UnsuitableImage,
            AnalysisError::InferenceFailure(_) => ErrorKind::InferenceFailure,
        }
    }

    /// Message safe to hand back to an end user.
    ///
    /// Inference failures keep their details in the logs only.
    pub fn public_message(&self) -> String {
        match self {
            AnalysisError::ModelUnavailable(_) => {
                "The analysis model is not available right now".to_string()
            }
            AnalysisError::InvalidImage(reason) => format!("Invalid image: {reason}"),
            AnalysisError::UnsuitableImage(reason) => reason.clone(),
            AnalysisError::InferenceFailure(_) => "Image analysis failed".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised while loading or validating startup artifacts.
///
/// These never reach a request directly: the inference context turns them
/// into a [`AnalysisError::ModelUnavailable`] reason.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed safetensors artifact: {0}")]
    Safetensors(String),

    #[error("Malformed JSON artifact {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Tensor '{name}' has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Failed to load {context}: {source}")]
    Model {
        context: String,
        #[source]
        source: candle_core::Error,
    },

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("Invalid breakpoint table: {0}")]
    InvalidBreakpoints(String),

    #[error("Configuration mismatch: {0}")]
    ConfigMismatch(String),
}

impl From<safetensors::SafeTensorError> for ArtifactError {
    fn from(err: safetensors::SafeTensorError) -> Self {
        ArtifactError::Safetensors(err.to_string())
    }
}

/// Wraps a candle error raised while building a model from its weights.
pub fn candle_to_artifact(context: impl Into<String>, err: candle_core::Error) -> ArtifactError {
    ArtifactError::Model {
        context: context.into(),
        source: err,
    }
}

/// Classifies a candle error raised during a forward pass.
pub fn candle_to_inference(model: &str, context: &str, err: candle_core::Error) -> AnalysisError {
    AnalysisError::InferenceFailure(format!("{model}: {context}: {err}"))
}
