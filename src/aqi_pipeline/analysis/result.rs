use serde::Serialize;

use crate::aqi_pipeline::analysis::timing::PipelineTimings;
use crate::aqi_pipeline::categorize::{AqiCategory, HazeLevel};
use crate::aqi_pipeline::common::error::AnalysisError;
use crate::aqi_pipeline::dehaze::ReconstructedScene;
use crate::aqi_pipeline::features::{FeatureVariant, FeatureVector};
use crate::aqi_pipeline::quality::QualityReport;

/// Outcome of a successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AqiResult {
    /// Estimated AQI in [0, 500]
    pub value: f32,
    pub category: AqiCategory,
    pub color: &'static str,
    /// Raw mean of the transmission map
    pub mean_haze: f32,
    pub haze_level: HazeLevel,
    pub feature_variant: FeatureVariant,
}

/// Everything a run produced, for callers that want more than the result.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub result: AqiResult,
    pub quality: QualityReport,
    pub features: FeatureVector,
    pub dehazed: ReconstructedScene,
    pub timings: PipelineTimings,
}

fn round_to(value: f32, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value as f64 * scale).round() / scale
}

/// Wire form of a successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResponse {
    pub status: &'static str,
    pub aqi: f64,
    pub category: &'static str,
    pub color: &'static str,
    pub mean_haze: f64,
}

impl From<&AqiResult> for AnalysisResponse {
    fn from(result: &AqiResult) -> Self {
        Self {
            status: "success",
            aqi: round_to(result.value, 2),
            category: result.category.label(),
            color: result.color,
            mean_haze: round_to(result.mean_haze, 4),
        }
    }
}

/// Wire form of a failed analysis. Carries only the public message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub kind: &'static str,
    pub message: String,
}

impl From<&AnalysisError> for ErrorResponse {
    fn from(error: &AnalysisError) -> Self {
        Self {
            status: "error",
            kind: error.kind().as_str(),
            message: error.public_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AqiResult {
        AqiResult {
            value: 398.571_43,
            category: AqiCategory::VeryUnhealthy,
            color: AqiCategory::VeryUnhealthy.color(),
            mean_haze: 1.999_987,
            haze_level: HazeLevel::High,
            feature_variant: FeatureVariant::KWithSource,
        }
    }

    #[test]
    fn test_response_rounding() {
        let response = AnalysisResponse::from(&sample());
        assert_eq!(response.aqi, 398.57);
        assert_eq!(response.mean_haze, 2.0);
        assert_eq!(response.category, "Very Unhealthy");
        assert_eq!(response.color, "#8f3f97");
    }

    #[test]
    fn test_response_json_shape() {
        let json = serde_json::to_value(AnalysisResponse::from(&sample())).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(json["status"], "success");
        assert_eq!(keys.len(), 5);
        for key in ["status", "aqi", "category", "color", "mean_haze"] {
            assert!(keys.contains(&key), "missing {key}");
        }
    }

    #[test]
    fn test_error_response_hides_inference_details() {
        let error = AnalysisError::InferenceFailure("tensor blew up at layer 3".to_string());
        let response = ErrorResponse::from(&error);
        assert_eq!(response.kind, "inference_failure");
        assert!(!response.message.contains("layer 3"));
    }

    #[test]
    fn test_result_serializes_labels() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["category"], "Very Unhealthy");
        assert_eq!(json["haze_level"], "High");
        assert_eq!(json["feature_variant"], "k_with_source");
    }
}
