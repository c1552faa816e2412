use tracing::debug;

use crate::aqi_pipeline::common::error::{AnalysisError, Result};
use crate::aqi_pipeline::common::stats::mean_std;
use crate::aqi_pipeline::dehaze::HazeMap;
use crate::aqi_pipeline::features::types::{FeatureVariant, FeatureVector};
use crate::aqi_pipeline::preprocess::InputTensor;

/// Extracts the feature vector for `variant`.
///
/// `source` is the preprocessed image the haze map was computed from; the
/// `KWithSource` variant needs it and fails without it.
pub fn extract_features(
    haze_map: &HazeMap,
    source: Option<&InputTensor>,
    variant: FeatureVariant,
) -> Result<FeatureVector> {
    let values = match variant {
        FeatureVariant::KOnly => {
            // std(K) uses the n - 1 estimator the regressor was trained with
            let stats = haze_map.stats();
            let (min, max) = haze_map
                .data()
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            [stats.mean as f32, stats.sample_std() as f32, max, min]
        }
        FeatureVariant::KWithSource => {
            let source = source.ok_or_else(|| {
                AnalysisError::InferenceFailure(
                    "k_with_source features need the source tensor".to_string(),
                )
            })?;
            let clamped = mean_std(haze_map.clamped().iter().map(|&v| v as f64));
            let image = mean_std(source.data().iter().map(|&v| v as f64));
            [
                (1.0 - clamped.mean) as f32,
                clamped.std as f32,
                image.mean as f32,
                image.std as f32,
            ]
        }
    };

    let features = FeatureVector::new(variant, values);
    debug!(variant = %variant, features = ?features.named().collect::<Vec<_>>(), "Extracted features");
    Ok(features)
}
