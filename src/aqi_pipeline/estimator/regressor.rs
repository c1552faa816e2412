//! Learned haze regressor.
//!
//! A three layer perceptron (4 -> 32 -> 16 -> 1, ReLU between) over the
//! standardized feature vector. The output goes through a sigmoid and is
//! scaled to the AQI range. Parameters are read from a safetensors export of
//! a sequential model (`model.0`, `model.2`, `model.4`); the export carries the
//! feature variant it was fit on under the `feature_variant` metadata key.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use tracing::{debug, info, warn};

use crate::aqi_pipeline::common::archive::{encode_tensors, read_artifact, read_metadata, var_builder};
use crate::aqi_pipeline::common::error::{
    AnalysisError, ArtifactError, Result, candle_to_artifact, candle_to_inference,
};
use crate::aqi_pipeline::estimator::normalization::FeatureStats;
use crate::aqi_pipeline::estimator::{AQI_MAX, clamp_aqi};
use crate::aqi_pipeline::features::{FEATURE_COUNT, FeatureVariant, FeatureVector};

pub const FEATURE_VARIANT_KEY: &str = "feature_variant";

const MODEL_NAME: &str = "haze regressor";
/// `(name, in, out)` per layer.
const LAYERS: [(&str, usize, usize); 3] = [("model.0", FEATURE_COUNT, 32), ("model.2", 32, 16), ("model.4", 16, 1)];

fn load_layer(vb: &VarBuilder, (name, inp, out): (&str, usize, usize)) -> std::result::Result<Linear, ArtifactError> {
    candle_nn::linear(inp, out, vb.pp(name)).map_err(|e| candle_to_artifact(format!("{MODEL_NAME} {name}"), e))
}

#[derive(Debug, Clone)]
pub struct HazeRegressor {
    layers: [Linear; 3],
    device: Device,
    stats: FeatureStats,
    variant: FeatureVariant,
}

impl HazeRegressor {
    /// Builds the regressor from its three linear layers, in order.
    pub fn from_layers(
        layers: [Linear; 3],
        stats: FeatureStats,
        variant: FeatureVariant,
    ) -> std::result::Result<Self, ArtifactError> {
        for (layer, (name, inp, out)) in layers.iter().zip(LAYERS) {
            if layer.weight().dims() != &[out, inp][..] {
                return Err(ArtifactError::ShapeMismatch {
                    name: format!("{name}.weight"),
                    expected: vec![out, inp],
                    actual: layer.weight().dims().to_vec(),
                });
            }
            let bias_dims = layer.bias().map(|b| b.dims().to_vec()).unwrap_or_default();
            if bias_dims.as_slice() != [out] {
                return Err(ArtifactError::ShapeMismatch {
                    name: format!("{name}.bias"),
                    expected: vec![out],
                    actual: bias_dims,
                });
            }
        }

        let device = layers[0].weight().device().clone();
        Ok(Self {
            layers,
            device,
            stats,
            variant,
        })
    }

    pub fn from_var_builder(
        vb: VarBuilder,
        stats: FeatureStats,
        variant: FeatureVariant,
    ) -> std::result::Result<Self, ArtifactError> {
        let [l0, l2, l4] = LAYERS;
        let layers = [load_layer(&vb, l0)?, load_layer(&vb, l2)?, load_layer(&vb, l4)?];
        Self::from_layers(layers, stats, variant)
    }

    pub fn load<P: AsRef<Path>>(
        path: P,
        stats: FeatureStats,
        variant: FeatureVariant,
    ) -> std::result::Result<Self, ArtifactError> {
        let path = path.as_ref();
        info!(path = %path.display(), %variant, "Loading regressor weights");
        let bytes = read_artifact(path)?;
        Self::from_safetensors(&bytes, stats, variant)
    }

    /// Parses the export and checks that it was fit on `variant`.
    pub fn from_safetensors(
        bytes: &[u8],
        stats: FeatureStats,
        variant: FeatureVariant,
    ) -> std::result::Result<Self, ArtifactError> {
        let metadata = read_metadata(bytes)?;
        match metadata.get(FEATURE_VARIANT_KEY) {
            Some(declared) if FeatureVariant::parse(declared) == Some(variant) => {}
            Some(declared) => {
                return Err(ArtifactError::ConfigMismatch(format!(
                    "regressor was fit on '{declared}' features, configured for '{variant}'"
                )));
            }
            None => warn!(%variant, "Regressor weights carry no feature variant, trusting configuration"),
        }

        Self::from_var_builder(var_builder(bytes)?, stats, variant)
    }

    pub fn to_safetensors(&self) -> std::result::Result<Vec<u8>, ArtifactError> {
        let mut tensors = Vec::with_capacity(LAYERS.len() * 2);
        for (layer, (name, _, _)) in self.layers.iter().zip(LAYERS) {
            tensors.push((format!("{name}.weight"), layer.weight().clone()));
            if let Some(bias) = layer.bias() {
                tensors.push((format!("{name}.bias"), bias.clone()));
            }
        }
        let metadata = HashMap::from([(FEATURE_VARIANT_KEY.to_string(), self.variant.as_str().to_string())]);
        encode_tensors(&tensors, metadata)
    }

    pub fn variant(&self) -> FeatureVariant {
        self.variant
    }

    pub fn stats(&self) -> &FeatureStats {
        &self.stats
    }

    /// Sigmoid output scaled to the AQI range, for a `(batch, 4)` input.
    pub fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let [first, second, third] = &self.layers;
        let hidden = first.forward(x)?.relu()?;
        let hidden = second.forward(&hidden)?.relu()?;
        let logit = third.forward(&hidden)?;
        candle_nn::ops::sigmoid(&logit)?.affine(AQI_MAX as f64, 0.0)
    }

    pub fn estimate(&self, features: &FeatureVector) -> Result<f32> {
        if features.variant() != self.variant {
            return Err(AnalysisError::InferenceFailure(format!(
                "regressor expects {} features, got {}",
                self.variant,
                features.variant()
            )));
        }

        if features.values().iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InferenceFailure(
                "feature vector contains non-finite values".to_string(),
            ));
        }

        let standardized = self.stats.standardize(features.values());
        let outputs = Tensor::from_slice(&standardized, (1, FEATURE_COUNT), &self.device)
            .and_then(|x| self.forward(&x))
            .and_then(|y| y.flatten_all())
            .and_then(|y| y.to_vec1::<f32>())
            .map_err(|e| candle_to_inference(MODEL_NAME, "forward", e))?;
        let aqi = outputs
            .first()
            .copied()
            .ok_or_else(|| AnalysisError::InferenceFailure("regressor produced no output".to_string()))?;

        debug!(aqi, "Regressor output");
        clamp_aqi(aqi as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(out: usize, inp: usize, weight: impl Fn(usize, usize) -> f32, bias: f32) -> Linear {
        let values: Vec<f32> = (0..out).flat_map(|o| (0..inp).map(move |i| (o, i))).map(|(o, i)| weight(o, i)).collect();
        Linear::new(
            Tensor::from_vec(values, (out, inp), &Device::Cpu).unwrap(),
            Some(Tensor::full(bias, out, &Device::Cpu).unwrap()),
        )
    }

    /// Zero weights everywhere except the output bias, so the logit is `bias`.
    fn constant_regressor(bias: f32, variant: FeatureVariant) -> HazeRegressor {
        let layers = [
            linear(32, FEATURE_COUNT, |_, _| 0.0, 0.0),
            linear(16, 32, |_, _| 0.0, 0.0),
            linear(1, 16, |_, _| 0.0, bias),
        ];
        HazeRegressor::from_layers(layers, FeatureStats::identity(), variant).unwrap()
    }

    /// Passes feature 0 straight through to the logit.
    fn passthrough_regressor() -> HazeRegressor {
        let first_only = |o: usize, i: usize| if o == 0 && i == 0 { 1.0 } else { 0.0 };
        let layers = [
            linear(32, FEATURE_COUNT, first_only, 0.0),
            linear(16, 32, first_only, 0.0),
            linear(1, 16, first_only, 0.0),
        ];
        HazeRegressor::from_layers(layers, FeatureStats::identity(), FeatureVariant::KWithSource).unwrap()
    }

    fn features(first: f32) -> FeatureVector {
        FeatureVector::new(FeatureVariant::KWithSource, [first, 0.0, 0.0, 0.0])
    }

    #[test]
    fn test_zero_logit_is_midpoint() {
        let regressor = constant_regressor(0.0, FeatureVariant::KWithSource);
        assert!((regressor.estimate(&features(0.3)).unwrap() - 250.0).abs() < 1e-3);
    }

    #[test]
    fn test_logistic_output() {
        let regressor = passthrough_regressor();
        // 500 / (1 + e^-2)
        assert!((regressor.estimate(&features(2.0)).unwrap() - 440.399).abs() < 1e-2);
    }

    #[test]
    fn test_output_stays_in_range() {
        let regressor = passthrough_regressor();
        for value in [-1e6, -5.0, 0.0, 5.0, 1e6] {
            let aqi = regressor.estimate(&features(value)).unwrap();
            assert!((0.0..=500.0).contains(&aqi), "feature {value} gave {aqi}");
        }
    }

    #[test]
    fn test_monotonic_in_passthrough_feature() {
        let regressor = passthrough_regressor();
        let low = regressor.estimate(&features(0.5)).unwrap();
        let high = regressor.estimate(&features(2.0)).unwrap();
        assert!(high > low);
        // ReLU cuts the negative branch to logit 0
        assert!((regressor.estimate(&features(-3.0)).unwrap() - 250.0).abs() < 1e-3);
    }

    #[test]
    fn test_variant_mismatch_at_inference() {
        let regressor = constant_regressor(0.0, FeatureVariant::KOnly);
        assert!(matches!(
            regressor.estimate(&features(0.0)),
            Err(AnalysisError::InferenceFailure(_))
        ));
    }

    #[test]
    fn test_non_finite_features_fail() {
        let regressor = passthrough_regressor();
        assert!(regressor.estimate(&features(f32::NAN)).is_err());
        assert!(regressor.estimate(&features(f32::INFINITY)).is_err());
    }

    #[test]
    fn test_safetensors_preserves_behavior() {
        let regressor = passthrough_regressor();
        let bytes = regressor.to_safetensors().unwrap();
        let loaded =
            HazeRegressor::from_safetensors(&bytes, FeatureStats::identity(), FeatureVariant::KWithSource).unwrap();

        assert_eq!(loaded.variant(), FeatureVariant::KWithSource);
        assert_eq!(
            loaded.estimate(&features(1.25)).unwrap(),
            regressor.estimate(&features(1.25)).unwrap()
        );
    }

    #[test]
    fn test_variant_mismatch_at_load() {
        let bytes = constant_regressor(0.0, FeatureVariant::KOnly).to_safetensors().unwrap();
        assert!(matches!(
            HazeRegressor::from_safetensors(&bytes, FeatureStats::identity(), FeatureVariant::KWithSource),
            Err(ArtifactError::ConfigMismatch(_))
        ));
    }

    #[test]
    fn test_missing_variant_metadata_is_accepted() {
        let regressor = constant_regressor(1.0, FeatureVariant::KOnly);
        let tensors: Vec<(String, Tensor)> = regressor
            .layers
            .iter()
            .zip(LAYERS)
            .flat_map(|(layer, (name, _, _))| {
                [
                    (format!("{name}.weight"), layer.weight().clone()),
                    (format!("{name}.bias"), layer.bias().unwrap().clone()),
                ]
            })
            .collect();
        let bytes = encode_tensors(&tensors, HashMap::new()).unwrap();
        let loaded = HazeRegressor::from_safetensors(&bytes, FeatureStats::identity(), FeatureVariant::KOnly).unwrap();
        assert_eq!(loaded.variant(), FeatureVariant::KOnly);
    }

    #[test]
    fn test_wrong_layer_shape() {
        let layers = [
            linear(32, 3, |_, _| 0.0, 0.0),
            linear(16, 32, |_, _| 0.0, 0.0),
            linear(1, 16, |_, _| 0.0, 0.0),
        ];
        assert!(matches!(
            HazeRegressor::from_layers(layers, FeatureStats::identity(), FeatureVariant::KOnly),
            Err(ArtifactError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_export_is_rejected() {
        let regressor = constant_regressor(0.0, FeatureVariant::KOnly);
        let first = &regressor.layers[0];
        let tensors = [
            ("model.0.weight".to_string(), first.weight().clone()),
            ("model.0.bias".to_string(), first.bias().unwrap().clone()),
        ];
        let bytes = encode_tensors(&tensors, HashMap::new()).unwrap();
        assert!(matches!(
            HazeRegressor::from_safetensors(&bytes, FeatureStats::identity(), FeatureVariant::KOnly),
            Err(ArtifactError::Model { .. })
        ));
    }
}
