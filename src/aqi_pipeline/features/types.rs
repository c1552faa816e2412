//! Feature vector types

use std::fmt;

use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 4;

/// Versioned feature extraction strategy.
///
/// The two variants produce vectors of the same length with different
/// meanings, so a learned estimator is only valid for the variant it was fit
/// on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureVariant {
    /// `[mean(K), std(K), max(K), min(K)]` on the raw map, std with the n - 1 estimator
    KOnly,
    /// `[1 - mean(Kc), std(Kc), mean(x), std(x)]` with Kc = K clamped to [0, 1]
    #[default]
    KWithSource,
}

impl FeatureVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureVariant::KOnly => "k_only",
            FeatureVariant::KWithSource => "k_with_source",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "k_only" => Some(FeatureVariant::KOnly),
            "k_with_source" => Some(FeatureVariant::KWithSource),
            _ => None,
        }
    }

    pub fn names(&self) -> [&'static str; FEATURE_COUNT] {
        match self {
            FeatureVariant::KOnly => ["mean", "std", "max", "min"],
            FeatureVariant::KWithSource => ["haze_strength", "haze_variation", "brightness", "contrast"],
        }
    }
}

impl fmt::Display for FeatureVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    variant: FeatureVariant,
    values: [f32; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn new(variant: FeatureVariant, values: [f32; FEATURE_COUNT]) -> Self {
        Self { variant, values }
    }

    pub fn variant(&self) -> FeatureVariant {
        self.variant
    }

    pub fn values(&self) -> &[f32; FEATURE_COUNT] {
        &self.values
    }

    /// `(name, value)` pairs, mostly for logging.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.variant.names().into_iter().zip(self.values.iter().copied())
    }
}
