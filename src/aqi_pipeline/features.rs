//! Feature extraction module
//!
//! Condenses a haze map (and optionally the source tensor) into the
//! four-value signature the AQI estimators consume.

mod extraction;
pub mod types;

pub use extraction::extract_features;
pub use types::{FEATURE_COUNT, FeatureVariant, FeatureVector};
