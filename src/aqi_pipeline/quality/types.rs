//! Quality gate types

use serde::{Deserialize, Serialize};

/// Luminance-derived assessment of a photograph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityReport {
    /// Mean luminance exceeds the daytime threshold
    pub is_daytime: bool,
    /// Variance of the Laplacian of luminance; low values mean blur
    pub blur_score: f64,
    /// Too many pixels crushed to black or blown to white
    pub is_poor_exposure: bool,
    /// Mean luminance on the 0-255 scale
    pub mean_luminance: f64,
}

/// Thresholds used by [`assess_quality`](super::assess_quality).
///
/// The defaults were tuned empirically on daytime sky photographs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Mean luminance must be strictly above this to count as daytime
    pub daytime_mean: f64,
    /// Luminance below this counts as a dark pixel
    pub dark_level: u8,
    /// Luminance above this counts as a bright pixel
    pub bright_level: u8,
    /// Fraction of dark or bright pixels above which exposure is poor
    pub exposure_fraction: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            daytime_mean: 60.0,
            dark_level: 30,
            bright_level: 225,
            exposure_fraction: 0.4,
        }
    }
}
