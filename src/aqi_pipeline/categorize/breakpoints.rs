use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aqi_pipeline::categorize::types::AqiCategory;
use crate::aqi_pipeline::common::error::ArtifactError;
use crate::aqi_pipeline::estimator::{AQI_MAX, AQI_MIN};

const BOUND_COUNT: usize = AqiCategory::ALL.len() - 1;

pub const EPA_UPPER_BOUNDS: [f32; BOUND_COUNT] = [50.0, 100.0, 150.0, 200.0, 300.0];
pub const CALIBRATION_UPPER_BOUNDS: [f32; BOUND_COUNT] = [55.0, 110.0, 170.0, 280.0, 400.0];

/// Maps AQI values to categories.
///
/// Holds the inclusive upper bound of every band but the last, which is
/// open-ended, so every value in [0, 500] lands in exactly one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakpointTable {
    upper_bounds: [f32; BOUND_COUNT],
}

impl BreakpointTable {
    /// US EPA bands.
    pub fn epa() -> Self {
        Self {
            upper_bounds: EPA_UPPER_BOUNDS,
        }
    }

    /// Bands aligned with the calibration anchors.
    pub fn calibration() -> Self {
        Self {
            upper_bounds: CALIBRATION_UPPER_BOUNDS,
        }
    }

    /// Custom table; bounds must be finite, strictly ascending and inside the
    /// AQI range.
    pub fn from_upper_bounds(bounds: &[f32]) -> std::result::Result<Self, ArtifactError> {
        let upper_bounds: [f32; BOUND_COUNT] = bounds.try_into().map_err(|_| {
            ArtifactError::InvalidBreakpoints(format!(
                "expected {BOUND_COUNT} upper bounds, got {}",
                bounds.len()
            ))
        })?;

        if upper_bounds.iter().any(|b| !b.is_finite() || *b < AQI_MIN || *b > AQI_MAX) {
            return Err(ArtifactError::InvalidBreakpoints(format!(
                "bounds must lie in [{AQI_MIN}, {AQI_MAX}]"
            )));
        }
        if upper_bounds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ArtifactError::InvalidBreakpoints(
                "bounds must be strictly ascending".to_string(),
            ));
        }

        Ok(Self { upper_bounds })
    }

    pub fn upper_bounds(&self) -> &[f32; BOUND_COUNT] {
        &self.upper_bounds
    }

    pub fn categorize(&self, aqi: f32) -> AqiCategory {
        let index = self
            .upper_bounds
            .iter()
            .position(|&bound| aqi <= bound)
            .unwrap_or(BOUND_COUNT);
        let category = AqiCategory::ALL[index];
        debug!(aqi, category = %category, "Categorized");
        category
    }
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self::calibration()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointPreset {
    Epa,
    #[default]
    Calibration,
}

/// Breakpoint table as written in configuration: a preset name or explicit
/// upper bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BreakpointConfig {
    Preset(BreakpointPreset),
    Custom { upper_bounds: Vec<f32> },
}

impl Default for BreakpointConfig {
    fn default() -> Self {
        BreakpointConfig::Preset(BreakpointPreset::default())
    }
}

impl BreakpointConfig {
    pub fn build(&self) -> std::result::Result<BreakpointTable, ArtifactError> {
        match self {
            BreakpointConfig::Preset(BreakpointPreset::Epa) => Ok(BreakpointTable::epa()),
            BreakpointConfig::Preset(BreakpointPreset::Calibration) => Ok(BreakpointTable::calibration()),
            BreakpointConfig::Custom { upper_bounds } => BreakpointTable::from_upper_bounds(upper_bounds),
        }
    }
}
