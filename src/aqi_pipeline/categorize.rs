//! AQI categorization
//!
//! Turns a numeric AQI into its named band and display colour through a
//! configurable breakpoint table.

mod breakpoints;
pub mod types;

pub use breakpoints::{
    BreakpointConfig, BreakpointPreset, BreakpointTable, CALIBRATION_UPPER_BOUNDS, EPA_UPPER_BOUNDS,
};
pub use types::{AqiCategory, HazeLevel};

/// Category and hex colour for `aqi`.
pub fn categorize(table: &BreakpointTable, aqi: f32) -> (AqiCategory, &'static str) {
    let category = table.categorize(aqi);
    (category, category.color())
}
