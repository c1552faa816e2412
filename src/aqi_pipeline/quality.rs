//! Image quality gate
//!
//! Luminance statistics used to turn away photographs the haze model cannot
//! read, before any tensor work happens.

mod gate;
pub mod types;

pub use gate::{assess_quality, is_acceptable, laplacian_variance, luminance, rejection_reason};
pub use types::{QualityReport, QualityThresholds};
