use image::GrayImage;
use tracing::{debug, warn};

use crate::aqi_pipeline::common::stats::mean_std;
use crate::aqi_pipeline::decode::RawImage;
use crate::aqi_pipeline::quality::types::{QualityReport, QualityThresholds};

// BT.601 luma weights in 14-bit fixed point.
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// Grayscale luminance of an RGB image, rounded to the nearest level.
pub fn luminance(image: &RawImage) -> GrayImage {
    let pixels = image.pixels();
    GrayImage::from_fn(pixels.width(), pixels.height(), |x, y| {
        let [r, g, b] = pixels.get_pixel(x, y).0;
        let weighted = r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B;
        let level = (weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT;
        image::Luma([level.min(255) as u8])
    })
}

fn reflect_101(index: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    let reflected = if index < 0 {
        -index
    } else if index >= len {
        2 * len - 2 - index
    } else {
        index
    };
    reflected as u32
}

/// Variance of the 4-neighbour Laplacian, with reflect-101 borders.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = (gray.width() as i64, gray.height() as i64);
    let at = |x: i64, y: i64| gray.get_pixel(reflect_101(x, width), reflect_101(y, height)).0[0] as f64;

    let responses = (0..height).flat_map(|y| {
        (0..width).map(move |x| {
            at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y)
        })
    });

    let stats = mean_std(responses);
    stats.std * stats.std
}

/// Computes the quality report for an image.
///
/// Reads luminance statistics only; the image is never modified.
pub fn assess_quality(image: &RawImage, thresholds: &QualityThresholds) -> QualityReport {
    let gray = luminance(image);
    let total = gray.as_raw().len() as f64;

    let stats = mean_std(gray.as_raw().iter().map(|&v| v as f64));
    let dark = gray.as_raw().iter().filter(|&&v| v < thresholds.dark_level).count() as f64;
    let bright = gray.as_raw().iter().filter(|&&v| v > thresholds.bright_level).count() as f64;

    let report = QualityReport {
        is_daytime: stats.mean > thresholds.daytime_mean,
        blur_score: laplacian_variance(&gray),
        is_poor_exposure: dark / total > thresholds.exposure_fraction
            || bright / total > thresholds.exposure_fraction,
        mean_luminance: stats.mean,
    };

    debug!(
        mean_luminance = report.mean_luminance,
        blur_score = report.blur_score,
        is_poor_exposure = report.is_poor_exposure,
        "Assessed image quality"
    );
    report
}

/// Gating policy: only night-time images are rejected.
///
/// Poor exposure is reported but not enforced.
pub fn is_acceptable(report: &QualityReport) -> bool {
    if report.is_daytime && report.is_poor_exposure {
        warn!(
            mean_luminance = report.mean_luminance,
            "Image exposure is poor; continuing anyway"
        );
    }
    report.is_daytime
}

/// Explanation for an unacceptable report, `None` when the image passes.
pub fn rejection_reason(report: &QualityReport) -> Option<String> {
    if is_acceptable(report) {
        return None;
    }
    Some(format!(
        "Image is too dark to analyse (mean brightness {:.1}); please upload a daytime photo",
        report.mean_luminance
    ))
}
