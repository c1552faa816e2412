//! Calibration curve estimator.
//!
//! A degree-2 polynomial fit once to a handful of (mean haze, AQI) anchor
//! pairs and evaluated on the raw mean of the transmission map. The curve is
//! deterministic and auditable: its three coefficients are the whole model.
//!
//! The fitted parabola is evaluated as is and clamped to the AQI range. It
//! increases across the anchor span but turns back up below its vertex; a
//! curve made [`monotone`](CalibrationCurve::monotone) is held flat there.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aqi_pipeline::common::archive::read_artifact;
use crate::aqi_pipeline::common::error::{AnalysisError, ArtifactError, Result};
use crate::aqi_pipeline::estimator::clamp_aqi;

/// Anchor points the default curve is fit to.
pub const DEFAULT_ANCHORS: [(f64, f64); 6] = [
    (1.0, 15.0),
    (1.2, 55.0),
    (1.4, 110.0),
    (1.6, 170.0),
    (1.8, 280.0),
    (2.0, 400.0),
];

const SINGULAR_PIVOT: f64 = 1e-12;

/// On-disk calibration: either anchors to fit or precomputed coefficients
/// (ascending powers, `c0 + c1*h + c2*h^2`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalibrationArtifact {
    Anchors { anchors: Vec<[f64; 2]> },
    Coefficients { coefficients: [f64; 3] },
}

/// Where the curve is held flat so that it never decreases as haze grows.
#[derive(Debug, Clone, Copy, PartialEq)]
enum MonotoneBound {
    None,
    /// Upward parabola: inputs below the vertex evaluate at the vertex.
    Floor(f64),
    /// Downward parabola: inputs above the vertex evaluate at the vertex.
    Ceiling(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCurve {
    coefficients: [f64; 3],
    bound: MonotoneBound,
}

impl CalibrationCurve {
    /// Curve fit to [`DEFAULT_ANCHORS`].
    pub fn default_anchors() -> std::result::Result<Self, ArtifactError> {
        Self::fit(&DEFAULT_ANCHORS)
    }

    /// Least-squares quadratic through the anchors.
    pub fn fit(anchors: &[(f64, f64)]) -> std::result::Result<Self, ArtifactError> {
        if anchors.iter().any(|(h, aqi)| !h.is_finite() || !aqi.is_finite()) {
            return Err(ArtifactError::InvalidCalibration(
                "anchor points must be finite".to_string(),
            ));
        }

        let mut distinct: Vec<f64> = anchors.iter().map(|&(h, _)| h).collect();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        if distinct.len() < 3 {
            return Err(ArtifactError::InvalidCalibration(format!(
                "a quadratic needs at least 3 distinct haze values, got {}",
                distinct.len()
            )));
        }

        // Normal equations: sum(h^(i+j)) c_j = sum(aqi * h^i)
        let mut power_sums = [0.0f64; 5];
        let mut rhs = [0.0f64; 3];
        for &(h, aqi) in anchors {
            let mut p = 1.0;
            for (k, sum) in power_sums.iter_mut().enumerate() {
                *sum += p;
                if k < 3 {
                    rhs[k] += aqi * p;
                }
                p *= h;
            }
        }
        let mut matrix = [[0.0f64; 3]; 3];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = power_sums[i + j];
            }
        }

        let coefficients = solve_3x3(matrix, rhs).ok_or_else(|| {
            ArtifactError::InvalidCalibration("anchor system is singular".to_string())
        })?;
        Self::from_coefficients(coefficients)
    }

    /// Curve from precomputed coefficients in ascending powers.
    pub fn from_coefficients(coefficients: [f64; 3]) -> std::result::Result<Self, ArtifactError> {
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ArtifactError::InvalidCalibration(
                "coefficients must be finite".to_string(),
            ));
        }
        Ok(Self {
            coefficients,
            bound: MonotoneBound::None,
        })
    }

    /// The same curve held flat beyond its vertex, so that it never
    /// decreases as haze grows. A decreasing line cannot be made monotone.
    pub fn monotone(self) -> std::result::Result<Self, ArtifactError> {
        let [_, c1, c2] = self.coefficients;
        let bound = if c2 > 0.0 {
            MonotoneBound::Floor(-c1 / (2.0 * c2))
        } else if c2 < 0.0 {
            MonotoneBound::Ceiling(-c1 / (2.0 * c2))
        } else if c1 < 0.0 {
            return Err(ArtifactError::InvalidCalibration(
                "linear calibration decreases with haze".to_string(),
            ));
        } else {
            MonotoneBound::None
        };
        Ok(Self { bound, ..self })
    }

    pub fn is_monotone(&self) -> bool {
        self.bound != MonotoneBound::None || (self.coefficients[2] == 0.0 && self.coefficients[1] >= 0.0)
    }

    pub fn from_artifact(artifact: &CalibrationArtifact) -> std::result::Result<Self, ArtifactError> {
        match artifact {
            CalibrationArtifact::Anchors { anchors } => {
                let pairs: Vec<(f64, f64)> = anchors.iter().map(|&[h, aqi]| (h, aqi)).collect();
                Self::fit(&pairs)
            }
            CalibrationArtifact::Coefficients { coefficients } => Self::from_coefficients(*coefficients),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ArtifactError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading calibration");
        let bytes = read_artifact(path)?;
        let artifact: CalibrationArtifact =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_artifact(&artifact)
    }

    /// The coefficients in the form [`CalibrationCurve::load`] reads back.
    pub fn to_artifact(&self) -> CalibrationArtifact {
        CalibrationArtifact::Coefficients {
            coefficients: self.coefficients,
        }
    }

    /// Writes the fitted coefficients as a calibration JSON artifact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), ArtifactError> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(&self.to_artifact()).map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), coefficients = ?self.coefficients, "Saved calibration");
        Ok(())
    }

    /// `[c0, c1, c2]` of `c0 + c1*h + c2*h^2`.
    pub fn coefficients(&self) -> [f64; 3] {
        self.coefficients
    }

    /// Unclamped curve value.
    pub fn evaluate(&self, haze: f64) -> f64 {
        let h = match self.bound {
            MonotoneBound::Floor(vertex) => haze.max(vertex),
            MonotoneBound::Ceiling(vertex) => haze.min(vertex),
            MonotoneBound::None => haze,
        };
        let [c0, c1, c2] = self.coefficients;
        c0 + h * (c1 + h * c2)
    }

    /// AQI in [0, 500] for a raw mean haze value.
    pub fn estimate(&self, mean_haze: f32) -> Result<f32> {
        // max/min against the vertex would swallow NaN
        if mean_haze.is_nan() {
            return Err(AnalysisError::InferenceFailure("mean haze is NaN".to_string()));
        }
        clamp_aqi(self.evaluate(mean_haze as f64))
    }
}

impl fmt::Display for CalibrationCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [c0, c1, c2] = self.coefficients;
        let sign = |c: f64| if c < 0.0 { '-' } else { '+' };
        write!(
            f,
            "AQI = {:.6} h^2 {} {:.6} h {} {:.6}",
            c2,
            sign(c1),
            c1.abs(),
            sign(c0),
            c0.abs()
        )
    }
}

fn solve_3x3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < SINGULAR_PIVOT {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0f64; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
