//! Camera→robot coordinate calibration.
//!
//! Fits a 2-D affine map from ≥3 (camera pixel, robot mm) pairs by ordinary
//! least squares over the homogeneous design matrix `[x, y, 1]`, so extra
//! points act as a regression rather than an exact solve.

use nalgebra::{DMatrix, Matrix3x2};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("Need at least {needed} calibration points, got {got}")]
    InsufficientPoints { needed: usize, got: usize },

    #[error("Calibration points are collinear or duplicated")]
    Degenerate,
}

/// One paired measurement: where a reference mark sits in the camera frame
/// and where the robot found it.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CalibrationPoint {
    pub camera: (f64, f64),
    pub robot: (f64, f64),
}

/// Residual of one calibration point under a fitted transform.
#[derive(Debug, Clone, Copy)]
pub struct PointResidual {
    pub camera: (f64, f64),
    pub expected: (f64, f64),
    pub mapped: (f64, f64),
    pub error: f64,
}

/// Fitted 3×2 coefficient matrix mapping `[x, y, 1] · T` to robot space.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineTransform {
    coefficients: Matrix3x2<f64>,
}

impl AffineTransform {
    /// Fit the transform from calibration pairs.
    ///
    /// # Errors
    ///
    /// * [`CalibrationError::InsufficientPoints`] with fewer than 3 pairs.
    /// * [`CalibrationError::Degenerate`] when the camera points are
    ///   collinear or duplicated (rank-deficient design matrix). Never
    ///   returns a transform full of NaN.
    pub fn fit(points: &[CalibrationPoint]) -> Result<Self, CalibrationError> {
        if points.len() < 3 {
            return Err(CalibrationError::InsufficientPoints {
                needed: 3,
                got: points.len(),
            });
        }

        let design = DMatrix::from_fn(points.len(), 3, |r, c| match c {
            0 => points[r].camera.0,
            1 => points[r].camera.1,
            _ => 1.0,
        });
        let targets = DMatrix::from_fn(points.len(), 2, |r, c| match c {
            0 => points[r].robot.0,
            _ => points[r].robot.1,
        });

        let svd = design.svd(true, true);
        // Singular values are sorted descending; a vanishing third value
        // means the camera points do not span the plane.
        let tol = svd.singular_values[0] * 1e-9;
        if svd.rank(tol) < 3 {
            return Err(CalibrationError::Degenerate);
        }
        let solution = svd.solve(&targets, tol).map_err(|_| CalibrationError::Degenerate)?;

        Ok(Self {
            coefficients: Matrix3x2::from_iterator(solution.iter().copied()),
        })
    }

    /// Map a full-frame camera pixel to robot coordinates. Infallible for
    /// any fitted transform; the output is not clamped.
    #[must_use]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let t = &self.coefficients;
        (
            x * t[(0, 0)] + y * t[(1, 0)] + t[(2, 0)],
            x * t[(0, 1)] + y * t[(1, 1)] + t[(2, 1)],
        )
    }

    /// Build a transform from known coefficients, e.g. a previously fitted
    /// and verified production calibration. Rows are the x, y and constant
    /// contributions, each as (robot x, robot y).
    #[must_use]
    pub fn from_coefficients(rows: [[f64; 2]; 3]) -> Self {
        Self {
            coefficients: Matrix3x2::new(
                rows[0][0], rows[0][1], rows[1][0], rows[1][1], rows[2][0], rows[2][1],
            ),
        }
    }

    /// Column-major coefficients as `[[row x], [row y], [row 1]]`, each row
    /// holding the (robot x, robot y) contribution. For reporting.
    #[must_use]
    pub fn coefficients(&self) -> [[f64; 2]; 3] {
        let t = &self.coefficients;
        [
            [t[(0, 0)], t[(0, 1)]],
            [t[(1, 0)], t[(1, 1)]],
            [t[(2, 0)], t[(2, 1)]],
        ]
    }

    /// Per-point reprojection errors, for calibration verification.
    #[must_use]
    pub fn residuals(&self, points: &[CalibrationPoint]) -> Vec<PointResidual> {
        points
            .iter()
            .map(|p| {
                let mapped = self.apply(p.camera.0, p.camera.1);
                let (dx, dy) = (mapped.0 - p.robot.0, mapped.1 - p.robot.1);
                PointResidual {
                    camera: p.camera,
                    expected: p.robot,
                    mapped,
                    error: (dx * dx + dy * dy).sqrt(),
                }
            })
            .collect()
    }
}
