//! Camera intrinsics and distortion handling.

use nalgebra::{Matrix3, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Errors from calibration validation.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("camera matrix contains non-finite entries")]
    NonFinite,

    #[error("focal lengths must be positive (fx = {fx}, fy = {fy})")]
    InvalidFocal { fx: f64, fy: f64 },

    #[error("camera matrix bottom row must be [0, 0, 1]")]
    InvalidBottomRow,

    #[error("unsupported distortion coefficient count {got} (expected 0, 4 or 5)")]
    UnsupportedDistortionLength { got: usize },
}

/// Validated camera intrinsics: pinhole matrix plus Brown-Conrady
/// distortion coefficients in `[k1, k2, p1, p2, k3]` order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Calibration {
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    skew: f64,
    dist: [f64; 5],
}

/// Fixed-point iterations for distortion inversion.
const UNDISTORT_ITERS: usize = 8;

impl Calibration {
    /// Validate a 3x3 camera matrix and a distortion coefficient vector.
    ///
    /// The vector may be empty (no distortion) or hold 4/5 coefficients;
    /// a 4-vector is padded with `k3 = 0`.
    pub fn new(matrix: Matrix3<f64>, dist_coeffs: &[f64]) -> Result<Self, CalibrationError> {
        if matrix.iter().any(|v| !v.is_finite()) || dist_coeffs.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite);
        }

        let fx = matrix[(0, 0)];
        let fy = matrix[(1, 1)];
        if fx <= 0.0 || fy <= 0.0 {
            return Err(CalibrationError::InvalidFocal { fx, fy });
        }

        let eps = 1e-9;
        if matrix[(1, 0)].abs() > eps
            || matrix[(2, 0)].abs() > eps
            || matrix[(2, 1)].abs() > eps
            || (matrix[(2, 2)] - 1.0).abs() > eps
        {
            return Err(CalibrationError::InvalidBottomRow);
        }

        let mut dist = [0.0f64; 5];
        match dist_coeffs.len() {
            0 => {}
            4 | 5 => dist[..dist_coeffs.len()].copy_from_slice(dist_coeffs),
            got => return Err(CalibrationError::UnsupportedDistortionLength { got }),
        }

        Ok(Self {
            fx,
            fy,
            cx: matrix[(0, 2)],
            cy: matrix[(1, 2)],
            skew: matrix[(0, 1)],
            dist,
        })
    }

    /// The camera matrix in standard form.
    pub fn camera_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    #[inline]
    pub fn distortion(&self) -> &[f64; 5] {
        &self.dist
    }

    /// Pixel coordinates to normalized camera coordinates (no distortion
    /// handling).
    #[inline]
    pub fn normalize(&self, p: Point2<f64>) -> Vector2<f64> {
        let y = (p.y - self.cy) / self.fy;
        let x = (p.x - self.cx - self.skew * y) / self.fx;
        Vector2::new(x, y)
    }

    /// Normalized camera coordinates to pixel coordinates.
    #[inline]
    pub fn denormalize(&self, n: Vector2<f64>) -> Point2<f64> {
        Point2::new(
            self.fx * n.x + self.skew * n.y + self.cx,
            self.fy * n.y + self.cy,
        )
    }

    /// Apply Brown-Conrady distortion to normalized coordinates.
    pub fn distort(&self, n: Vector2<f64>) -> Vector2<f64> {
        let [k1, k2, p1, p2, k3] = self.dist;
        let x = n.x;
        let y = n.y;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;
        let x_tan = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let y_tan = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

        Vector2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert the distortion by fixed-point iteration.
    pub fn undistort(&self, n_dist: Vector2<f64>) -> Vector2<f64> {
        if self.dist.iter().all(|&v| v == 0.0) {
            return n_dist;
        }

        let mut n = n_dist;
        for _ in 0..UNDISTORT_ITERS {
            let forward = self.distort(n);
            n -= forward - n_dist;
        }
        n
    }

    /// Pixel coordinates to undistorted normalized coordinates.
    #[inline]
    pub fn undistort_pixel(&self, p: Point2<f64>) -> Vector2<f64> {
        self.undistort(self.normalize(p))
    }
}
