//! Camera models for projecting voxel centers into frames.
use glam::{DMat3, DVec2, DVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for camera operations.
#[derive(Debug, Error, PartialEq)]
pub enum CameraError {
    /// Invalid camera intrinsics matrix
    #[error("Invalid camera intrinsics matrix: {0}")]
    InvalidIntrinsics(String),

    /// Invalid distortion parameters
    #[error("Invalid distortion parameters: expected 0, 4, 5 or 8 coefficients, got {0}")]
    InvalidDistortion(usize),
}

/// Represents the intrinsic parameters of a pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsic {
    /// Focal length in x direction
    pub fx: f64,
    /// Focal length in y direction
    pub fy: f64,
    /// Principal point x coordinate
    pub cx: f64,
    /// Principal point y coordinate
    pub cy: f64,
}

impl CameraIntrinsic {
    /// Create camera intrinsics from focal lengths and principal point.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Create camera intrinsics from a row-major 3x3 intrinsics matrix.
    ///
    /// The matrix must have the form `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]` with
    /// non-zero, finite focal lengths.
    pub fn from_matrix(k: &[[f64; 3]; 3]) -> Result<Self, CameraError> {
        if k[0][1] != 0.0 || k[1][0] != 0.0 || k[2][0] != 0.0 || k[2][1] != 0.0 || k[2][2] != 1.0 {
            return Err(CameraError::InvalidIntrinsics(
                "matrix must have form [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]".to_string(),
            ));
        }

        let (fx, fy) = (k[0][0], k[1][1]);
        if fx == 0.0 || fy == 0.0 || !fx.is_finite() || !fy.is_finite() {
            return Err(CameraError::InvalidIntrinsics(format!(
                "focal lengths must be finite and non-zero, got ({fx}, {fy})"
            )));
        }

        Ok(Self {
            fx,
            fy,
            cx: k[0][2],
            cy: k[1][2],
        })
    }

    /// The intrinsics matrix `K`.
    pub fn matrix(&self) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(self.fx, 0.0, 0.0),
            DVec3::new(0.0, self.fy, 0.0),
            DVec3::new(self.cx, self.cy, 1.0),
        )
    }

    /// Back-project a pixel to the ray `K⁻¹ [u, v, 1]` on the plane `z = 1`.
    pub fn unproject(&self, pixel: DVec2) -> DVec3 {
        DVec3::new(
            (pixel.x - self.cx) / self.fx,
            (pixel.y - self.cy) / self.fy,
            1.0,
        )
    }

    /// Map normalized image coordinates to pixels.
    pub fn to_pixel(&self, normalized: DVec2) -> DVec2 {
        DVec2::new(
            self.fx * normalized.x + self.cx,
            self.fy * normalized.y + self.cy,
        )
    }
}

/// Represents polynomial distortion parameters using the Brown-Conrady model.
///
/// The radial part uses the rational form
/// `(1 + k1 r² + k2 r⁴ + k3 r⁶) / (1 + k4 r² + k5 r⁴ + k6 r⁶)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PolynomialDistortion {
    /// Radial distortion coefficients
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
    /// Tangential distortion coefficients
    pub p1: f64,
    pub p2: f64,
}

impl PolynomialDistortion {
    /// Create distortion parameters from an OpenCV style coefficient list.
    ///
    /// The order is `k1, k2, p1, p2[, k3[, k4, k5, k6]]`; an empty list means no distortion.
    pub fn from_coefficients(coefficients: &[f64]) -> Result<Self, CameraError> {
        let mut d = Self::default();
        match coefficients {
            [] => {}
            [k1, k2, p1, p2] => {
                (d.k1, d.k2, d.p1, d.p2) = (*k1, *k2, *p1, *p2);
            }
            [k1, k2, p1, p2, k3] => {
                (d.k1, d.k2, d.p1, d.p2, d.k3) = (*k1, *k2, *p1, *p2, *k3);
            }
            [k1, k2, p1, p2, k3, k4, k5, k6] => {
                (d.k1, d.k2, d.p1, d.p2, d.k3) = (*k1, *k2, *p1, *p2, *k3);
                (d.k4, d.k5, d.k6) = (*k4, *k5, *k6);
            }
            _ => return Err(CameraError::InvalidDistortion(coefficients.len())),
        }
        Ok(d)
    }

    /// Check if there is any distortion.
    pub fn has_distortion(&self) -> bool {
        *self != Self::default()
    }

    /// Apply the distortion to normalized image coordinates.
    pub fn distort(&self, point: DVec2) -> DVec2 {
        let (x, y) = (point.x, point.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let kr = (1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6)
            / (1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6);

        let xy2 = 2.0 * x * y;
        DVec2::new(
            x * kr + self.p1 * xy2 + self.p2 * (r2 + 2.0 * x * x),
            y * kr + self.p1 * (r2 + 2.0 * y * y) + self.p2 * xy2,
        )
    }
}

/// A complete camera model with intrinsics and distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    /// Camera intrinsics
    pub intrinsic: CameraIntrinsic,
    /// Distortion parameters
    #[serde(default)]
    pub distortion: PolynomialDistortion,
}

impl CameraModel {
    /// Create a camera model without distortion.
    pub fn pinhole(intrinsic: CameraIntrinsic) -> Self {
        Self {
            intrinsic,
            distortion: PolynomialDistortion::default(),
        }
    }

    /// Create a camera model with distortion.
    pub fn with_distortion(intrinsic: CameraIntrinsic, distortion: PolynomialDistortion) -> Self {
        Self {
            intrinsic,
            distortion,
        }
    }

    /// Project a point given in camera coordinates to pixel coordinates.
    ///
    /// Returns `None` for points on or behind the image plane (`z <= 0`).
    pub fn project(&self, point: DVec3) -> Option<DVec2> {
        if point.z <= 0.0 {
            return None;
        }
        let normalized = DVec2::new(point.x / point.z, point.y / point.z);
        let distorted = if self.distortion.has_distortion() {
            self.distortion.distort(normalized)
        } else {
            normalized
        };
        Some(self.intrinsic.to_pixel(distorted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_matrix() -> Result<(), CameraError> {
        let k = [[500.0, 0.0, 320.0], [0.0, 510.0, 240.0], [0.0, 0.0, 1.0]];
        let intrinsic = CameraIntrinsic::from_matrix(&k)?;
        assert_eq!(intrinsic, CameraIntrinsic::new(500.0, 510.0, 320.0, 240.0));

        let m = intrinsic.matrix();
        assert_eq!(m * DVec3::new(0.0, 0.0, 1.0), DVec3::new(320.0, 240.0, 1.0));

        let bad = [[0.0, 0.0, 320.0], [0.0, 510.0, 240.0], [0.0, 0.0, 1.0]];
        assert!(CameraIntrinsic::from_matrix(&bad).is_err());
        Ok(())
    }

    #[test]
    fn test_unproject_inverts_projection() {
        let camera = CameraModel::pinhole(CameraIntrinsic::new(400.0, 400.0, 100.0, 80.0));
        let point = DVec3::new(0.1, -0.05, 2.0);
        let pixel = camera.project(point).unwrap_or_default();
        let ray = camera.intrinsic.unproject(pixel);
        assert_relative_eq!(ray.x * 2.0, point.x, epsilon = 1e-12);
        assert_relative_eq!(ray.y * 2.0, point.y, epsilon = 1e-12);
    }

    #[test]
    fn test_behind_camera_is_not_projected() {
        let camera = CameraModel::pinhole(CameraIntrinsic::new(1.0, 1.0, 0.0, 0.0));
        assert_eq!(camera.project(DVec3::new(0.0, 0.0, -1.0)), None);
        assert_eq!(camera.project(DVec3::ZERO), None);
    }

    #[test]
    fn test_distortion_coefficients() -> Result<(), CameraError> {
        let d = PolynomialDistortion::from_coefficients(&[0.1, 0.01, 0.001, 0.002, 0.5])?;
        assert_eq!(d.k3, 0.5);
        assert_eq!(d.p2, 0.002);
        assert!(d.has_distortion());

        assert!(!PolynomialDistortion::from_coefficients(&[])?.has_distortion());
        assert_eq!(
            PolynomialDistortion::from_coefficients(&[0.1, 0.2]),
            Err(CameraError::InvalidDistortion(2))
        );
        Ok(())
    }

    #[test]
    fn test_radial_distortion_pushes_outward() -> Result<(), CameraError> {
        let d = PolynomialDistortion::from_coefficients(&[0.2, 0.0, 0.0, 0.0])?;
        let distorted = d.distort(DVec2::new(0.5, 0.0));
        assert_relative_eq!(distorted.x, 0.5 * (1.0 + 0.2 * 0.25));
        assert_relative_eq!(distorted.y, 0.0);

        // the center is a fixed point
        assert_eq!(d.distort(DVec2::ZERO), DVec2::ZERO);
        Ok(())
    }
}
