use std::path::Path;

use serde::{Deserialize, Serialize};
use voxcarve_3d::camera::{CameraIntrinsic, CameraModel, PolynomialDistortion};
use voxcarve_image::ImageSize;

use crate::error::IoError;

/// Intrinsic calibration of a camera, as produced by OpenCV's calibration tools.
///
/// ```json
/// {
///   "camera_matrix": [[fx, 0, cx], [0, fy, cy], [0, 0, 1]],
///   "distortion_coefficients": [k1, k2, p1, p2, k3],
///   "image_width": 640,
///   "image_height": 480
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// The 3x3 intrinsic matrix in row-major order.
    pub camera_matrix: [[f64; 3]; 3],
    /// Distortion coefficients in OpenCV order.
    #[serde(default)]
    pub distortion_coefficients: Vec<f64>,
    /// Width of the calibrated images.
    #[serde(default)]
    pub image_width: Option<usize>,
    /// Height of the calibrated images.
    #[serde(default)]
    pub image_height: Option<usize>,
}

impl Calibration {
    /// Build the camera model described by the calibration.
    pub fn camera_model(&self) -> Result<CameraModel, IoError> {
        let intrinsic = CameraIntrinsic::from_matrix(&self.camera_matrix)?;
        let distortion = PolynomialDistortion::from_coefficients(&self.distortion_coefficients)?;
        Ok(CameraModel::with_distortion(intrinsic, distortion))
    }

    /// The calibrated image size, when recorded.
    pub fn image_size(&self) -> Option<ImageSize> {
        Some(ImageSize {
            width: self.image_width?,
            height: self.image_height?,
        })
    }
}

/// Read a calibration file.
///
/// # Arguments
///
/// * `file_path` - Path to the JSON calibration file.
pub fn read_calibration(file_path: impl AsRef<Path>) -> Result<Calibration, IoError> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let json = std::fs::read_to_string(file_path)?;
    let calibration: Calibration = serde_json::from_str(&json)?;

    // validate eagerly so a bad file fails before any frame is read
    calibration.camera_model()?;

    log::debug!("loaded calibration from {}", file_path.display());

    Ok(calibration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DVec3;

    const CALIBRATION: &str = r#"{
        "camera_matrix": [[600.0, 0.0, 320.0], [0.0, 610.0, 240.0], [0.0, 0.0, 1.0]],
        "distortion_coefficients": [0.1, -0.05, 0.0, 0.0, 0.01],
        "image_width": 640,
        "image_height": 480
    }"#;

    #[test]
    fn test_read_calibration() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("camera.json");
        std::fs::write(&path, CALIBRATION)?;

        let calibration = read_calibration(&path)?;
        assert_eq!(calibration.image_size(), Some([640, 480].into()));

        let camera = calibration.camera_model()?;
        assert_relative_eq!(camera.intrinsic.fy, 610.0);
        assert_relative_eq!(camera.distortion.k3, 0.01);

        // the principal ray is not affected by radial distortion
        let pixel = camera.project(DVec3::new(0.0, 0.0, 1.0)).ok_or("behind camera")?;
        assert_relative_eq!(pixel.x, 320.0);
        assert_relative_eq!(pixel.y, 240.0);

        Ok(())
    }

    #[test]
    fn test_invalid_calibration() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("camera.json");

        std::fs::write(
            &path,
            r#"{ "camera_matrix": [[600, 0, 320], [0, 600, 240], [0, 0, 1]],
                 "distortion_coefficients": [0.1, 0.2, 0.3] }"#,
        )?;
        assert!(matches!(
            read_calibration(&path),
            Err(IoError::InvalidCalibration(_))
        ));

        std::fs::write(&path, r#"{ "camera_matrix": [1, 2, 3] }"#)?;
        assert!(matches!(
            read_calibration(&path),
            Err(IoError::CalibrationParseError(_))
        ));

        assert!(matches!(
            read_calibration(dir.path().join("missing.json")),
            Err(IoError::FileDoesNotExist(_))
        ));

        Ok(())
    }
}
