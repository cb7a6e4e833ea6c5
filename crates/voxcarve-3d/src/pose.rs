use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::transforms::axis_angle_to_rotation_matrix;

/// A rigid transform mapping world (canonical marker) coordinates to camera coordinates.
///
/// `x_cam = R(rotation) * x_world + translation`, with `rotation` an axis-angle vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation in meters.
    pub translation: DVec3,
    /// Axis-angle rotation in radians.
    pub rotation: DVec3,
}

impl Pose {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        translation: DVec3::ZERO,
        rotation: DVec3::ZERO,
    };

    /// Create a pose from a translation and an axis-angle rotation.
    pub fn new(translation: DVec3, rotation: DVec3) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The rotation as a matrix.
    pub fn rotation_matrix(&self) -> DMat3 {
        axis_angle_to_rotation_matrix(self.rotation)
    }

    /// Map a world point into the camera frame.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation_matrix() * point + self.translation
    }

    /// The extrinsic mapping camera coordinates back to the world: `Rᵀ (x - t)`.
    pub fn camera_to_world(&self) -> CameraToWorld {
        CameraToWorld {
            rotation: self.rotation_matrix().transpose(),
            translation: self.translation,
        }
    }

    /// The position of the camera center in world coordinates.
    pub fn camera_center(&self) -> DVec3 {
        self.camera_to_world().transform_point(DVec3::ZERO)
    }
}

/// Inverse of a [`Pose`], precomputed for repeated use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraToWorld {
    rotation: DMat3,
    translation: DVec3,
}

impl CameraToWorld {
    /// Map a camera point into the world frame.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation * (point - self.translation)
    }

    /// Rotate a camera direction into the world frame.
    pub fn transform_vector(&self, direction: DVec3) -> DVec3 {
        self.rotation * direction
    }
}
