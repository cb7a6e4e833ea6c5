use glam::DVec3;
use serde::{Deserialize, Serialize};
use voxcarve_3d::pose::Pose;

/// Identifier of a fiducial marker within its dictionary.
pub type MarkerId = i32;

/// The pose of one detected marker in the camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    /// The marker identifier.
    pub id: MarkerId,
    /// Translation of the marker center in meters.
    pub translation: DVec3,
    /// Axis-angle rotation of the marker.
    pub rotation: DVec3,
}

impl MarkerObservation {
    /// Create a new observation.
    pub fn new(id: MarkerId, translation: DVec3, rotation: DVec3) -> Self {
        Self {
            id,
            translation,
            rotation,
        }
    }

    /// The observed marker pose.
    pub fn pose(&self) -> Pose {
        Pose::new(self.translation, self.rotation)
    }
}
