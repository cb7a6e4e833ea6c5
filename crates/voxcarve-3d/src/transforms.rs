use glam::{DMat3, DQuat, DVec3};

/// Compute the rotation matrix of an axis-angle (Rodrigues) vector.
///
/// The direction of `axis_angle` is the rotation axis and its norm the angle in radians.
/// A zero vector maps to the identity.
///
/// # Arguments
///
/// * `axis_angle` - The rotation vector.
///
/// # Returns
///
/// The rotation matrix.
///
/// Example:
///
/// ```
/// use glam::DVec3;
/// use voxcarve_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let rotation = axis_angle_to_rotation_matrix(DVec3::new(std::f64::consts::FRAC_PI_2, 0.0, 0.0));
/// let y = rotation * DVec3::Y;
/// assert!((y - DVec3::Z).length() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(axis_angle: DVec3) -> DMat3 {
    let angle = axis_angle.length();
    if angle < 1e-12 {
        return DMat3::IDENTITY;
    }
    DMat3::from_axis_angle(axis_angle / angle, angle)
}

/// Compute the axis-angle vector of a rotation matrix.
///
/// The returned angle lies in `[0, pi]`. Rotations by half a turn are handled through
/// the quaternion form, which stays well conditioned there.
pub fn rotation_matrix_to_axis_angle(rotation: &DMat3) -> DVec3 {
    let mut q = DQuat::from_mat3(rotation).normalize();

    // keep the scalar part non-negative so the angle is in [0, pi]
    if q.w < 0.0 {
        q = -q;
    }

    let sin_half = DVec3::new(q.x, q.y, q.z).length();
    if sin_half < 1e-12 {
        return DVec3::ZERO;
    }

    let angle = 2.0 * sin_half.atan2(q.w);
    DVec3::new(q.x, q.y, q.z) * (angle / sin_half)
}

/// Compose two axis-angle rotations: `log(R(first) * R(second))`.
pub fn compose_axis_angle(first: DVec3, second: DVec3) -> DVec3 {
    let rotation = axis_angle_to_rotation_matrix(first) * axis_angle_to_rotation_matrix(second);
    rotation_matrix_to_axis_angle(&rotation)
}
