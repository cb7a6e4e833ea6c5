//! Silhouette carving.
//!
//! Two monotone passes remove voxels inconsistent with a calibrated view: clipping
//! against the frustum spanned by the silhouette's bounding box, and projecting every
//! occupied voxel into the silhouette mask.

use glam::{DMat3, DVec2, DVec3};
use voxcarve_image::{ColorImage, Image, ImageSize};

use crate::{
    camera::{CameraIntrinsic, CameraModel},
    pose::Pose,
    volume::{pack_rgb, VoxelVolume},
};

/// Errors raised by the carving passes.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CarvingError {
    /// The color frame and the mask must cover the same pixels.
    #[error("Mask size {mask} does not match the frame size {frame}")]
    SizeMismatch {
        /// Size of the silhouette mask.
        mask: ImageSize,
        /// Size of the color frame.
        frame: ImageSize,
    },
}

/// Axis-aligned bounding box of the non-zero pixels of a mask.
///
/// `width` and `height` count pixels, so the last covered column is `x + width - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingRect {
    /// Left-most column.
    pub x: usize,
    /// Top-most row.
    pub y: usize,
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

/// Compute the bounding box of the non-zero pixels of a mask.
///
/// Returns `None` when the mask is empty.
pub fn mask_bounding_rect(mask: &Image<u8, 1>) -> Option<BoundingRect> {
    let cols = mask.cols();
    if cols == 0 {
        return None;
    }

    let (mut x_min, mut y_min) = (usize::MAX, usize::MAX);
    let (mut x_max, mut y_max) = (0, 0);
    for (y, row) in mask.as_slice().chunks_exact(cols).enumerate() {
        let Some(first) = row.iter().position(|&v| v != 0) else {
            continue;
        };
        let last = row.iter().rposition(|&v| v != 0).unwrap_or(first);
        x_min = x_min.min(first);
        x_max = x_max.max(last);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if x_min == usize::MAX {
        return None;
    }

    Some(BoundingRect {
        x: x_min,
        y: y_min,
        width: x_max - x_min + 1,
        height: y_max - y_min + 1,
    })
}

/// A half-space `normal · p >= offset`. Voxels outside it are carved.
///
/// The normal needs not be unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    /// Plane normal pointing to the kept side.
    pub normal: DVec3,
    /// Signed offset, `normal · q` for any point `q` on the plane.
    pub offset: f64,
}

impl ClipPlane {
    /// Plane through `origin` with the given normal.
    pub fn through(origin: DVec3, normal: DVec3) -> Self {
        Self {
            normal,
            offset: normal.dot(origin),
        }
    }

    /// Whether `point` lies on the kept side.
    #[inline]
    pub fn contains(&self, point: DVec3) -> bool {
        self.normal.dot(point) >= self.offset
    }
}

/// Remove every occupied voxel whose center `c` has `normal · c < offset`.
///
/// # Returns
///
/// The number of voxels removed.
pub fn carve_clip_plane(volume: &mut VoxelVolume, plane: &ClipPlane) -> usize {
    volume.retain(|center, _| plane.contains(center))
}

/// The four side planes of the viewing frustum through a pixel rectangle.
///
/// The rectangle corners `(x, y)`, `(x, y+h+1)`, `(x+w+1, y)` and `(x+w+1, y+h+1)` are
/// back-projected through `K⁻¹` and the inverse pose; each side plane contains the camera
/// center and two corner rays. Normals point toward the image interior, ordered as
/// left, right, top, bottom.
pub fn frustum_planes(
    pose: &Pose,
    intrinsic: &CameraIntrinsic,
    rect: &BoundingRect,
) -> [ClipPlane; 4] {
    let extrinsic = pose.camera_to_world();
    let origin = extrinsic.transform_point(DVec3::ZERO);

    let x0 = rect.x as f64;
    let y0 = rect.y as f64;
    let x1 = (rect.x + rect.width + 1) as f64;
    let y1 = (rect.y + rect.height + 1) as f64;

    let ray = |u: f64, v: f64| extrinsic.transform_vector(intrinsic.unproject(DVec2::new(u, v)));
    let c00 = ray(x0, y0);
    let c01 = ray(x0, y1);
    let c10 = ray(x1, y0);
    let c11 = ray(x1, y1);

    [
        ClipPlane::through(origin, c01.cross(c00)),
        ClipPlane::through(origin, c10.cross(c11)),
        ClipPlane::through(origin, c00.cross(c10)),
        ClipPlane::through(origin, c11.cross(c01)),
    ]
}

/// Clip the volume against the frustum spanned by the mask's bounding box.
///
/// Lens distortion is ignored here; the mask pass accounts for it. An empty mask leaves
/// the volume untouched.
///
/// # Returns
///
/// The number of voxels removed.
pub fn carve_frustum(
    volume: &mut VoxelVolume,
    pose: &Pose,
    intrinsic: &CameraIntrinsic,
    mask: &Image<u8, 1>,
) -> usize {
    let Some(rect) = mask_bounding_rect(mask) else {
        log::debug!("empty mask, skipping frustum clipping");
        return 0;
    };

    frustum_planes(pose, intrinsic, &rect)
        .iter()
        .map(|plane| carve_clip_plane(volume, plane))
        .sum()
}

/// Pixel under a projected point, or `None` when it falls outside the image.
#[inline]
fn pixel_coords(pixel: DVec2, size: ImageSize) -> Option<(usize, usize)> {
    let x = pixel.x.floor();
    let y = pixel.y.floor();
    if !(x >= 0.0 && y >= 0.0 && x < size.width as f64 && y < size.height as f64) {
        return None;
    }
    Some((x as usize, y as usize))
}

/// Project a voxel center into the mask. `None` means it is not seen by the camera.
#[inline]
fn project_into(
    pose: &Pose,
    rotation: &DMat3,
    camera: &CameraModel,
    center: DVec3,
    size: ImageSize,
) -> Option<(usize, usize)> {
    let point = *rotation * center + pose.translation;
    camera
        .project(point)
        .and_then(|pixel| pixel_coords(pixel, size))
}

/// Remove every occupied voxel whose projection is not on the silhouette.
///
/// Voxels projecting outside the image, or lying behind the camera, are removed as well.
///
/// # Returns
///
/// The number of voxels removed.
pub fn carve_mask(
    volume: &mut VoxelVolume,
    pose: &Pose,
    camera: &CameraModel,
    mask: &Image<u8, 1>,
) -> usize {
    let rotation = pose.rotation_matrix();
    let size = mask.size();
    let cols = mask.cols();
    let data = mask.as_slice();

    volume.retain(
        |center, _| match project_into(pose, &rotation, camera, center, size) {
            Some((x, y)) => data[y * cols + x] != 0,
            None => false,
        },
    )
}

/// Same as [`carve_mask`], additionally recoloring every surviving voxel.
///
/// Survivors take the color of the frame pixel they project onto, stored in RGB order
/// whatever the frame's channel order.
///
/// # Errors
///
/// The frame and the mask must have the same size.
pub fn carve_mask_color(
    volume: &mut VoxelVolume,
    pose: &Pose,
    camera: &CameraModel,
    mask: &Image<u8, 1>,
    frame: &ColorImage,
) -> Result<usize, CarvingError> {
    if mask.size() != frame.size() {
        return Err(CarvingError::SizeMismatch {
            mask: mask.size(),
            frame: frame.size(),
        });
    }

    let rotation = pose.rotation_matrix();
    let size = mask.size();
    let cols = mask.cols();
    let data = mask.as_slice();

    Ok(volume.retain(|center, color| {
        let Some((x, y)) = project_into(pose, &rotation, camera, center, size) else {
            return false;
        };
        if data[y * cols + x] == 0 {
            return false;
        }
        if let Some(rgb) = frame.rgb(x, y) {
            *color = pack_rgb(rgb);
        }
        true
    }))
}

/// Number of voxels removed by each pass of a [`CarvingEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CarveStats {
    /// Removed by frustum clipping.
    pub frustum: usize,
    /// Removed by mask projection.
    pub mask: usize,
}

impl CarveStats {
    /// Total number of voxels removed.
    pub fn total(&self) -> usize {
        self.frustum + self.mask
    }
}

/// Applies the configured carving passes of one camera to a volume.
#[derive(Debug, Clone)]
pub struct CarvingEngine {
    camera: CameraModel,
    frustum: bool,
    color: bool,
}

impl CarvingEngine {
    /// Mask carving with color transfer and no frustum clipping.
    pub fn new(camera: CameraModel) -> Self {
        Self {
            camera,
            frustum: false,
            color: true,
        }
    }

    /// Enable or disable the frustum clipping pass.
    pub fn with_frustum(mut self, frustum: bool) -> Self {
        self.frustum = frustum;
        self
    }

    /// Enable or disable copying frame colors into surviving voxels.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// The camera the engine projects through.
    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    /// Carve the volume with one observation.
    ///
    /// # Arguments
    ///
    /// * `volume` - The volume to carve in place.
    /// * `pose` - Canonical marker pose in the camera frame.
    /// * `mask` - Silhouette of the object, non-zero on the object.
    /// * `frame` - The color frame the mask was computed from.
    pub fn carve(
        &self,
        volume: &mut VoxelVolume,
        pose: &Pose,
        mask: &Image<u8, 1>,
        frame: &ColorImage,
    ) -> Result<CarveStats, CarvingError> {
        let mut stats = CarveStats::default();

        if self.frustum {
            stats.frustum = carve_frustum(volume, pose, &self.camera.intrinsic, mask);
        }

        stats.mask = if self.color {
            carve_mask_color(volume, pose, &self.camera, mask, frame)?
        } else {
            carve_mask(volume, pose, &self.camera, mask)
        };

        log::debug!(
            "carved {} voxels (frustum {}, mask {})",
            stats.total(),
            stats.frustum,
            stats.mask
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{unpack_rgb, VolumeError};
    use voxcarve_image::ImageError;

    const SIZE: usize = 100;

    /// A camera 2m in front of the volume looking down +z, so the volume fills the
    /// central part of a 100x100 image.
    fn setup() -> (CameraModel, Pose) {
        let camera = CameraModel::pinhole(CameraIntrinsic::new(100.0, 100.0, 50.0, 50.0));
        let pose = Pose::new(DVec3::new(0.0, 0.0, 2.0), DVec3::ZERO);
        (camera, pose)
    }

    fn rect_mask(x0: usize, x1: usize, y0: usize, y1: usize) -> Result<Image<u8, 1>, ImageError> {
        let mut mask = Image::<u8, 1>::from_size_val([SIZE, SIZE].into(), 0)?;
        for y in y0..=y1 {
            for x in x0..=x1 {
                mask.set_pixel(x, y, [255])?;
            }
        }
        Ok(mask)
    }

    #[test]
    fn test_bounding_rect() -> Result<(), ImageError> {
        let mask = rect_mask(10, 19, 30, 34)?;
        assert_eq!(
            mask_bounding_rect(&mask),
            Some(BoundingRect {
                x: 10,
                y: 30,
                width: 10,
                height: 5
            })
        );

        let empty = Image::<u8, 1>::from_size_val([4, 4].into(), 0)?;
        assert_eq!(mask_bounding_rect(&empty), None);
        Ok(())
    }

    #[test]
    fn test_clip_plane_removes_negative_side() -> Result<(), VolumeError> {
        let mut volume = VoxelVolume::new(8, [1.0, 1.0, 1.0])?;
        let plane = ClipPlane::through(DVec3::ZERO, DVec3::new(0.0, 0.0, 2.0));
        let removed = carve_clip_plane(&mut volume, &plane);
        assert_eq!(removed, 256);
        for (center, _) in volume.occupied_voxels() {
            assert!(center.z > 0.0);
        }
        Ok(())
    }

    #[test]
    fn test_frustum_keeps_exactly_the_voxels_inside() -> Result<(), Box<dyn std::error::Error>> {
        let (camera, pose) = setup();
        let mut volume = VoxelVolume::new(16, [1.0, 1.0, 1.0])?;
        let before = volume.clone();

        let mask = rect_mask(40, 59, 45, 55)?;
        let removed = carve_frustum(&mut volume, &pose, &camera.intrinsic, &mask);
        assert!(removed > 0);

        // frustum corners are (40, 45) and (40 + 20 + 1, 45 + 11 + 1)
        let n = volume.resolution();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    assert!(before.is_occupied(i, j, k));
                    let pixel = camera
                        .project(pose.transform_point(volume.center(i, j, k)))
                        .ok_or("voxel behind the camera")?;
                    let inside = (40.0..=61.0).contains(&pixel.x)
                        && (45.0..=57.0).contains(&pixel.y);
                    assert_eq!(volume.is_occupied(i, j, k), inside, "voxel {i} {j} {k}");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_frustum_with_empty_mask_is_noop() -> Result<(), Box<dyn std::error::Error>> {
        let (camera, pose) = setup();
        let mut volume = VoxelVolume::new(4, [1.0, 1.0, 1.0])?;
        let mask = Image::<u8, 1>::from_size_val([SIZE, SIZE].into(), 0)?;
        assert_eq!(carve_frustum(&mut volume, &pose, &camera.intrinsic, &mask), 0);
        assert_eq!(volume.occupied_count(), 64);
        Ok(())
    }

    #[test]
    fn test_full_mask_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let (camera, pose) = setup();
        let mut volume = VoxelVolume::new(16, [0.5, 0.5, 0.5])?;
        let mask = Image::<u8, 1>::from_size_val([SIZE, SIZE].into(), 255)?;

        assert_eq!(carve_mask(&mut volume, &pose, &camera, &mask), 0);
        assert_eq!(carve_mask(&mut volume, &pose, &camera, &mask), 0);
        assert_eq!(volume.occupied_count(), volume.len());
        Ok(())
    }

    #[test]
    fn test_out_of_view_voxels_are_removed() -> Result<(), Box<dyn std::error::Error>> {
        let camera = CameraModel::pinhole(CameraIntrinsic::new(100.0, 100.0, 50.0, 50.0));
        // close enough that the volume overflows the image
        let pose = Pose::new(DVec3::new(0.0, 0.0, 0.8), DVec3::ZERO);
        let mut volume = VoxelVolume::new(16, [1.0, 1.0, 1.0])?;
        let mask = Image::<u8, 1>::from_size_val([SIZE, SIZE].into(), 255)?;

        let removed = carve_mask(&mut volume, &pose, &camera, &mask);
        assert!(removed > 0);
        for (center, _) in volume.occupied_voxels() {
            let pixel = camera
                .project(pose.transform_point(center))
                .ok_or("voxel behind the camera")?;
            assert!(pixel.x >= 0.0 && pixel.x < SIZE as f64);
            assert!(pixel.y >= 0.0 && pixel.y < SIZE as f64);
        }
        Ok(())
    }

    #[test]
    fn test_voxels_behind_camera_are_removed() -> Result<(), Box<dyn std::error::Error>> {
        let camera = CameraModel::pinhole(CameraIntrinsic::new(1.0, 1.0, 50.0, 50.0));
        // the camera sits inside the volume
        let pose = Pose::new(DVec3::ZERO, DVec3::ZERO);
        let mut volume = VoxelVolume::new(4, [1.0, 1.0, 1.0])?;
        let mask = Image::<u8, 1>::from_size_val([SIZE, SIZE].into(), 255)?;

        carve_mask(&mut volume, &pose, &camera, &mask);
        for (center, _) in volume.occupied_voxels() {
            assert!(center.z > 0.0);
        }
        assert_eq!(volume.occupied_count(), 32);
        Ok(())
    }

    #[test]
    fn test_carving_is_monotone() -> Result<(), Box<dyn std::error::Error>> {
        let (camera, pose) = setup();
        let mut volume = VoxelVolume::new(16, [1.0, 1.0, 1.0])?;
        let masks = [
            rect_mask(30, 70, 30, 70)?,
            rect_mask(0, 99, 0, 99)?,
            rect_mask(45, 80, 20, 60)?,
        ];

        let mut previous = volume.occupancy().to_vec();
        for mask in masks.iter() {
            carve_frustum(&mut volume, &pose, &camera.intrinsic, mask);
            carve_mask(&mut volume, &pose, &camera, mask);
            for (before, after) in previous.iter().zip(volume.occupancy()) {
                assert!(*before || !*after);
            }
            previous = volume.occupancy().to_vec();
        }
        Ok(())
    }

    #[test]
    fn test_color_carving_normalizes_channel_order() -> Result<(), Box<dyn std::error::Error>> {
        let (camera, pose) = setup();
        let mask = Image::<u8, 1>::from_size_val([SIZE, SIZE].into(), 255)?;
        let bgr = ColorImage::from_bgr(Image::<u8, 3>::new(
            [SIZE, SIZE].into(),
            [30u8, 20, 10].repeat(SIZE * SIZE),
        )?);

        let mut volume = VoxelVolume::new(4, [0.5, 0.5, 0.5])?;
        carve_mask_color(&mut volume, &pose, &camera, &mask, &bgr)?;
        assert_eq!(volume.occupied_count(), 64);
        for &color in volume.colors() {
            assert_eq!(unpack_rgb(color), [10, 20, 30]);
        }

        let small = ColorImage::from_size_rgb([2, 2].into(), [0, 0, 0])?;
        assert!(matches!(
            carve_mask_color(&mut volume, &pose, &camera, &mask, &small),
            Err(CarvingError::SizeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_engine_runs_configured_passes() -> Result<(), Box<dyn std::error::Error>> {
        let (camera, pose) = setup();
        let frame = ColorImage::from_size_rgb([SIZE, SIZE].into(), [1, 2, 3])?;
        let mask = rect_mask(40, 60, 40, 60)?;

        let mut with_frustum = VoxelVolume::new(16, [1.0, 1.0, 1.0])?;
        let stats = CarvingEngine::new(camera)
            .with_frustum(true)
            .carve(&mut with_frustum, &pose, &mask, &frame)?;
        assert!(stats.frustum > 0);

        let mut mask_only = VoxelVolume::new(16, [1.0, 1.0, 1.0])?;
        let stats = CarvingEngine::new(camera)
            .with_color(false)
            .carve(&mut mask_only, &pose, &mask, &frame)?;
        assert_eq!(stats.frustum, 0);
        assert!(stats.mask > 0);
        assert!(mask_only.colors().iter().all(|&c| c == crate::volume::WHITE));
        Ok(())
    }
}
