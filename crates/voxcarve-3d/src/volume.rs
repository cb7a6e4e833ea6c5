use glam::DVec3;
use rayon::prelude::*;

/// Opaque white, the color every voxel starts with.
pub const WHITE: u32 = 0x00FF_FFFF;

/// Pack an `[r, g, b]` triple as `r | g << 8 | b << 16`.
#[inline]
pub fn pack_rgb(rgb: [u8; 3]) -> u32 {
    rgb[0] as u32 | (rgb[1] as u32) << 8 | (rgb[2] as u32) << 16
}

/// Unpack a color produced by [`pack_rgb`].
#[inline]
pub fn unpack_rgb(color: u32) -> [u8; 3] {
    [
        (color & 0xFF) as u8,
        ((color >> 8) & 0xFF) as u8,
        ((color >> 16) & 0xFF) as u8,
    ]
}

/// Errors raised when a volume is configured with invalid parameters.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VolumeError {
    /// The resolution must be at least one voxel per axis.
    #[error("Volume resolution must be > 0, got {0}")]
    InvalidResolution(usize),

    /// The resolution does not fit in memory.
    #[error("Volume resolution {0} is too large")]
    ResolutionTooLarge(usize),

    /// The physical extents must be finite and strictly positive.
    #[error("Volume extents must be finite and > 0, got {0}")]
    InvalidExtent(DVec3),
}

/// Maps voxel indices to physical positions.
///
/// Indices may lie outside `[0, resolution)`; the mapping extends the lattice, which is
/// what surface extraction relies on when padding the volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeGeometry {
    resolution: usize,
    start: DVec3,
    voxel_size: DVec3,
}

impl VolumeGeometry {
    /// Center of voxel `(i, j, k)`: `start + (index + 0.5) * voxel_size` per axis.
    #[inline]
    pub fn center(&self, i: isize, j: isize, k: isize) -> DVec3 {
        self.start + (DVec3::new(i as f64, j as f64, k as f64) + 0.5) * self.voxel_size
    }

    /// Number of voxels per axis.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Edge lengths of a single voxel.
    pub fn voxel_size(&self) -> DVec3 {
        self.voxel_size
    }
}

/// A dense cubic occupancy grid with one packed RGB color per voxel.
///
/// The grid spans `extent` meters centered at the origin. Voxel `(i, j, k)` lives at the
/// linear index `k + N * (j + N * i)`, so every `i` owns one contiguous slab of `N²`
/// voxels. Occupancy only ever goes from `true` to `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelVolume {
    geometry: VolumeGeometry,
    extent: DVec3,
    occupancy: Vec<bool>,
    colors: Vec<u32>,
}

impl VoxelVolume {
    /// Create a fully occupied, white volume.
    ///
    /// # Arguments
    ///
    /// * `resolution` - Voxels per axis.
    /// * `extent` - Physical size `(Lx, Ly, Lz)` in meters.
    ///
    /// # Errors
    ///
    /// A zero resolution or non positive, non finite extents are rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use voxcarve_3d::volume::VoxelVolume;
    ///
    /// let volume = VoxelVolume::new(4, [0.1, 0.1, 0.05]).unwrap();
    /// assert_eq!(volume.len(), 64);
    /// assert_eq!(volume.occupied_count(), 64);
    /// ```
    pub fn new(resolution: usize, extent: [f64; 3]) -> Result<Self, VolumeError> {
        let extent = DVec3::from_array(extent);
        if resolution == 0 {
            return Err(VolumeError::InvalidResolution(resolution));
        }
        if !extent.is_finite() || extent.min_element() <= 0.0 {
            return Err(VolumeError::InvalidExtent(extent));
        }

        let len = resolution
            .checked_mul(resolution)
            .and_then(|n| n.checked_mul(resolution))
            .ok_or(VolumeError::ResolutionTooLarge(resolution))?;

        let geometry = VolumeGeometry {
            resolution,
            start: -extent / 2.0,
            voxel_size: extent / resolution as f64,
        };

        Ok(Self {
            geometry,
            extent,
            occupancy: vec![true; len],
            colors: vec![WHITE; len],
        })
    }

    /// Number of voxels per axis.
    #[inline]
    pub fn resolution(&self) -> usize {
        self.geometry.resolution
    }

    /// Physical size of the volume in meters.
    pub fn extent(&self) -> DVec3 {
        self.extent
    }

    /// Index to position mapping of the volume.
    pub fn geometry(&self) -> VolumeGeometry {
        self.geometry
    }

    /// Total number of voxels, `N³`.
    #[inline]
    pub fn len(&self) -> usize {
        self.occupancy.len()
    }

    /// Whether the volume holds no voxels. Never true for a constructed volume.
    pub fn is_empty(&self) -> bool {
        self.occupancy.is_empty()
    }

    /// Linear index of voxel `(i, j, k)`.
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        let n = self.resolution();
        k + n * (j + n * i)
    }

    /// Grid coordinates `(i, j, k)` of a linear index.
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let n = self.resolution();
        (index / (n * n), (index / n) % n, index % n)
    }

    /// Physical center of voxel `(i, j, k)`.
    #[inline]
    pub fn center(&self, i: usize, j: usize, k: usize) -> DVec3 {
        self.geometry.center(i as isize, j as isize, k as isize)
    }

    /// Occupancy flags in linear index order.
    pub fn occupancy(&self) -> &[bool] {
        &self.occupancy
    }

    /// Packed colors in linear index order. Only meaningful where occupied.
    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    /// Whether voxel `(i, j, k)` is occupied; out of range voxels are empty.
    #[inline]
    pub fn is_occupied(&self, i: usize, j: usize, k: usize) -> bool {
        let n = self.resolution();
        i < n && j < n && k < n && self.occupancy[self.index(i, j, k)]
    }

    /// Packed color of voxel `(i, j, k)`, if it is inside the grid.
    pub fn color(&self, i: usize, j: usize, k: usize) -> Option<u32> {
        let n = self.resolution();
        if i < n && j < n && k < n {
            Some(self.colors[self.index(i, j, k)])
        } else {
            None
        }
    }

    /// Number of voxels still occupied.
    pub fn occupied_count(&self) -> usize {
        self.occupancy.par_iter().filter(|&&o| o).count()
    }

    /// Remove a single voxel. Returns whether it was occupied before.
    pub fn remove(&mut self, i: usize, j: usize, k: usize) -> bool {
        if !self.is_occupied(i, j, k) {
            return false;
        }
        let index = self.index(i, j, k);
        self.occupancy[index] = false;
        true
    }

    /// Keep only the occupied voxels for which `keep` returns true.
    ///
    /// `keep` receives the voxel center and may update the voxel color. Unoccupied voxels
    /// are never visited. The work is split across x-slabs, each written by one task.
    ///
    /// # Returns
    ///
    /// The number of voxels removed.
    pub fn retain<F>(&mut self, keep: F) -> usize
    where
        F: Fn(DVec3, &mut u32) -> bool + Send + Sync,
    {
        let n = self.resolution();
        let geometry = self.geometry;
        let slab = n * n;

        self.occupancy
            .par_chunks_exact_mut(slab)
            .zip(self.colors.par_chunks_exact_mut(slab))
            .enumerate()
            .map(|(i, (occupancy, colors))| {
                let mut removed = 0;
                for (offset, (occupied, color)) in
                    occupancy.iter_mut().zip(colors.iter_mut()).enumerate()
                {
                    if !*occupied {
                        continue;
                    }
                    let (j, k) = (offset / n, offset % n);
                    let center = geometry.center(i as isize, j as isize, k as isize);
                    if !keep(center, color) {
                        *occupied = false;
                        removed += 1;
                    }
                }
                removed
            })
            .sum()
    }

    /// Centers and colors of all occupied voxels, in linear index order.
    ///
    /// This is the read-only view a viewer renders after each frame.
    pub fn occupied_voxels(&self) -> impl Iterator<Item = (DVec3, [u8; 3])> + '_ {
        self.occupancy
            .iter()
            .zip(self.colors.iter())
            .enumerate()
            .filter(|(_, (occupied, _))| **occupied)
            .map(move |(index, (_, &color))| {
                let (i, j, k) = self.coords(index);
                (self.center(i, j, k), unpack_rgb(color))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_rejects_invalid_configuration() {
        assert_eq!(
            VoxelVolume::new(0, [1.0, 1.0, 1.0]),
            Err(VolumeError::InvalidResolution(0))
        );
        assert!(matches!(
            VoxelVolume::new(4, [1.0, 0.0, 1.0]),
            Err(VolumeError::InvalidExtent(_))
        ));
        assert!(matches!(
            VoxelVolume::new(4, [1.0, f64::NAN, 1.0]),
            Err(VolumeError::InvalidExtent(_))
        ));
        assert!(matches!(
            VoxelVolume::new(4, [-1.0, 1.0, 1.0]),
            Err(VolumeError::InvalidExtent(_))
        ));
    }

    #[test]
    fn test_index_layout() -> Result<(), VolumeError> {
        let volume = VoxelVolume::new(4, [1.0, 1.0, 1.0])?;
        assert_eq!(volume.index(0, 0, 1), 1);
        assert_eq!(volume.index(0, 1, 0), 4);
        assert_eq!(volume.index(1, 0, 0), 16);
        assert_eq!(volume.coords(16 + 8 + 3), (1, 2, 3));
        assert!(volume.colors().iter().all(|&c| c == WHITE));
        Ok(())
    }

    #[test]
    fn test_centers_are_symmetric_about_origin() -> Result<(), VolumeError> {
        let volume = VoxelVolume::new(64, [0.1, 0.1, 0.05])?;
        let first = volume.center(0, 0, 0);
        let last = volume.center(63, 63, 63);
        assert_relative_eq!(first.x, -0.05 + 0.5 * 0.1 / 64.0, epsilon = 1e-12);
        assert_relative_eq!(first.z, -0.025 + 0.5 * 0.05 / 64.0, epsilon = 1e-12);
        assert_relative_eq!(first.x, -last.x, epsilon = 1e-12);
        assert_relative_eq!(first.y, -last.y, epsilon = 1e-12);
        assert_relative_eq!(first.z, -last.z, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_retain_is_monotone() -> Result<(), VolumeError> {
        let mut volume = VoxelVolume::new(8, [1.0, 1.0, 1.0])?;
        let removed = volume.retain(|c, _| c.x > 0.0);
        assert_eq!(removed, 256);
        assert_eq!(volume.occupied_count(), 256);

        // a predicate that would keep everything cannot bring voxels back
        let removed = volume.retain(|_, _| true);
        assert_eq!(removed, 0);
        assert_eq!(volume.occupied_count(), 256);
        assert!(!volume.is_occupied(0, 0, 0));
        assert!(volume.is_occupied(7, 0, 0));
        Ok(())
    }

    #[test]
    fn test_retain_updates_colors_and_snapshot() -> Result<(), VolumeError> {
        let mut volume = VoxelVolume::new(2, [1.0, 1.0, 1.0])?;
        volume.retain(|c, color| {
            *color = pack_rgb([10, 20, 30]);
            c.z > 0.0
        });

        let voxels = volume.occupied_voxels().collect::<Vec<_>>();
        assert_eq!(voxels.len(), 4);
        for (center, rgb) in voxels {
            assert_relative_eq!(center.z, 0.25);
            assert_eq!(rgb, [10, 20, 30]);
        }
        Ok(())
    }

    #[test]
    fn test_color_packing() {
        assert_eq!(pack_rgb([0x12, 0x34, 0x56]), 0x0056_3412);
        assert_eq!(unpack_rgb(0x0056_3412), [0x12, 0x34, 0x56]);
        assert_eq!(unpack_rgb(WHITE), [255, 255, 255]);
    }
}
