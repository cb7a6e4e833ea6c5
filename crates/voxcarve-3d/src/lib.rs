#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera model with polynomial distortion.
pub mod camera;

/// Silhouette carving of voxel volumes.
pub mod carving;

/// I/O utilities for reading and writing meshes.
pub mod io;

/// Iso-surface extraction from occupancy volumes.
pub mod marching_cubes;

/// Triangle mesh container.
pub mod mesh;

/// Rigid poses expressed as translation and axis-angle rotation.
pub mod pose;

/// 3D transforms algorithms.
pub mod transforms;

/// Dense occupancy and color volume.
pub mod volume;
