//! Marching cubes over a binary occupancy volume.
//!
//! Every cube has eight neighbouring voxel centers as corners. A cube edge whose two
//! corners disagree on occupancy carries one vertex at its midpoint; the lookup tables
//! turn the corner configuration into triangles.

mod tables;

use glam::DVec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    mesh::TriangleMesh,
    volume::{unpack_rgb, VoxelVolume},
};
use tables::{EDGE_TABLE, TRIANGLE_TABLE};

/// Offsets of the eight cube corners; bit `c` of a configuration is corner `c`.
const CORNERS: [[isize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// Corner pairs of the twelve cube edges.
const EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [1, 2],
    [2, 3],
    [3, 0],
    [4, 5],
    [5, 6],
    [6, 7],
    [7, 4],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

/// Options of the surface extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarchingCubesConfig {
    /// Attach vertex and face colors taken from the occupied voxels.
    pub color: bool,
    /// Treat the outside of the grid as empty so that objects touching the boundary
    /// produce closed surfaces. When disabled only cubes strictly inside the grid are
    /// visited and a fully occupied volume yields no triangles.
    pub close_boundary: bool,
}

impl Default for MarchingCubesConfig {
    fn default() -> Self {
        Self {
            color: true,
            close_boundary: false,
        }
    }
}

/// Extract the boundary surface of the occupied voxels.
///
/// Triangles are wound counter-clockwise seen from the empty side, so their normals
/// point out of the object. Vertices are not welded.
///
/// # Arguments
///
/// * `volume` - The carved volume.
/// * `config` - Extraction options.
///
/// # Returns
///
/// The extracted triangle mesh.
///
/// # Examples
///
/// ```
/// use voxcarve_3d::marching_cubes::{extract_mesh, MarchingCubesConfig};
/// use voxcarve_3d::volume::VoxelVolume;
///
/// let volume = VoxelVolume::new(8, [1.0, 1.0, 1.0]).unwrap();
///
/// let inner = extract_mesh(&volume, &MarchingCubesConfig::default());
/// assert_eq!(inner.num_faces(), 0);
///
/// let closed = extract_mesh(
///     &volume,
///     &MarchingCubesConfig { color: false, close_boundary: true },
/// );
/// assert!(closed.num_faces() > 0);
/// ```
pub fn extract_mesh(volume: &VoxelVolume, config: &MarchingCubesConfig) -> TriangleMesh {
    let n = volume.resolution() as isize;
    let (first, last) = if config.close_boundary {
        (-1, n)
    } else {
        (0, n - 1)
    };

    let slabs = (first..last)
        .into_par_iter()
        .map(|i| {
            let mut mesh = if config.color {
                TriangleMesh::with_colors()
            } else {
                TriangleMesh::new()
            };
            for j in first..last {
                for k in first..last {
                    march_cube(volume, [i, j, k], &mut mesh);
                }
            }
            mesh
        })
        .collect::<Vec<_>>();

    let mut mesh = if config.color {
        TriangleMesh::with_colors()
    } else {
        TriangleMesh::new()
    };
    for slab in slabs {
        mesh.append(slab);
    }

    log::debug!(
        "extracted {} triangles from {} occupied voxels",
        mesh.num_faces(),
        volume.occupied_count()
    );

    mesh
}

/// Occupancy of a voxel; everything outside the grid is empty.
#[inline]
fn occupied(volume: &VoxelVolume, [i, j, k]: [isize; 3]) -> bool {
    i >= 0 && j >= 0 && k >= 0 && volume.is_occupied(i as usize, j as usize, k as usize)
}

fn march_cube(volume: &VoxelVolume, origin: [isize; 3], mesh: &mut TriangleMesh) {
    let corners = CORNERS.map(|o| [origin[0] + o[0], origin[1] + o[1], origin[2] + o[2]]);

    let mut cube_index = 0usize;
    for (bit, corner) in corners.iter().enumerate() {
        if occupied(volume, *corner) {
            cube_index |= 1 << bit;
        }
    }

    let edge_mask = EDGE_TABLE[cube_index];
    if edge_mask == 0 {
        return;
    }

    let geometry = volume.geometry();
    let mut edge_vertices = [(DVec3::ZERO, [0u8; 3]); 12];
    for (e, [a, b]) in EDGES.iter().enumerate() {
        if edge_mask & (1 << e) == 0 {
            continue;
        }
        let (ca, cb) = (corners[*a], corners[*b]);
        let position =
            (geometry.center(ca[0], ca[1], ca[2]) + geometry.center(cb[0], cb[1], cb[2])) / 2.0;

        // exactly one endpoint is occupied
        let inside = if cube_index & (1 << *a) != 0 { ca } else { cb };
        let color = volume
            .color(inside[0] as usize, inside[1] as usize, inside[2] as usize)
            .map(unpack_rgb)
            .unwrap_or([255, 255, 255]);

        edge_vertices[e] = (position, color);
    }

    for triangle in TRIANGLE_TABLE[cube_index].chunks_exact(3) {
        if triangle[0] < 0 {
            break;
        }

        // the tables wind toward the occupied side; flip to face outward
        let base = mesh.vertices.len();
        for &e in [triangle[0], triangle[2], triangle[1]].iter() {
            let (position, color) = edge_vertices[e as usize];
            mesh.vertices.push(position);
            if let Some(colors) = mesh.vertex_colors.as_mut() {
                colors.push(color);
            }
        }
        mesh.faces.push([base, base + 1, base + 2]);

        if let Some(colors) = mesh.face_colors.as_mut() {
            colors.push(edge_vertices[triangle[0] as usize].1);
        }
    }
}
