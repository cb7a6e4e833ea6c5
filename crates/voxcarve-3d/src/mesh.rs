use glam::DVec3;

/// A triangle soup with optional per-vertex and per-face colors.
///
/// Vertices are not shared between triangles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// List of 3D vertices.
    pub vertices: Vec<DVec3>,
    /// List of triangles, each triangle is three indices into `vertices`.
    pub faces: Vec<[usize; 3]>,
    /// RGB color of each vertex, parallel to `vertices`.
    pub vertex_colors: Option<Vec<[u8; 3]>>,
    /// RGB color of each face, parallel to `faces`.
    pub face_colors: Option<Vec<[u8; 3]>>,
}

impl TriangleMesh {
    /// Creates a new, empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, empty mesh carrying vertex and face colors.
    pub fn with_colors() -> Self {
        Self {
            vertex_colors: Some(Vec::new()),
            face_colors: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Whether both vertex and face colors are present.
    pub fn has_colors(&self) -> bool {
        self.vertex_colors.is_some() && self.face_colors.is_some()
    }

    /// Append the triangles of another mesh, re-indexing its faces.
    ///
    /// Colors are kept only when both meshes carry them.
    pub fn append(&mut self, mut other: TriangleMesh) {
        let offset = self.vertices.len();
        self.vertices.append(&mut other.vertices);
        self.faces
            .extend(other.faces.iter().map(|f| f.map(|v| v + offset)));

        self.vertex_colors = match (self.vertex_colors.take(), other.vertex_colors) {
            (Some(mut a), Some(mut b)) => {
                a.append(&mut b);
                Some(a)
            }
            _ => None,
        };
        self.face_colors = match (self.face_colors.take(), other.face_colors) {
            (Some(mut a), Some(mut b)) => {
                a.append(&mut b);
                Some(a)
            }
            _ => None,
        };
    }

    /// Axis aligned bounds `(min, max)` of the vertices, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
        )
    }
}
