//! Object File Format (OFF) meshes.
//!
//! ```text
//! OFF
//! <vertex_count> <face_count> 0
//! x y z [r g b a]
//! 3 v1 v2 v3 [r g b a]
//! ```
//!
//! Colors are 0-255 integers and always written with an opaque alpha.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use glam::DVec3;

use crate::mesh::TriangleMesh;

/// Error types for the OFF module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum OffError {
    /// Failed to read or write the OFF file
    #[error("Failed to access OFF file")]
    Io(#[from] std::io::Error),

    /// A colored export was requested for a mesh without colors
    #[error("Mesh has no vertex and face colors")]
    MissingColors,

    /// The file does not follow the OFF layout
    #[error("Malformed OFF file at line {line}: {message}")]
    Malformed {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },
}

/// Write a mesh as a plain OFF file, without colors.
///
/// The destination is created (or truncated) before anything is written.
pub fn write_off(path: impl AsRef<Path>, mesh: &TriangleMesh) -> Result<(), OffError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_off_to(&mut writer, mesh, false)?;
    writer.flush()?;
    Ok(())
}

/// Write a mesh as an OFF file with per-vertex and per-face RGBA colors.
///
/// # Errors
///
/// [`OffError::MissingColors`] when the mesh carries no colors; nothing is written then.
pub fn write_off_color(path: impl AsRef<Path>, mesh: &TriangleMesh) -> Result<(), OffError> {
    if !mesh.has_colors() {
        return Err(OffError::MissingColors);
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_off_to(&mut writer, mesh, true)?;
    writer.flush()?;
    Ok(())
}

/// Serialize a mesh into any writer.
///
/// With `color` set, vertex and face colors are appended to every line.
pub fn write_off_to<W: Write>(
    writer: &mut W,
    mesh: &TriangleMesh,
    color: bool,
) -> Result<(), OffError> {
    let (vertex_colors, face_colors) = if color {
        match (&mesh.vertex_colors, &mesh.face_colors) {
            (Some(v), Some(f)) => (Some(v), Some(f)),
            _ => return Err(OffError::MissingColors),
        }
    } else {
        (None, None)
    };

    writeln!(writer, "OFF")?;
    writeln!(writer, "{} {} 0", mesh.num_vertices(), mesh.num_faces())?;

    for (i, v) in mesh.vertices.iter().enumerate() {
        match vertex_colors.and_then(|c| c.get(i)) {
            Some([r, g, b]) => writeln!(writer, "{} {} {} {r} {g} {b} 255", v.x, v.y, v.z)?,
            None => writeln!(writer, "{} {} {}", v.x, v.y, v.z)?,
        }
    }

    for (i, [a, b, c]) in mesh.faces.iter().enumerate() {
        match face_colors.and_then(|fc| fc.get(i)) {
            Some([r, g, bl]) => writeln!(writer, "3 {a} {b} {c} {r} {g} {bl} 255")?,
            None => writeln!(writer, "3 {a} {b} {c}")?,
        }
    }

    Ok(())
}

fn malformed(line: usize, message: impl Into<String>) -> OffError {
    OffError::Malformed {
        line,
        message: message.into(),
    }
}

fn parse_values<T: std::str::FromStr>(line: usize, tokens: &[&str]) -> Result<Vec<T>, OffError> {
    tokens
        .iter()
        .map(|t| {
            t.parse::<T>()
                .map_err(|_| malformed(line, format!("invalid number '{t}'")))
        })
        .collect()
}

fn rgb(line: usize, values: &[u16]) -> Result<[u8; 3], OffError> {
    let channel = |v: u16| u8::try_from(v).map_err(|_| malformed(line, "color out of range"));
    Ok([channel(values[0])?, channel(values[1])?, channel(values[2])?])
}

/// Read a triangle mesh from an OFF file.
///
/// Both plain and colored files are accepted. Colors are kept only if every vertex and
/// every face carries one. Comments (`#`) and blank lines are skipped.
pub fn read_off(path: impl AsRef<Path>) -> Result<TriangleMesh, OffError> {
    let reader = BufReader::new(File::open(path)?);

    let mut lines = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let content = line.split('#').next().unwrap_or("").trim().to_string();
        if !content.is_empty() {
            lines.push((number + 1, content));
        }
    }
    let mut lines = lines.into_iter();

    match lines.next() {
        Some((_, header)) if header == "OFF" => {}
        Some((number, _)) => return Err(malformed(number, "expected 'OFF' header")),
        None => return Err(malformed(1, "empty file")),
    }

    let (number, counts) = lines.next().ok_or_else(|| malformed(2, "missing counts"))?;
    let counts = parse_values::<usize>(number, &counts.split_whitespace().collect::<Vec<_>>())?;
    let [num_vertices, num_faces] = match counts.as_slice() {
        [v, f] | [v, f, _] => [*v, *f],
        _ => return Err(malformed(number, "expected '<vertices> <faces> <edges>'")),
    };

    let mut mesh = TriangleMesh::with_colors();
    let mut vertex_colors = Vec::with_capacity(num_vertices);
    let mut face_colors = Vec::with_capacity(num_faces);

    for _ in 0..num_vertices {
        let (number, line) = lines
            .next()
            .ok_or_else(|| malformed(0, "unexpected end of vertices"))?;
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        if tokens.len() < 3 {
            return Err(malformed(number, "vertex needs three coordinates"));
        }
        let xyz = parse_values::<f64>(number, &tokens[..3])?;
        mesh.vertices.push(DVec3::new(xyz[0], xyz[1], xyz[2]));
        if tokens.len() >= 6 {
            vertex_colors.push(rgb(number, &parse_values::<u16>(number, &tokens[3..6])?)?);
        }
    }

    for _ in 0..num_faces {
        let (number, line) = lines
            .next()
            .ok_or_else(|| malformed(0, "unexpected end of faces"))?;
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        if tokens.first() != Some(&"3") {
            return Err(malformed(number, "only triangles are supported"));
        }
        if tokens.len() < 4 {
            return Err(malformed(number, "face needs three vertex indices"));
        }
        let indices = parse_values::<usize>(number, &tokens[1..4])?;
        if indices.iter().any(|&i| i >= num_vertices) {
            return Err(malformed(number, "vertex index out of range"));
        }
        mesh.faces.push([indices[0], indices[1], indices[2]]);
        if tokens.len() >= 7 {
            face_colors.push(rgb(number, &parse_values::<u16>(number, &tokens[4..7])?)?);
        }
    }

    if vertex_colors.len() == num_vertices && face_colors.len() == num_faces {
        mesh.vertex_colors = Some(vertex_colors);
        mesh.face_colors = Some(face_colors);
    } else {
        mesh.vertex_colors = None;
        mesh.face_colors = None;
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> TriangleMesh {
        let mut mesh = TriangleMesh::with_colors();
        mesh.vertices = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(0.5, 0.0, -0.25),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        mesh.faces = vec![[0, 1, 2]];
        mesh.vertex_colors = Some(vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
        mesh.face_colors = Some(vec![[255, 0, 0]]);
        mesh
    }

    #[test]
    fn test_write_off_layout() -> Result<(), OffError> {
        let mesh = triangle();

        let mut plain = Vec::new();
        write_off_to(&mut plain, &mesh, false)?;
        let plain = String::from_utf8_lossy(&plain);
        let lines = plain.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "OFF");
        assert_eq!(lines[1], "3 1 0");
        assert_eq!(lines[3], "0.5 0 -0.25");
        assert_eq!(lines[5], "3 0 1 2");
        assert_eq!(lines.len(), 2 + 3 + 1);

        let mut colored = Vec::new();
        write_off_to(&mut colored, &mesh, true)?;
        let colored = String::from_utf8_lossy(&colored);
        let lines = colored.lines().collect::<Vec<_>>();
        assert_eq!(lines[2], "0 0 0 255 0 0 255");
        assert_eq!(lines[5], "3 0 1 2 255 0 0 255");
        Ok(())
    }

    /// A unit square split into two triangles.
    fn quad() -> TriangleMesh {
        let mut mesh = TriangleMesh::with_colors();
        mesh.vertices = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        mesh.faces = vec![[0, 1, 2], [0, 2, 3]];
        mesh.vertex_colors = Some(vec![[10, 20, 30]; 4]);
        mesh.face_colors = Some(vec![[200, 0, 0], [0, 0, 200]]);
        mesh
    }

    #[test]
    fn test_counts_match_body() -> Result<(), OffError> {
        let dir = tempfile::tempdir()?;
        let mesh = quad();

        for color in [false, true] {
            let mut buf = Vec::new();
            write_off_to(&mut buf, &mesh, color)?;
            let text = String::from_utf8_lossy(&buf);
            let lines = text.lines().collect::<Vec<_>>();
            assert_eq!(lines[1], "4 2 0");
            assert_eq!(lines.len(), 2 + 4 + 2);
            assert!(lines[6..].iter().all(|l| l.starts_with("3 ")));
            assert_eq!(lines[7].split(' ').take(4).collect::<Vec<_>>(), ["3", "0", "2", "3"]);

            let path = dir.path().join(format!("quad_{color}.off"));
            std::fs::write(&path, &buf)?;
            let read = read_off(&path)?;
            assert_eq!(read.vertices, mesh.vertices);
            assert_eq!(read.faces, mesh.faces);
            assert_eq!(read.has_colors(), color);
        }
        Ok(())
    }

    #[test]
    fn test_write_and_read_back() -> Result<(), OffError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mesh.off");
        let mesh = triangle();

        write_off_color(&path, &mesh)?;
        assert_eq!(read_off(&path)?, mesh);

        write_off(&path, &mesh)?;
        let plain = read_off(&path)?;
        assert_eq!(plain.vertices, mesh.vertices);
        assert_eq!(plain.faces, mesh.faces);
        assert!(!plain.has_colors());
        Ok(())
    }

    #[test]
    fn test_color_export_requires_colors() -> Result<(), OffError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mesh.off");
        let res = write_off_color(&path, &TriangleMesh::new());
        assert!(matches!(res, Err(OffError::MissingColors)));
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_unwritable_destination_is_an_error() -> Result<(), OffError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing").join("mesh.off");
        assert!(matches!(
            write_off(&path, &triangle()),
            Err(OffError::Io(_))
        ));
        Ok(())
    }

    #[test]
    fn test_read_rejects_malformed_files() -> Result<(), OffError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.off");

        std::fs::write(&path, "PLY\n")?;
        assert!(matches!(read_off(&path), Err(OffError::Malformed { line: 1, .. })));

        std::fs::write(&path, "OFF\n# comment\n1 1 0\n0 0 0\n3 0 1 2\n")?;
        assert!(matches!(read_off(&path), Err(OffError::Malformed { line: 5, .. })));

        std::fs::write(&path, "OFF\n1 0 0\n0 0 0 300 0 0 255\n")?;
        assert!(matches!(read_off(&path), Err(OffError::Malformed { line: 3, .. })));
        Ok(())
    }
}
