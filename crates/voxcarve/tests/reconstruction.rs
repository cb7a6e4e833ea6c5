use std::{
    collections::HashMap,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use glam::DVec3;
use voxcarve::{
    image::{ColorImage, Image, ImageSize},
    imgproc::segmentation::{ChromaKeySegmentation, Segmentation, SegmentationError},
    io::{functional::write_image_png_rgb8, source::ImageSequenceSource},
    marker::{MarkerDetector, MarkerError, MarkerObservation, RecordedMarkerDetector},
    pipeline::{Reconstruction, ReconstructionConfig},
    v3d::{
        camera::{CameraIntrinsic, CameraModel},
        io::off::read_off,
        marching_cubes::MarchingCubesConfig,
        mesh::TriangleMesh,
        volume::{unpack_rgb, VoxelVolume},
    },
};

const SIZE: usize = 100;
const RADIUS: f64 = 0.03;
const RED: [u8; 3] = [255, 0, 0];
const GREEN: [u8; 3] = [0, 255, 0];

fn camera() -> CameraModel {
    CameraModel::pinhole(CameraIntrinsic::new(100.0, 100.0, 50.0, 50.0))
}

/// A red ball of radius `RADIUS` on the canonical marker, on a green background.
///
/// Only the marker translation matters since the ball is centered on the marker.
fn render(translation: DVec3) -> Result<ColorImage, Box<dyn std::error::Error>> {
    let intrinsic = camera().intrinsic;
    let mut data = Vec::with_capacity(SIZE * SIZE * 3);
    for v in 0..SIZE {
        for u in 0..SIZE {
            let ray = intrinsic.unproject(glam::DVec2::new(u as f64 + 0.5, v as f64 + 0.5));
            let distance = translation.cross(ray).length() / ray.length();
            data.extend_from_slice(if distance < RADIUS { &RED } else { &GREEN });
        }
    }
    let size = ImageSize {
        width: SIZE,
        height: SIZE,
    };
    Ok(ColorImage::from_rgb(Image::new(size, data)?))
}

/// Foreground is every pixel with a strong red channel.
struct RedSilhouette(Image<u8, 1>);

impl Segmentation for RedSilhouette {
    fn update(&mut self, frame: &ColorImage) -> Result<&Image<u8, 1>, SegmentationError> {
        let data = (0..frame.height())
            .flat_map(|y| (0..frame.width()).map(move |x| (x, y)))
            .map(|(x, y)| match frame.rgb(x, y) {
                Some([r, _, _]) if r > 128 => 255,
                _ => 0,
            })
            .collect();
        self.0 = Image::new(frame.size(), data)?;
        Ok(&self.0)
    }
}

/// Writes the frames of the scene and returns the matching marker recording.
///
/// Frame 0 sees markers 1 and 2, frame 1 sees nothing, frame 2 only sees marker 2, and
/// the remaining frames see marker 1 from around the ball.
fn write_scene(dir: &Path) -> Result<RecordedMarkerDetector, Box<dyn std::error::Error>> {
    let base = DVec3::new(0.0, 0.0, 0.3);
    let offset = DVec3::new(0.2, 0.0, 0.0);

    let mut views = vec![
        (base, vec![(1, base, DVec3::ZERO), (2, base + offset, DVec3::ZERO)]),
        (base, vec![]),
    ];

    let shifted = DVec3::new(0.01, 0.0, 0.3);
    views.push((shifted, vec![(2, shifted + offset, DVec3::ZERO)]));

    for angle in [0.5, 1.0, 1.5, -0.5, -1.0] {
        views.push((base, vec![(1, base, DVec3::new(0.0, angle, 0.0))]));
    }
    for angle in [0.7, -0.7] {
        views.push((base, vec![(1, base, DVec3::new(angle, 0.0, 0.0))]));
    }

    let mut frames = HashMap::new();
    for (index, (translation, markers)) in views.into_iter().enumerate() {
        write_image_png_rgb8(dir.join(format!("frame_{index:03}.png")), &render(translation)?)?;
        let observations = markers
            .into_iter()
            .map(|(id, t, r)| MarkerObservation::new(id, t, r))
            .collect::<Vec<_>>();
        if !observations.is_empty() {
            frames.insert(index, observations);
        }
    }

    Ok(RecordedMarkerDetector::new(frames, None))
}

fn config() -> ReconstructionConfig {
    ReconstructionConfig {
        resolution: 16,
        extent: [0.1, 0.1, 0.1],
        frustum: true,
        ..Default::default()
    }
}

fn occupied_radii(volume: &VoxelVolume) -> (Vec<f64>, Vec<f64>) {
    let n = volume.resolution();
    let mut kept = vec![];
    let mut removed = vec![];
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                let r = volume.center(i, j, k).length();
                if volume.is_occupied(i, j, k) {
                    kept.push(r);
                } else {
                    removed.push(r);
                }
            }
        }
    }
    (kept, removed)
}

fn quantize(v: DVec3) -> [i64; 3] {
    (v * 1e9).round().as_i64vec3().to_array()
}

/// Every undirected edge is shared by exactly two triangles.
fn is_closed(mesh: &TriangleMesh) -> bool {
    let mut edges: HashMap<([i64; 3], [i64; 3]), usize> = HashMap::new();
    for face in &mesh.faces {
        for e in 0..3 {
            let a = quantize(mesh.vertices[face[e]]);
            let b = quantize(mesh.vertices[face[(e + 1) % 3]]);
            *edges.entry((a.min(b), a.max(b))).or_default() += 1;
        }
    }
    edges.values().all(|&count| count == 2)
}

#[test]
fn carves_ball_from_synthetic_views() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut detector = write_scene(dir.path())?;
    let mut source = ImageSequenceSource::from_directory(dir.path(), camera())?;
    let mut segmentation = RedSilhouette(Image::default());

    let mut reconstruction = Reconstruction::new(config(), camera())?;
    let summary = reconstruction.run(
        &mut source,
        &mut detector,
        &mut segmentation,
        &AtomicBool::new(false),
    )?;

    assert_eq!(summary.frames_seen, 10);
    assert_eq!(summary.frames_carved, 9);
    assert_eq!(summary.frames_skipped, 1);
    assert_eq!(reconstruction.fusion().canonical_id(), Some(1));
    assert!(reconstruction.fusion().relative(2).is_some());

    let volume = reconstruction.volume();
    assert_eq!(summary.occupied, volume.occupied_count());
    assert!(summary.occupied > 300 && summary.occupied < 600);

    let (kept, removed) = occupied_radii(volume);
    assert!(kept.iter().all(|&r| r < 0.04));
    assert!(removed.iter().all(|&r| r > 0.025));

    // survivors were all colored by the ball
    assert!(volume.occupied_voxels().all(|(_, rgb)| rgb == RED));
    assert_eq!(volume.color(8, 8, 8).map(unpack_rgb), Some(RED));

    let path = dir.path().join("mesh.off");
    let mesh = reconstruction.export_mesh(&path)?;
    assert!(mesh.num_faces() > 0);
    assert!(mesh.has_colors());
    assert!(is_closed(&mesh));

    let (lo, hi) = mesh.bounds().ok_or("empty mesh")?;
    assert!(lo.min_element() > -0.05 && hi.max_element() < 0.05);

    let contents = std::fs::read_to_string(&path)?;
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("OFF"));
    assert_eq!(
        lines.next(),
        Some(format!("{} {} 0", mesh.num_vertices(), mesh.num_faces()).as_str())
    );
    assert_eq!(read_off(&path)?, mesh);

    Ok(())
}

/// Raises the cancel flag once it has answered `limit` frames.
struct CancellingDetector<'a> {
    inner: RecordedMarkerDetector,
    cancel: &'a AtomicBool,
    limit: usize,
    calls: usize,
}

impl MarkerDetector for CancellingDetector<'_> {
    fn detect(
        &mut self,
        frame: &ColorImage,
        marker_length: f64,
    ) -> Result<Vec<MarkerObservation>, MarkerError> {
        self.calls += 1;
        if self.calls >= self.limit {
            self.cancel.store(true, Ordering::Relaxed);
        }
        self.inner.detect(frame, marker_length)
    }
}

#[test]
fn cancellation_keeps_partial_volume() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let cancel = AtomicBool::new(false);
    let mut detector = CancellingDetector {
        inner: write_scene(dir.path())?,
        cancel: &cancel,
        limit: 3,
        calls: 0,
    };
    let mut source = ImageSequenceSource::from_directory(dir.path(), camera())?;
    let mut segmentation = RedSilhouette(Image::default());

    let config = ReconstructionConfig {
        color: false,
        marching_cubes: MarchingCubesConfig {
            color: true,
            close_boundary: true,
        },
        ..config()
    };
    let mut reconstruction = Reconstruction::new(config, camera())?;
    let summary = reconstruction.run(&mut source, &mut detector, &mut segmentation, &cancel)?;

    // the frame being processed when the flag is raised still completes
    assert_eq!(summary.frames_seen, 3);
    assert_eq!(summary.frames_carved, 2);
    assert!(source.position() < source.len());

    // two views leave a larger hull than the full run
    assert!(summary.occupied > 0 && summary.occupied < 16 * 16 * 16);

    let path = dir.path().join("partial.off");
    let mesh = reconstruction.export_mesh(&path)?;
    assert!(!mesh.has_colors());
    assert!(is_closed(&mesh));
    assert_eq!(read_off(&path)?.num_faces(), mesh.num_faces());

    Ok(())
}

#[test]
fn green_screen_keeps_the_core() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut detector = write_scene(dir.path())?;
    let mut source = ImageSequenceSource::from_directory(dir.path(), camera())?;
    let mut segmentation = ChromaKeySegmentation::green();

    let mut reconstruction = Reconstruction::new(config(), camera())?;
    let summary = reconstruction.run(
        &mut source,
        &mut detector,
        &mut segmentation,
        &AtomicBool::new(false),
    )?;

    assert_eq!(summary.frames_carved, 9);
    assert!(summary.occupied < 16 * 16 * 16 / 2);

    let (kept, removed) = occupied_radii(reconstruction.volume());
    assert!(!kept.is_empty());
    assert!(removed.iter().all(|&r| r > 0.02));

    Ok(())
}

#[test]
fn unreadable_frame_ends_the_input() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut detector = write_scene(dir.path())?;
    std::fs::write(dir.path().join("frame_003.png"), b"not a png")?;
    let mut source = ImageSequenceSource::from_directory(dir.path(), camera())?;
    let mut segmentation = RedSilhouette(Image::default());

    let mut reconstruction = Reconstruction::new(config(), camera())?;
    let summary = reconstruction.run(
        &mut source,
        &mut detector,
        &mut segmentation,
        &AtomicBool::new(false),
    )?;

    assert_eq!(summary.frames_seen, 3);
    assert_eq!(summary.frames_carved, 2);
    assert_eq!(summary.frames_skipped, 1);
    assert!(summary.occupied > 0 && summary.occupied < 16 * 16 * 16);

    let path = dir.path().join("mesh.off");
    let mesh = reconstruction.export_mesh(&path)?;
    assert!(mesh.num_faces() > 0);
    assert_eq!(read_off(&path)?, mesh);

    Ok(())
}
