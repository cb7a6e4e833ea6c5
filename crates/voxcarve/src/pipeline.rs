//! The reconstruction loop.
//!
//! Each frame goes through marker detection, pose fusion, segmentation and carving, in
//! that order. Frames without a resolvable pose are skipped. Once the source is exhausted
//! or the run is cancelled, the surface of the remaining volume is extracted and exported.

use std::{
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};
use voxcarve_3d::{
    camera::CameraModel,
    carving::{CarveStats, CarvingEngine, CarvingError},
    io::off::{write_off, write_off_color, OffError},
    marching_cubes::{extract_mesh, MarchingCubesConfig},
    mesh::TriangleMesh,
    volume::{VolumeError, VoxelVolume},
};
use voxcarve_image::ColorImage;
use voxcarve_imgproc::segmentation::{Segmentation, SegmentationError};
use voxcarve_io::{error::IoError, source::FrameSource, trace::Trace};
use voxcarve_marker::{MarkerDetector, MarkerError, PoseFusion};

/// Errors of the reconstruction pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The volume could not be created.
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// Marker detection failed.
    #[error(transparent)]
    Marker(#[from] MarkerError),

    /// Segmentation failed.
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    /// Carving failed.
    #[error(transparent)]
    Carving(#[from] CarvingError),

    /// Reading frames failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Writing the mesh failed.
    #[error(transparent)]
    Off(#[from] OffError),

    /// The marker side length must be finite and positive.
    #[error("Invalid marker length {0}")]
    InvalidMarkerLength(f64),
}

/// Parameters of a reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Number of voxels along each axis.
    pub resolution: usize,
    /// Physical size of the volume in meters, centered on the canonical marker.
    pub extent: [f64; 3],
    /// Printed side length of the markers in meters.
    pub marker_length: f64,
    /// Clip the volume to the frustum of the silhouette bounding box before mask carving.
    pub frustum: bool,
    /// Color the surviving voxels and export a colored mesh.
    pub color: bool,
    /// Surface extraction options.
    pub marching_cubes: MarchingCubesConfig,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            resolution: 64,
            extent: [0.1, 0.1, 0.05],
            marker_length: 0.05,
            frustum: false,
            color: true,
            marching_cubes: MarchingCubesConfig::default(),
        }
    }
}

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame carved the volume.
    Carved {
        /// Voxels removed by the frame.
        stats: CarveStats,
        /// Whether the canonical marker was visible.
        reliable: bool,
    },
    /// No pose could be resolved for the frame.
    Skipped,
}

/// Counters of a reconstruction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Frames read from the source.
    pub frames_seen: usize,
    /// Frames that carved the volume.
    pub frames_carved: usize,
    /// Frames without a pose.
    pub frames_skipped: usize,
    /// Voxels still occupied.
    pub occupied: usize,
}

/// The state threaded through the frame loop.
pub struct Reconstruction {
    config: ReconstructionConfig,
    volume: VoxelVolume,
    fusion: PoseFusion,
    engine: CarvingEngine,
    summary: Summary,
}

impl Reconstruction {
    /// Create a reconstruction with a fully occupied volume.
    ///
    /// # Arguments
    ///
    /// * `config` - The reconstruction parameters.
    /// * `camera` - The calibrated camera the frames come from.
    pub fn new(config: ReconstructionConfig, camera: CameraModel) -> Result<Self, PipelineError> {
        if !(config.marker_length.is_finite() && config.marker_length > 0.0) {
            return Err(PipelineError::InvalidMarkerLength(config.marker_length));
        }

        let volume = VoxelVolume::new(config.resolution, config.extent)?;
        let engine = CarvingEngine::new(camera)
            .with_frustum(config.frustum)
            .with_color(config.color);

        let summary = Summary {
            occupied: volume.occupied_count(),
            ..Default::default()
        };

        Ok(Self {
            config,
            volume,
            fusion: PoseFusion::new(),
            engine,
            summary,
        })
    }

    /// The reconstruction parameters.
    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// The current volume.
    pub fn volume(&self) -> &VoxelVolume {
        &self.volume
    }

    /// The marker fusion state.
    pub fn fusion(&self) -> &PoseFusion {
        &self.fusion
    }

    /// The counters so far.
    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Carve the volume with one frame.
    pub fn process_frame(
        &mut self,
        frame: &ColorImage,
        detector: &mut dyn MarkerDetector,
        segmentation: &mut dyn Segmentation,
    ) -> Result<FrameOutcome, PipelineError> {
        let index = self.summary.frames_seen;
        self.summary.frames_seen += 1;

        let observations = {
            let _trace = Trace::new("markers");
            detector.detect(frame, self.config.marker_length)?
        };

        let Some(canonical) = self.fusion.update(&observations) else {
            log::debug!(
                "frame {index}: no canonical pose from {} markers, skipped",
                observations.len()
            );
            self.summary.frames_skipped += 1;
            return Ok(FrameOutcome::Skipped);
        };

        let mask = {
            let _trace = Trace::new("segmentation");
            segmentation.update(frame)?
        };

        let stats = {
            let _trace = Trace::new("carving");
            self.engine
                .carve(&mut self.volume, &canonical.pose, mask, frame)?
        };

        self.summary.frames_carved += 1;
        self.summary.occupied = self.volume.occupied_count();

        log::debug!(
            "frame {index}: removed {} voxels, {} left (reliable pose: {})",
            stats.total(),
            self.summary.occupied,
            canonical.reliable
        );

        Ok(FrameOutcome::Carved {
            stats,
            reliable: canonical.reliable,
        })
    }

    /// Process every frame of a source.
    ///
    /// The loop stops when the source is exhausted, when `cancel` is set (checked between
    /// frames) or when a frame fails to decode or process. A failing frame is logged and
    /// ends the input; the volume carved so far is kept in every case.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        detector: &mut dyn MarkerDetector,
        segmentation: &mut dyn Segmentation,
        cancel: &AtomicBool,
    ) -> Result<Summary, PipelineError> {
        while source.is_open() {
            if cancel.load(Ordering::Relaxed) {
                log::info!("cancelled after {} frames", self.summary.frames_seen);
                break;
            }

            let outcome = {
                let _trace = Trace::new("frame");
                self.process_frame(source.frame(), detector, segmentation)
            };
            if let Err(e) = outcome {
                log::warn!(
                    "frame {} failed, stopping: {e}",
                    self.summary.frames_seen.saturating_sub(1)
                );
                break;
            }

            match source.advance() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    log::warn!("cannot read the next frame, stopping: {e}");
                    break;
                }
            }
        }

        let summary = self.summary;
        log::info!(
            "frames seen: {}, carved: {}, skipped: {}, occupied voxels: {}",
            summary.frames_seen,
            summary.frames_carved,
            summary.frames_skipped,
            summary.occupied
        );

        Ok(summary)
    }

    /// Extract the surface of the current volume.
    pub fn extract_mesh(&self) -> TriangleMesh {
        let _trace = Trace::new("marching cubes");
        let mut config = self.config.marching_cubes;
        config.color &= self.config.color;
        extract_mesh(&self.volume, &config)
    }

    /// Extract the surface and write it as an OFF file.
    ///
    /// The file is colored when the mesh carries colors.
    pub fn export_mesh(&self, path: impl AsRef<Path>) -> Result<TriangleMesh, PipelineError> {
        let path = path.as_ref();
        let mesh = self.extract_mesh();

        if mesh.has_colors() {
            write_off_color(path, &mesh)?;
        } else {
            write_off(path, &mesh)?;
        }

        log::info!(
            "wrote {} vertices and {} faces to {}",
            mesh.num_vertices(),
            mesh.num_faces(),
            path.display()
        );

        Ok(mesh)
    }
}
