//! Frame acquisition.
//!
//! A source is positioned on its first frame when opened. The reconstruction loop reads
//! [`FrameSource::frame`], then calls [`FrameSource::advance`] until it returns `false`.

use std::path::{Path, PathBuf};

use voxcarve_3d::camera::CameraModel;
use voxcarve_image::ColorImage;

use crate::{
    error::IoError,
    functional::{is_supported_image, read_image_rgb8},
};

/// A calibrated stream of color frames.
pub trait FrameSource {
    /// The current frame.
    fn frame(&self) -> &ColorImage;

    /// Move to the next frame.
    ///
    /// Returns `false`, and closes the source, once there are no frames left.
    fn advance(&mut self) -> Result<bool, IoError>;

    /// Whether the current frame is valid.
    fn is_open(&self) -> bool;

    /// The camera the frames were captured with.
    fn calibration(&self) -> &CameraModel;
}

/// A source made of a single still image.
pub struct StillImageSource {
    frame: ColorImage,
    camera: CameraModel,
    open: bool,
}

impl StillImageSource {
    /// Open a still image file.
    pub fn open(path: impl AsRef<Path>, camera: CameraModel) -> Result<Self, IoError> {
        Ok(Self::from_image(read_image_rgb8(path)?, camera))
    }

    /// Wrap an already decoded image.
    pub fn from_image(frame: ColorImage, camera: CameraModel) -> Self {
        Self {
            frame,
            camera,
            open: true,
        }
    }
}

impl FrameSource for StillImageSource {
    fn frame(&self) -> &ColorImage {
        &self.frame
    }

    fn advance(&mut self) -> Result<bool, IoError> {
        self.open = false;
        Ok(false)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn calibration(&self) -> &CameraModel {
        &self.camera
    }
}

/// A source reading numbered image files one after the other.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    position: usize,
    frame: ColorImage,
    camera: CameraModel,
}

impl ImageSequenceSource {
    /// Open the given files, in order.
    ///
    /// # Errors
    ///
    /// [`IoError::EmptySequence`] when `paths` is empty, or the error decoding the first frame.
    pub fn new(paths: Vec<PathBuf>, camera: CameraModel) -> Result<Self, IoError> {
        let first = paths
            .first()
            .ok_or_else(|| IoError::EmptySequence(PathBuf::new()))?;
        let frame = read_image_rgb8(first)?;

        log::info!("opened a sequence of {} frames", paths.len());

        Ok(Self {
            paths,
            position: 0,
            frame,
            camera,
        })
    }

    /// Open every `.png`/`.jpg` file of a directory, sorted by file name.
    pub fn from_directory(dir: impl AsRef<Path>, camera: CameraModel) -> Result<Self, IoError> {
        let dir = dir.as_ref();
        let mut paths = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_supported_image(path))
            .collect::<Vec<_>>();
        paths.sort();

        if paths.is_empty() {
            return Err(IoError::EmptySequence(dir.to_path_buf()));
        }

        Self::new(paths, camera)
    }

    /// Open numbered frames following a printf-style pattern such as `frames/img_%04d.png`.
    ///
    /// Numbering starts at 0, or at 1 when there is no frame 0, and stops at the first
    /// missing index.
    pub fn from_pattern(pattern: &str, camera: CameraModel) -> Result<Self, IoError> {
        let (prefix, width, suffix) = split_pattern(pattern)
            .ok_or_else(|| IoError::InvalidFileExtension(PathBuf::from(pattern)))?;
        let name = |i: usize| PathBuf::from(format!("{prefix}{i:0width$}{suffix}"));

        let start = if name(0).exists() { 0 } else { 1 };
        let paths = (start..)
            .map(name)
            .take_while(|path| path.exists())
            .collect::<Vec<_>>();

        if paths.is_empty() {
            return Err(IoError::EmptySequence(PathBuf::from(pattern)));
        }

        Self::new(paths, camera)
    }

    /// Number of frames in the sequence.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the sequence has no frames. Never true for an opened sequence.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Index of the current frame.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl FrameSource for ImageSequenceSource {
    fn frame(&self) -> &ColorImage {
        &self.frame
    }

    fn advance(&mut self) -> Result<bool, IoError> {
        if !self.is_open() {
            return Ok(false);
        }

        self.position += 1;
        match self.paths.get(self.position) {
            Some(path) => {
                self.frame = read_image_rgb8(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_open(&self) -> bool {
        self.position < self.paths.len()
    }

    fn calibration(&self) -> &CameraModel {
        &self.camera
    }
}

// "a/b_%04d.png" -> ("a/b_", 4, ".png")
fn split_pattern(pattern: &str) -> Option<(&str, usize, &str)> {
    let start = pattern.find('%')?;
    let rest = &pattern[start + 1..];
    let end = rest.find('d')?;
    let digits = &rest[..end];
    let width = if digits.is_empty() {
        0
    } else {
        digits.parse::<usize>().ok()?
    };
    Some((&pattern[..start], width, &rest[end + 1..]))
}

/// Open the frame source matching `input`.
///
/// A directory opens an [`ImageSequenceSource`] over its images, a path containing `%`
/// a numbered sequence, anything else a [`StillImageSource`].
pub fn open_frame_source(
    input: impl AsRef<Path>,
    camera: CameraModel,
) -> Result<Box<dyn FrameSource>, IoError> {
    let input = input.as_ref();

    if input.is_dir() {
        return Ok(Box::new(ImageSequenceSource::from_directory(input, camera)?));
    }

    let as_str = input.to_string_lossy();
    if as_str.contains('%') {
        return Ok(Box::new(ImageSequenceSource::from_pattern(&as_str, camera)?));
    }

    Ok(Box::new(StillImageSource::open(input, camera)?))
}
